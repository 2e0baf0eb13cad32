//! Integration tests for instance creation.

mod common;

use chrono::TimeDelta;
use delves_core::error::ProvisioningError;
use delves_core::location::Location;
use delves_instances::domain::state::InstanceState;
use delves_instances::domain::template::Template;
use delves_instances::error::InstanceError;
use delves_instances::settings::InstanceSettings;
use delves_test_support::TransactionRecord;

use common::{crypt, harness, harness_with, key, player, request};

#[tokio::test]
async fn test_create_provisions_world_and_moves_owner_in() {
    // Arrange
    let h = harness();
    let owner = player();

    // Act
    let summary = h.create("crypt", owner, false).await;

    // Assert
    let world = h.world_of(summary.id);
    assert_eq!(summary.state, InstanceState::Active);
    assert_eq!(summary.display_name, "The Crypt");
    assert_eq!(summary.world.as_deref(), Some(world.as_str()));
    assert_eq!(summary.occupants, vec![owner]);
    assert_eq!(summary.remaining_secs, 30 * 60);
    assert!(h.host.is_loaded(&world));
    let location = h.host.location_of(owner).unwrap();
    assert_eq!(location.world, world);
    assert_eq!(location.location, Location::at(5.0, 70.0, 5.0));
    assert!(h.has_access(owner));
    assert_eq!(
        h.transactions.records(),
        vec![TransactionRecord::Taken(owner, vec![key()])]
    );
    assert!(h.fixture.world_container().join(&world).join("level.dat").is_file());
}

#[tokio::test]
async fn test_create_unknown_template_is_refused() {
    let h = harness();

    let result = h.service.create(request("catacombs", player(), false)).await;

    assert!(matches!(result, Err(InstanceError::UnknownTemplate(name)) if name == "catacombs"));
    assert!(h.service.registry().is_empty());
}

#[tokio::test]
async fn test_create_is_blocked_by_cooldown_until_it_elapses() {
    // Arrange
    let h = harness();
    let owner = player();
    h.create("crypt", owner, false).await;
    h.service.leave(owner).await.unwrap();

    // Act
    let blocked = h.service.create(request("crypt", owner, false)).await;
    h.clock.advance(TimeDelta::seconds(60));
    let allowed = h.service.create(request("crypt", owner, false)).await;

    // Assert
    assert!(matches!(
        blocked,
        Err(InstanceError::Cooldown { remaining_secs: 60, .. })
    ));
    assert_eq!(allowed.unwrap().state, InstanceState::Active);
}

#[tokio::test]
async fn test_failed_provisioning_refunds_and_leaves_nothing_visible() {
    // Arrange
    let h = harness();
    let owner = player();
    h.host.refuse_loads(true);

    // Act
    let result = h.service.create(request("crypt", owner, false)).await;

    // Assert
    assert!(matches!(
        result,
        Err(InstanceError::Provisioning(ProvisioningError::WorldLoadFailed { .. }))
    ));
    assert!(h.service.list().is_empty());
    assert!(h.service.registry().is_empty());
    assert!(!h.has_access(owner));
    assert_eq!(
        h.transactions.records(),
        vec![
            TransactionRecord::Taken(owner, vec![key()]),
            TransactionRecord::Refunded(owner, vec![key()]),
        ]
    );

    // No cooldown was recorded for the failed attempt.
    h.host.refuse_loads(false);
    assert!(h.service.create(request("crypt", owner, false)).await.is_ok());
}

#[tokio::test]
async fn test_missing_template_directory_fails_provisioning() {
    // Arrange
    let h = harness();
    std::fs::remove_dir_all(h.fixture.template_dir().join("vault")).unwrap();

    // Act
    let result = h.service.create(request("vault", player(), false)).await;

    // Assert
    assert!(matches!(
        result,
        Err(InstanceError::Provisioning(ProvisioningError::TemplateMissing { .. }))
    ));
    assert!(h.service.registry().is_empty());
}

#[tokio::test]
async fn test_unmet_requirements_create_nothing() {
    let h = harness();
    let owner = player();
    h.transactions.refuse_take(true);

    let result = h.service.create(request("crypt", owner, false)).await;

    assert!(matches!(result, Err(InstanceError::RequirementsUnmet(p)) if p == owner));
    assert!(h.service.registry().is_empty());
    assert!(h.transactions.records().is_empty());
}

#[tokio::test]
async fn test_global_instance_cap_is_enforced() {
    // Arrange
    let settings = InstanceSettings {
        max_instances: Some(1),
        ..InstanceSettings::default()
    };
    let h = harness_with(vec![Template::new("vault")], settings);
    h.create("vault", player(), false).await;

    // Act
    let result = h.service.create(request("vault", player(), false)).await;

    // Assert
    assert!(matches!(result, Err(InstanceError::CapacityReached { limit: 1 })));
}

#[tokio::test]
async fn test_template_instance_cap_is_enforced() {
    // Arrange
    let limited = Template {
        max_instances: Some(1),
        ..Template::new("vault")
    };
    let h = harness_with(vec![limited, Template::new("barracks")], InstanceSettings::default());
    h.create("vault", player(), false).await;

    // Act
    let refused = h.service.create(request("vault", player(), false)).await;
    let other = h.service.create(request("barracks", player(), false)).await;

    // Assert
    assert!(matches!(
        refused,
        Err(InstanceError::TemplateCapacityReached { limit: 1, .. })
    ));
    assert!(other.is_ok());
}

#[tokio::test]
async fn test_player_inside_an_instance_cannot_create_another() {
    let h = harness();
    let owner = player();
    let first = h.create("vault", owner, false).await;

    let result = h.service.create(request("barracks", owner, false)).await;

    assert!(matches!(
        result,
        Err(InstanceError::AlreadyInInstance { instance, .. }) if instance == first.id
    ));
}

#[tokio::test]
async fn test_concurrent_creates_of_one_template_get_separate_worlds() {
    // Arrange
    let h = harness_with(vec![crypt()], InstanceSettings::default());
    let (alice, bob) = (player(), player());

    // Act
    let (a, b) = tokio::join!(
        h.service.create(request("crypt", alice, false)),
        h.service.create(request("crypt", bob, false)),
    );

    // Assert
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.id, b.id);
    assert_ne!(a.world, b.world);
    assert!(h.host.is_loaded(&h.world_of(a.id)));
    assert!(h.host.is_loaded(&h.world_of(b.id)));
    assert_eq!(h.service.list().len(), 2);
}
