//! Integration tests for expiry, deletion and decommission retries.

mod common;

use std::time::Duration;

use chrono::TimeDelta;
use delves_instances::application::{DeletionOutcome, SweepReport};
use delves_instances::application::reaper::Reaper;
use delves_instances::domain::state::InstanceState;
use delves_instances::error::InstanceError;
use delves_instances::settings::{InstanceSettings, RetryPolicy};
use tokio::sync::watch;

use common::{barracks, crypt, harness, harness_with, player, vault};

fn two_attempts() -> InstanceSettings {
    InstanceSettings {
        retry: RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_attempts: 2,
        },
        ..InstanceSettings::default()
    }
}

#[tokio::test]
async fn test_timed_out_instance_expires_then_is_deleted_after_grace() {
    // Arrange
    let h = harness();
    let owner = player();
    let created = h.create("crypt", owner, false).await;
    let world = h.world_of(created.id);

    // Act
    h.clock.advance(TimeDelta::minutes(30));
    let expired = h.service.sweep().await.unwrap();
    let state_after_expiry = h.service.get(created.id).unwrap().state;
    h.clock.advance(TimeDelta::seconds(30));
    let deleted = h.service.sweep().await.unwrap();

    // Assert
    assert_eq!(
        expired,
        SweepReport {
            expired: 1,
            ..SweepReport::default()
        }
    );
    assert_eq!(state_after_expiry, InstanceState::Expiring);
    assert_eq!(deleted.deleted, 1);
    assert!(matches!(h.service.get(created.id), Err(InstanceError::NotFound(_))));
    assert!(h.host.unloaded().contains(&world));
    assert!(h.in_primary_world(owner));
}

#[tokio::test]
async fn test_sweep_leaves_live_instances_alone() {
    let h = harness();
    h.create("crypt", player(), false).await;

    let report = h.service.sweep().await.unwrap();

    assert_eq!(report, SweepReport::default());
    assert_eq!(h.service.list().len(), 1);
}

#[tokio::test]
async fn test_explicit_delete_skips_grace() {
    // Arrange
    let h = harness();
    let owner = player();
    let created = h.create("crypt", owner, false).await;
    let world = h.world_of(created.id);

    // Act
    let outcome = h.service.delete(created.id).await.unwrap();

    // Assert
    assert_eq!(outcome, DeletionOutcome::Deleted);
    assert!(h.service.list().is_empty());
    assert!(!h.fixture.world_container().join(&world).exists());
    assert!(h.in_primary_world(owner));
    assert!(!h.has_access(owner));
}

#[tokio::test]
async fn test_delete_unknown_instance_is_not_found() {
    let h = harness();
    let created = h.create("vault", player(), false).await;
    h.service.delete(created.id).await.unwrap();

    let result = h.service.delete(created.id).await;

    assert!(matches!(result, Err(InstanceError::NotFound(id)) if id == created.id));
}

#[tokio::test]
async fn test_failed_decommission_is_retried_with_backoff_then_abandoned() {
    // Arrange
    let h = harness_with(vec![crypt()], two_attempts());
    let owner = player();
    let created = h.create("crypt", owner, false).await;
    let world = h.world_of(created.id);
    h.host.refuse_unload(&world);
    h.service.leave(owner).await.unwrap();
    h.clock.advance(TimeDelta::seconds(30));

    // Act
    let first = h.service.sweep().await.unwrap();
    let state_while_retrying = h.service.get(created.id).unwrap().state;
    let before_backoff = h.service.sweep().await.unwrap();
    h.clock.advance(TimeDelta::seconds(10));
    let second = h.service.sweep().await.unwrap();

    // Assert
    assert_eq!(first.retrying, 1);
    assert_eq!(state_while_retrying, InstanceState::Deleting);
    assert_eq!(before_backoff, SweepReport::default());
    assert_eq!(second.abandoned, 1);
    assert!(h.service.registry().is_empty());
    assert!(h.fixture.world_container().join(&world).is_dir());
}

#[tokio::test]
async fn test_decommission_retry_succeeds_once_unload_is_allowed() {
    // Arrange
    let h = harness_with(vec![crypt()], two_attempts());
    let created = h.create("crypt", player(), false).await;
    let world = h.world_of(created.id);
    h.host.refuse_unload(&world);
    let first = h.service.delete(created.id).await.unwrap();

    // Act
    h.host.allow_unload(&world);
    h.clock.advance(TimeDelta::seconds(10));
    let retried = h.service.sweep().await.unwrap();

    // Assert
    assert!(matches!(first, DeletionOutcome::RetryScheduled { .. }));
    assert_eq!(retried.deleted, 1);
    assert!(!h.fixture.world_container().join(&world).exists());
}

#[tokio::test]
async fn test_explicit_delete_skips_retry_backoff() {
    // Arrange
    let h = harness_with(vec![crypt()], two_attempts());
    let created = h.create("crypt", player(), false).await;
    let world = h.world_of(created.id);
    h.host.refuse_unload(&world);
    h.service.delete(created.id).await.unwrap();
    h.host.allow_unload(&world);

    // Act
    let outcome = h.service.delete(created.id).await.unwrap();

    // Assert
    assert_eq!(outcome, DeletionOutcome::Deleted);
    assert!(h.service.registry().is_empty());
}

#[tokio::test]
async fn test_decommission_all_deletes_every_instance() {
    // Arrange
    let h = harness_with(vec![crypt(), vault(), barracks()], InstanceSettings::default());
    let first = h.create("crypt", player(), false).await;
    let second = h.create("vault", player(), true).await;

    // Act
    let report = h.service.decommission_all().await.unwrap();

    // Assert
    assert_eq!(report.deleted, 2);
    assert!(h.service.list().is_empty());
    assert!(!h.host.is_loaded(&h.world_of(first.id)));
    assert!(!h.host.is_loaded(&h.world_of(second.id)));
}

#[tokio::test]
async fn test_reaper_sweep_once_reports_work() {
    let h = harness();
    h.create("crypt", player(), false).await;
    h.clock.advance(TimeDelta::minutes(31));
    let reaper = Reaper::new(h.service.clone(), Duration::from_secs(1));

    let report = reaper.sweep_once().await;

    assert_eq!(report.expired, 1);
}

#[tokio::test]
async fn test_reaper_stops_on_shutdown_signal() {
    // Arrange
    let h = harness();
    let reaper = Reaper::new(h.service.clone(), Duration::from_millis(10));
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(reaper.run(rx));
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Act
    tx.send(true).unwrap();
    let stopped = tokio::time::timeout(Duration::from_secs(5), handle).await;

    // Assert
    assert!(matches!(stopped, Ok(Ok(()))));
}
