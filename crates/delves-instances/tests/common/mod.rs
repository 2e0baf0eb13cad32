//! Shared test helpers for instance service integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use delves_access::cooldown::CooldownLedger;
use delves_access::security::{AuditSink, SecurityGate};
use delves_conditions::blueprint::{ConditionBlueprint, ConditionEntry, LeafKind, TemplateConditions};
use delves_conditions::engine::CompletionEngine;
use delves_conditions::tree::ProgressAggregation;
use delves_core::authority::{Authority, AuthorityThread};
use delves_core::clock::Clock;
use delves_core::event::KillEvent;
use delves_core::host::WorldHost;
use delves_core::ids::{EntityId, InstanceId, PlayerId};
use delves_core::location::{Location, Position};
use delves_core::transactions::{ResourceSpec, ResourceTransactions};
use delves_instances::application::{CreateInstance, InstanceContext, InstanceService};
use delves_instances::domain::instance::InstanceSummary;
use delves_instances::domain::template::{Template, TemplateCatalog};
use delves_instances::settings::InstanceSettings;
use delves_provisioning::{PipelineSettings, ProvisioningPipeline};
use delves_test_support::{
    ManualClock, MockWorldHost, RecordingAuditSink, RecordingTransactions, TemplateFixture,
};
use uuid::Uuid;

/// A fully wired service over mock collaborators and a real authoritative
/// thread.
pub struct Harness {
    pub fixture: TemplateFixture,
    pub host: Arc<MockWorldHost>,
    pub clock: Arc<ManualClock>,
    pub transactions: Arc<RecordingTransactions>,
    pub audit: Arc<RecordingAuditSink>,
    pub service: InstanceService,
    pub thread: AuthorityThread,
}

/// Requirement every test template asks for.
pub fn key() -> ResourceSpec {
    ResourceSpec {
        kind: "item".to_owned(),
        amount: 1,
        detail: Some("crypt_key".to_owned()),
    }
}

/// Reward every test template grants.
pub fn gold() -> ResourceSpec {
    ResourceSpec {
        kind: "money".to_owned(),
        amount: 10,
        detail: None,
    }
}

/// `crypt`: public-friendly, two occupants, 60s cooldown, two kills to win.
pub fn crypt() -> Template {
    Template {
        display_name: "The Crypt".to_owned(),
        cooldown_secs: 60,
        max_occupants: Some(2),
        spawn: Location::at(5.0, 70.0, 5.0),
        requirements: vec![key()],
        rewards: vec![gold()],
        ..Template::new("crypt")
    }
}

/// `vault`: no cooldown, won by reaching `(10, 64, 10)` within 3 blocks.
pub fn vault() -> Template {
    Template::new("vault")
}

/// `barracks`: no cooldown, won by killing every hostile present.
pub fn barracks() -> Template {
    Template::new("barracks")
}

fn leaf(kind: LeafKind) -> TemplateConditions {
    TemplateConditions::new(vec![ConditionEntry {
        priority: 0,
        blueprint: ConditionBlueprint::Leaf(kind),
    }])
}

/// Engine with blueprints for every test template.
pub fn engine() -> CompletionEngine {
    let mut engine = CompletionEngine::new(ProgressAggregation::Mean);
    engine.register_template("crypt", leaf(LeafKind::KillCount { count: 2 }));
    engine.register_template(
        "vault",
        leaf(LeafKind::ReachArea {
            point: Position::new(10.0, 64.0, 10.0),
            radius: 3.0,
        }),
    );
    engine.register_template("barracks", leaf(LeafKind::KillAll));
    engine
}

/// Harness with the standard templates and default settings.
pub fn harness() -> Harness {
    harness_with(vec![crypt(), vault(), barracks()], InstanceSettings::default())
}

/// Harness with custom templates and settings.
pub fn harness_with(templates: Vec<Template>, settings: InstanceSettings) -> Harness {
    let mut fixture = TemplateFixture::new();
    for template in &templates {
        fixture = fixture.with_template(&template.name);
    }
    let host = Arc::new(MockWorldHost::new());
    let clock = Arc::new(ManualClock::default());
    let transactions = Arc::new(RecordingTransactions::default());
    let audit = Arc::new(RecordingAuditSink::default());
    let thread = Authority::spawn("test-authority").unwrap();

    let world_host = Arc::clone(&host) as Arc<dyn WorldHost>;
    let pipeline = ProvisioningPipeline::new(
        Arc::clone(&world_host),
        thread.authority(),
        PipelineSettings {
            template_root: fixture.template_dir(),
            world_container: fixture.world_container(),
            world_prefix: "dungeon_".to_owned(),
        },
    );
    let ctx = InstanceContext {
        host: world_host,
        authority: thread.authority(),
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
        transactions: Arc::clone(&transactions) as Arc<dyn ResourceTransactions>,
        gate: Arc::new(SecurityGate::new(
            "dungeon_",
            Arc::clone(&audit) as Arc<dyn AuditSink>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        )),
        cooldowns: Arc::new(CooldownLedger::new()),
        engine: Arc::new(engine()),
        pipeline: Arc::new(pipeline),
        templates: Arc::new(templates.into_iter().collect::<TemplateCatalog>()),
        settings,
    };

    Harness {
        fixture,
        host,
        clock,
        transactions,
        audit,
        service: InstanceService::new(ctx),
        thread,
    }
}

/// A fresh player id.
pub fn player() -> PlayerId {
    PlayerId::from_uuid(Uuid::new_v4())
}

/// A creation request for `template`.
pub fn request(template: &str, owner: PlayerId, public: bool) -> CreateInstance {
    CreateInstance {
        template: template.to_owned(),
        owner,
        display_name: None,
        public,
    }
}

/// Kill of a nameless `zombie` in `world`.
pub fn kill_in(world: &str) -> KillEvent {
    kill_of(world, EntityId::from_uuid(Uuid::new_v4()))
}

/// Kill of `entity` in `world`.
pub fn kill_of(world: &str, entity: EntityId) -> KillEvent {
    KillEvent {
        world: world.to_owned(),
        killer: None,
        entity,
        entity_type: "zombie".to_owned(),
        custom_name: None,
    }
}

impl Harness {
    /// Creates an instance and asserts it went active.
    pub async fn create(&self, template: &str, owner: PlayerId, public: bool) -> InstanceSummary {
        self.service
            .create(request(template, owner, public))
            .await
            .unwrap()
    }

    /// Name of the world backing `id`.
    pub fn world_of(&self, id: InstanceId) -> String {
        format!("dungeon_{id}")
    }

    /// Returns `true` if `player` holds the legal-access flag.
    pub fn has_access(&self, player: PlayerId) -> bool {
        self.service.context().gate.has_access(player)
    }

    /// Returns `true` if `player` stands in the primary world.
    pub fn in_primary_world(&self, player: PlayerId) -> bool {
        self.host
            .location_of(player)
            .is_some_and(|location| location.world == "world")
    }
}
