//! The collaborators an instance service is built from.

use std::sync::Arc;

use delves_access::cooldown::CooldownLedger;
use delves_access::security::SecurityGate;
use delves_conditions::engine::CompletionEngine;
use delves_core::authority::Authority;
use delves_core::clock::Clock;
use delves_core::host::WorldHost;
use delves_core::transactions::ResourceTransactions;
use delves_provisioning::ProvisioningPipeline;

use crate::domain::template::TemplateCatalog;
use crate::settings::InstanceSettings;

/// Everything the instance service depends on, passed in explicitly.
#[derive(Clone)]
pub struct InstanceContext {
    /// Host engine capabilities.
    pub host: Arc<dyn WorldHost>,
    /// Handle to the authoritative thread.
    pub authority: Authority,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Requirement and reward bridge.
    pub transactions: Arc<dyn ResourceTransactions>,
    /// Legal-access flags.
    pub gate: Arc<SecurityGate>,
    /// Creation cooldowns.
    pub cooldowns: Arc<CooldownLedger>,
    /// Condition blueprints and evaluation.
    pub engine: Arc<CompletionEngine>,
    /// World provisioning.
    pub pipeline: Arc<ProvisioningPipeline>,
    /// Configured templates.
    pub templates: Arc<TemplateCatalog>,
    /// Service-wide settings.
    pub settings: InstanceSettings,
}

impl std::fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceContext")
            .field("authority", &self.authority)
            .field("templates", &self.templates.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
