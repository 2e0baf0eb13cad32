//! Process wiring: builds every component from the configuration, and tears
//! them down again on shutdown.

use std::sync::Arc;

use delves_access::cooldown::CooldownLedger;
use delves_access::security::{AuditSink, SecurityGate, TracingAuditSink};
use delves_access::snapshot::{discard_snapshot, write_snapshot};
use delves_conditions::factory::ConditionFactory;
use delves_core::authority::{Authority, AuthorityThread};
use delves_core::clock::{Clock, SystemClock};
use delves_core::host::WorldHost;
use delves_core::transactions::{NoTransactions, ResourceTransactions};
use delves_instances::application::reaper::Reaper;
use delves_instances::application::{InstanceContext, InstanceService};
use delves_provisioning::ProvisioningPipeline;
use tracing::{info, warn};

use crate::catalog::load_catalog;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::host::LocalWorldHost;
use crate::state::AppState;

/// A started instance manager: the state handed to the router plus the
/// authoritative thread it runs on.
#[derive(Debug)]
pub struct Delves {
    /// State shared with request handlers.
    pub state: AppState,
    /// The authoritative thread.
    pub thread: AuthorityThread,
    config: ServerConfig,
}

/// Builds every component and prepares the world container.
///
/// A cooldown snapshot left by a previous run is deleted unread, and
/// instance directories left behind by a previous run are removed.
///
/// # Errors
///
/// Returns `AppError` if the catalog cannot be loaded, the world container
/// cannot be created or the authoritative thread cannot be spawned.
pub async fn start(config: &ServerConfig) -> Result<Delves, AppError> {
    if let Err(e) = discard_snapshot(&config.cooldown_snapshot) {
        warn!(path = %config.cooldown_snapshot.display(), error = %e, "could not discard cooldown snapshot");
    }
    std::fs::create_dir_all(&config.world_container)?;

    let catalog = load_catalog(
        &config.template_catalog,
        &ConditionFactory::with_builtin(),
        config.aggregation,
    )?;
    for template in catalog.templates.iter() {
        if !config.template_dir.join(&template.name).is_dir() {
            warn!(template = %template.name, dir = %config.template_dir.display(), "template world directory is missing");
        }
    }

    let thread = Authority::spawn("delves-authority")?;
    let host = Arc::new(LocalWorldHost::new(config.primary_spawn.clone()));
    let world_host = Arc::clone(&host) as Arc<dyn WorldHost>;
    let clock = Arc::new(SystemClock) as Arc<dyn Clock>;
    let pipeline = ProvisioningPipeline::new(
        Arc::clone(&world_host),
        thread.authority(),
        config.pipeline_settings(),
    );

    match pipeline.sweep_orphans().await {
        Ok(removed) if !removed.is_empty() => {
            info!(removed = removed.len(), "removed orphaned instance directories");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "orphan sweep failed"),
    }

    let ctx = InstanceContext {
        host: world_host,
        authority: thread.authority(),
        clock: Arc::clone(&clock),
        transactions: Arc::new(NoTransactions) as Arc<dyn ResourceTransactions>,
        gate: Arc::new(SecurityGate::new(
            config.world_prefix.clone(),
            Arc::new(TracingAuditSink) as Arc<dyn AuditSink>,
            clock,
        )),
        cooldowns: Arc::new(CooldownLedger::new()),
        engine: Arc::new(catalog.engine),
        pipeline: Arc::new(pipeline),
        templates: Arc::new(catalog.templates),
        settings: config.instances,
    };

    Ok(Delves {
        state: AppState::new(InstanceService::new(ctx), host),
        thread,
        config: config.clone(),
    })
}

impl Delves {
    /// A reaper sweeping at the configured interval.
    #[must_use]
    pub fn reaper(&self) -> Reaper {
        Reaper::new(self.state.service.clone(), self.config.reaper_interval)
    }

    /// Deletes every instance, writes the cooldown snapshot and stops the
    /// authoritative thread.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Server` if the authoritative thread could not be
    /// joined.
    pub async fn shutdown(self) -> Result<(), AppError> {
        match self.state.service.decommission_all().await {
            Ok(report) => info!(
                deleted = report.deleted,
                retrying = report.retrying,
                abandoned = report.abandoned,
                "decommissioned instances for shutdown"
            ),
            Err(e) => warn!(error = %e, "could not decommission instances on shutdown"),
        }

        let cooldowns = &self.state.service.context().cooldowns;
        if let Err(e) = write_snapshot(&self.config.cooldown_snapshot, cooldowns) {
            warn!(path = %self.config.cooldown_snapshot.display(), error = %e, "could not write cooldown snapshot");
        }

        let thread = self.thread;
        tokio::task::spawn_blocking(move || thread.shutdown())
            .await
            .map_err(std::io::Error::other)?;
        info!("authoritative thread stopped");
        Ok(())
    }
}
