//! The reaper: a fixed-interval background sweep.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::lifecycle::SweepReport;
use super::service::InstanceService;

/// Periodically expires, deletes and retries instances.
#[derive(Debug, Clone)]
pub struct Reaper {
    service: InstanceService,
    interval: Duration,
}

impl Reaper {
    /// Creates a reaper sweeping `service` every `interval`.
    #[must_use]
    pub fn new(service: InstanceService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Runs one sweep and logs what it did.
    pub async fn sweep_once(&self) -> SweepReport {
        match self.service.sweep().await {
            Ok(report) => {
                if report == SweepReport::default() {
                    debug!("reaper sweep found nothing to do");
                } else {
                    info!(
                        completed = report.completed,
                        expired = report.expired,
                        deleted = report.deleted,
                        retrying = report.retrying,
                        abandoned = report.abandoned,
                        "reaper sweep finished"
                    );
                }
                report
            }
            Err(e) => {
                warn!(error = %e, "reaper sweep failed");
                SweepReport::default()
            }
        }
    }

    /// Sweeps on every interval tick until `shutdown` turns `true` or its
    /// sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis(), "reaper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("reaper stopped");
    }
}
