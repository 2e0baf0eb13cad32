//! Teardown: explicit deletion, the periodic sweep and decommission retries.

use chrono::{DateTime, Utc};
use delves_core::authority::Tick;
use delves_core::error::DecommissionError;
use delves_core::ids::InstanceId;
use serde::Serialize;
use tracing::{error, info, warn};

use super::service::InstanceService;
use crate::domain::instance::{DeletionFailure, Instance};
use crate::domain::state::InstanceState;
use crate::error::InstanceError;
use crate::settings::to_delta;

/// What happened to a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// The world is gone and the instance was removed.
    Deleted,
    /// Decommission failed; the reaper retries at `at`.
    RetryScheduled {
        /// When the next attempt is due.
        at: DateTime<Utc>,
    },
    /// Decommission failed too often. The instance was removed and its
    /// directory left behind for an operator.
    Abandoned,
    /// Another decommission attempt is already running.
    InProgress,
}

/// Counts from one reaper sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Instances whose conditions were found satisfied.
    pub completed: usize,
    /// Instances that timed out.
    pub expired: usize,
    /// Instances fully deleted.
    pub deleted: usize,
    /// Decommissions that failed and will be retried.
    pub retrying: usize,
    /// Instances given up on.
    pub abandoned: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: DeletionOutcome) {
        match outcome {
            DeletionOutcome::Deleted => self.deleted += 1,
            DeletionOutcome::RetryScheduled { .. } => self.retrying += 1,
            DeletionOutcome::Abandoned => self.abandoned += 1,
            DeletionOutcome::InProgress => {}
        }
    }
}

impl InstanceService {
    /// Deletes an instance now, skipping any remaining grace period or
    /// retry backoff. Occupants are relocated first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no visible instance has `id`.
    pub async fn delete(&self, id: InstanceId) -> Result<DeletionOutcome, InstanceError> {
        let this = self.clone();
        let claimed = self
            .ctx
            .authority
            .run(move |tick| this.claim_deletion(tick, id))
            .await??;
        if !claimed {
            return Ok(DeletionOutcome::InProgress);
        }
        self.decommission(id).await
    }

    /// One reaper pass: expire timed-out instances, start deleting those
    /// whose grace period is over, and retry due decommissions.
    ///
    /// # Errors
    ///
    /// Returns `Authority` if the authoritative thread has stopped.
    pub async fn sweep(&self) -> Result<SweepReport, InstanceError> {
        let this = self.clone();
        let (mut report, due) = self
            .ctx
            .authority
            .run(move |tick| this.collect_due(tick))
            .await?;

        for id in due {
            report.record(self.decommission(id).await?);
        }
        Ok(report)
    }

    /// Deletes every visible instance. Used on shutdown.
    ///
    /// # Errors
    ///
    /// Returns `Authority` if the authoritative thread has stopped.
    pub async fn decommission_all(&self) -> Result<SweepReport, InstanceError> {
        let mut report = SweepReport::default();
        for summary in self.list() {
            match self.delete(summary.id).await {
                Ok(outcome) => report.record(outcome),
                Err(InstanceError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    fn claim_deletion(&self, tick: &Tick, id: InstanceId) -> Result<bool, InstanceError> {
        let now = self.ctx.clock.now();
        let grace = to_delta(self.ctx.settings.grace);
        let claimed = self
            .registry
            .update(tick, id, |instance| -> Result<bool, InstanceError> {
                match instance.state() {
                    InstanceState::Provisioning => Err(InstanceError::NotFound(id)),
                    InstanceState::Active => {
                        instance.expire(now, grace)?;
                        instance.begin_deletion()?;
                        Ok(true)
                    }
                    InstanceState::Completed | InstanceState::Expiring => {
                        instance.begin_deletion()?;
                        Ok(true)
                    }
                    InstanceState::Deleting => Ok(instance.claim_retry(DateTime::<Utc>::MAX_UTC)),
                    InstanceState::Deleted => Ok(false),
                }
            })
            .ok_or(InstanceError::NotFound(id))??;
        if claimed {
            self.evict_all(tick, id);
        }
        Ok(claimed)
    }

    fn collect_due(&self, tick: &Tick) -> (SweepReport, Vec<InstanceId>) {
        let now = self.ctx.clock.now();
        let grace = to_delta(self.ctx.settings.grace);
        let mut report = SweepReport::default();
        let mut due = Vec::new();
        for id in self.registry.ids() {
            if self.evaluate_completion(tick, id) {
                report.completed += 1;
            }
            let (expired_now, deleting_now, retry) = self
                .registry
                .update(tick, id, |instance| {
                    let expired_now = instance.is_expired(now) && instance.expire(now, grace).is_ok();
                    let deleting_now = instance.linger_elapsed(now) && instance.begin_deletion().is_ok();
                    let retry = !deleting_now && instance.claim_retry(now);
                    (expired_now, deleting_now, retry)
                })
                .unwrap_or_default();
            if expired_now {
                info!(instance_id = %id, "instance expired");
                report.expired += 1;
            }
            if deleting_now {
                self.evict_all(tick, id);
                due.push(id);
            } else if retry {
                due.push(id);
            }
        }
        (report, due)
    }

    async fn decommission(&self, id: InstanceId) -> Result<DeletionOutcome, InstanceError> {
        let result = self.ctx.pipeline.decommission(id).await;
        let this = self.clone();
        Ok(self
            .ctx
            .authority
            .run(move |tick| this.settle_deletion(tick, id, result))
            .await?)
    }

    fn settle_deletion(
        &self,
        tick: &Tick,
        id: InstanceId,
        result: Result<(), DecommissionError>,
    ) -> DeletionOutcome {
        match result {
            Ok(()) => {
                if let Some(Err(e)) = self.registry.update(tick, id, Instance::mark_deleted) {
                    warn!(instance_id = %id, error = %e, "deleted instance was not in DELETING");
                }
                self.registry.remove(tick, id);
                info!(instance_id = %id, "instance deleted");
                DeletionOutcome::Deleted
            }
            Err(e) => {
                let now = self.ctx.clock.now();
                let policy = self.ctx.settings.retry;
                let failure = self
                    .registry
                    .update(tick, id, |instance| instance.deletion_failed(now, &policy));
                match failure {
                    Some(DeletionFailure::RetryAt(at)) => {
                        warn!(instance_id = %id, error = %e, retry_at = %at, "decommission failed; will retry");
                        DeletionOutcome::RetryScheduled { at }
                    }
                    Some(DeletionFailure::Exhausted { attempts }) => {
                        error!(
                            instance_id = %id,
                            attempts,
                            error = %e,
                            directory = %self.ctx.pipeline.world_dir(id).display(),
                            "decommission abandoned; world directory left in place"
                        );
                        self.registry.remove(tick, id);
                        DeletionOutcome::Abandoned
                    }
                    None => {
                        warn!(instance_id = %id, error = %e, "decommission failed for untracked instance");
                        DeletionOutcome::Abandoned
                    }
                }
            }
        }
    }

    fn evict_all(&self, tick: &Tick, id: InstanceId) {
        let occupants = self
            .registry
            .update(tick, id, Instance::take_occupants)
            .unwrap_or_default();
        for player in occupants {
            self.ctx.gate.revoke(player);
            self.relocate(tick, player);
        }
    }
}
