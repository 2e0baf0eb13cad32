//! Test transactions — records every requirement and reward movement.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use delves_core::authority::Tick;
use delves_core::ids::PlayerId;
use delves_core::transactions::{ResourceSpec, ResourceTransactions};

/// One recorded transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionRecord {
    /// Requirements were taken.
    Taken(PlayerId, Vec<ResourceSpec>),
    /// Requirements were refunded.
    Refunded(PlayerId, Vec<ResourceSpec>),
    /// Rewards were granted.
    Granted(PlayerId, Vec<ResourceSpec>),
}

/// Transactions that succeed unless told otherwise, keeping a log.
#[derive(Debug, Default)]
pub struct RecordingTransactions {
    refuse_take: AtomicBool,
    log: Mutex<Vec<TransactionRecord>>,
}

impl RecordingTransactions {
    /// Makes `take_requirements` fail (and record nothing).
    pub fn refuse_take(&self, refuse: bool) {
        self.refuse_take.store(refuse, Ordering::SeqCst);
    }

    /// Returns every recorded transaction, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.log.lock().unwrap().clone()
    }

    fn push(&self, record: TransactionRecord) {
        self.log.lock().unwrap().push(record);
    }
}

impl ResourceTransactions for RecordingTransactions {
    fn take_requirements(&self, _tick: &Tick, player: PlayerId, req: &[ResourceSpec]) -> bool {
        if self.refuse_take.load(Ordering::SeqCst) {
            return false;
        }
        self.push(TransactionRecord::Taken(player, req.to_vec()));
        true
    }

    fn refund_requirements(&self, _tick: &Tick, player: PlayerId, req: &[ResourceSpec]) -> bool {
        self.push(TransactionRecord::Refunded(player, req.to_vec()));
        true
    }

    fn grant_rewards(&self, _tick: &Tick, player: PlayerId, rewards: &[ResourceSpec]) -> bool {
        self.push(TransactionRecord::Granted(player, rewards.to_vec()));
        true
    }
}
