//! Per-player instance creation cooldowns.
//!
//! Records are held in memory only and vanish on restart.

use std::collections::HashMap;

use dashmap::DashMap;
use delves_core::ids::PlayerId;

/// Last instance creation time of every player, in epoch milliseconds.
#[derive(Debug, Default)]
pub struct CooldownLedger {
    records: DashMap<PlayerId, i64>,
}

impl CooldownLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `player` created an instance at `now_millis`.
    pub fn record_creation(&self, player: PlayerId, now_millis: i64) {
        self.records.insert(player, now_millis);
    }

    /// Returns `true` if `player` may create an instance now.
    #[must_use]
    pub fn can_create(&self, player: PlayerId, cooldown_secs: u64, now_millis: i64) -> bool {
        self.remaining_seconds(player, cooldown_secs, now_millis) == 0
    }

    /// Whole seconds (rounded up) until `player` may create again.
    #[must_use]
    pub fn remaining_seconds(&self, player: PlayerId, cooldown_secs: u64, now_millis: i64) -> u64 {
        let Some(last) = self.records.get(&player).map(|entry| *entry) else {
            return 0;
        };
        let cooldown_millis = i64::try_from(cooldown_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let remaining = last
            .saturating_add(cooldown_millis)
            .saturating_sub(now_millis);
        if remaining <= 0 {
            0
        } else {
            u64::try_from(remaining).map_or(0, |millis| millis.div_ceil(1000))
        }
    }

    /// Forgets the record for `player`.
    pub fn reset(&self, player: PlayerId) {
        self.records.remove(&player);
    }

    /// Copies every record, for the operator-facing snapshot file.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<PlayerId, i64> {
        self.records
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}
