//! Bookkeeping for operator-issued one-off overrides. The force-state entry
//! point itself lives on [`crate::engine::Engine`], which owns the registry
//! and persistence callback this manager must not reach into.

use crate::model::GmOverride;
use crate::rng::SeededRng;

/// Derive the randomizer seed for rolling an override's duration. Mixing the
/// chain seed with the day keeps the roll deterministic while leaving the
/// chain's own draw sequence untouched (natural accounting resumes exactly
/// where it left off once the override expires).
pub fn override_seed(chain_seed: u32, day: i64) -> u32 {
    let mut h = u64::from(chain_seed);
    h = h.wrapping_add((day as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
    h = (h ^ (h >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (h ^ (h >> 31)) as u32
}

/// Build the derived randomizer for an override duration roll.
pub fn override_rng(chain_seed: u32, day: i64) -> SeededRng {
    SeededRng::new(override_seed(chain_seed, day))
}

#[derive(Debug, Default)]
pub struct OverrideManager {
    records: Vec<GmOverride>,
    next_id: u64,
}

impl OverrideManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn insert(&mut self, record: GmOverride) {
        self.records.push(record);
    }

    pub fn list(&self) -> &[GmOverride] {
        &self.records
    }

    /// The override currently forcing `event_id` on `day`, if any. With
    /// overlapping records the most recent wins.
    pub fn active_for(&self, event_id: &str, day: i64) -> Option<&GmOverride> {
        self.records
            .iter()
            .rev()
            .find(|ov| ov.event_id == event_id && ov.active_on(day))
    }

    /// Drop overrides whose expiry the clock has passed. Returns how many
    /// were purged.
    pub fn purge_expired(&mut self, current_day: i64) -> usize {
        let before = self.records.len();
        self.records.retain(|ov| !ov.expired_by(current_day));
        before - self.records.len()
    }

    /// Replace all records (snapshot restore).
    pub fn replace(&mut self, records: Vec<GmOverride>) {
        self.next_id = records.iter().map(|ov| ov.id).max().unwrap_or(0);
        self.records = records;
    }
}
