//! Time jumps. Small forward jumps replay every day so per-day bookkeeping
//! (override expiry, chain transitions) happens exactly as if the clock had
//! ticked; large jumps skip the replay and re-anchor each chain directly at
//! the target, which is O(transitions), not O(days).

use std::time::Instant;

use serde::Serialize;

use super::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpMode {
    /// Day-by-day replay; intermediate days are fully accounted for.
    Simulation,
    /// Direct re-anchor at the target; intermediate days were never
    /// evaluated and queries into the gap reflect post-jump state.
    AnchorReset,
}

/// What a jump did, for the caller's audit trail and UI.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceReport {
    pub mode: JumpMode,
    pub from_day: i64,
    pub to_day: i64,
    pub days_advanced: i64,
    /// True when intermediate days were skipped (anchor reset).
    pub has_history_gap: bool,
    pub elapsed_ms: u64,
}

impl Engine {
    /// Move the clock to `target`. Forward jumps within
    /// `max_simulation_days` simulate every day; larger ones anchor-reset.
    /// Backward jumps only reposition the clock — chain runtimes are never
    /// rolled back. Either way the day cache is rebuilt for the window
    /// ending at the new current day.
    pub fn advance_to_day(&mut self, target: i64) -> AdvanceReport {
        let started = Instant::now();
        let from = self.current_day;
        let days = target - from;

        let (mode, has_history_gap) = if days <= 0 {
            (JumpMode::Simulation, false)
        } else if days <= self.config.max_simulation_days {
            self.simulate_forward(from, target);
            (JumpMode::Simulation, false)
        } else {
            self.anchor_reset(target);
            (JumpMode::AnchorReset, true)
        };

        self.current_day = target;
        self.report_progress(1.0);
        self.rebuild_cache_window();

        let report = AdvanceReport {
            mode,
            from_day: from,
            to_day: target,
            days_advanced: days,
            has_history_gap,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            from = report.from_day,
            to = report.to_day,
            mode = ?report.mode,
            elapsed_ms = report.elapsed_ms,
            "clock advanced"
        );
        report
    }

    /// Replay every day in `(from, target]`: expire overrides on the day
    /// they lapse and let chains transition on their natural boundaries.
    fn simulate_forward(&mut self, from: i64, target: i64) {
        let avg = self.calendar.average_year_days();
        let span = target - from;
        let step = (span / 20).max(1);
        for day in from + 1..=target {
            self.overrides.purge_expired(day);
            self.advance_chains_to(day, avg);
            if (day - from) % step == 0 {
                self.report_progress((day - from) as f32 / span as f32);
            }
        }
    }

    /// Re-anchor without replay: purge overrides against the target, then
    /// catch every chain up in one pass. `catch_up` draws once per crossed
    /// transition, so the cost scales with state changes, never with days.
    fn anchor_reset(&mut self, target: i64) {
        let avg = self.calendar.average_year_days();
        self.overrides.purge_expired(target);
        let ids = self.registry.chain_ids();
        let total = ids.len().max(1);
        for (done, id) in ids.iter().enumerate() {
            if self.overrides.active_for(id, target).is_none() {
                if let Some(runtime) = self.registry.chain_mut(id) {
                    let transitions = runtime.catch_up(target, avg);
                    tracing::debug!(id = %id, transitions, "chain re-anchored");
                }
            }
            self.report_progress((done + 1) as f32 / total as f32);
        }
    }

    /// Advance chains for one simulated day, skipping any chain currently
    /// pinned by an override.
    fn advance_chains_to(&mut self, day: i64, avg: Option<f64>) {
        for id in self.registry.chain_ids() {
            if self.overrides.active_for(&id, day).is_some() {
                continue;
            }
            if let Some(runtime) = self.registry.chain_mut(&id) {
                runtime.catch_up(day, avg);
            }
        }
    }

    /// Drop the stale cache and pre-warm the trailing window ending at the
    /// current day. Querying backward never transitions a chain, so the
    /// warm-up cannot disturb runtime state.
    fn rebuild_cache_window(&mut self) {
        self.cache.clear();
        let buffer = self.config.cache_buffer_days.max(1);
        for day in (self.current_day - buffer + 1)..=self.current_day {
            self.active_events(day);
        }
    }

    fn report_progress(&mut self, fraction: f32) {
        if let Some(callback) = self.progress.as_mut() {
            callback(fraction.clamp(0.0, 1.0));
        }
    }
}
