//! Chain event runtime: a seeded state machine that is always in exactly one
//! named state, transitioning by weighted random draw with a parsed duration.

use crate::duration::parse_duration;
use crate::model::{ChainStateDef, ChainStateVector};
use crate::rng::SeededRng;

/// Mutable runtime for one chain definition. Lives as long as the registry;
/// reloads replace the state list but never disturb mid-flight progress.
/// Each runtime owns its own [`SeededRng`], so chain sequences are
/// structurally independent.
#[derive(Debug, Clone)]
pub struct ChainRuntime {
    event_id: String,
    states: Vec<ChainStateDef>,
    rng: SeededRng,
    state: String,
    entered_day: i64,
    duration_days: i64,
    /// Inclusive final day of the current state.
    end_day: i64,
}

impl ChainRuntime {
    /// Build a runtime at `start_day`. Returns `None` for a chain with no
    /// states (callers log and skip). A valid `initial_state` is honored
    /// without consuming a draw; otherwise one weighted draw selects the
    /// starting state.
    pub fn new(
        event_id: &str,
        states: Vec<ChainStateDef>,
        seed: u32,
        initial_state: Option<&str>,
        start_day: i64,
        avg_year_days: Option<f64>,
    ) -> Option<Self> {
        if states.is_empty() {
            return None;
        }
        let mut rng = SeededRng::new(seed);
        let index = match initial_state.and_then(|name| states.iter().position(|s| s.name == name))
        {
            Some(i) => i,
            None => pick_weighted(&states, &mut rng),
        };
        let mut runtime = Self {
            event_id: event_id.to_string(),
            states,
            rng,
            state: String::new(),
            entered_day: start_day,
            duration_days: 1,
            end_day: start_day,
        };
        runtime.enter(index, start_day, avg_year_days);
        Some(runtime)
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn entered_day(&self) -> i64 {
        self.entered_day
    }

    pub fn duration_days(&self) -> i64 {
        self.duration_days
    }

    pub fn end_day(&self) -> i64 {
        self.end_day
    }

    /// Definition of the current state, when it still exists in the state
    /// list (a reload may have renamed it).
    pub fn current_state_def(&self) -> Option<&ChainStateDef> {
        self.states.iter().find(|s| s.name == self.state)
    }

    /// Replace the state list on reload, keeping runtime progress.
    pub fn set_states(&mut self, states: Vec<ChainStateDef>) {
        self.states = states;
    }

    fn enter(&mut self, index: usize, day: i64, avg_year_days: Option<f64>) {
        let state = &self.states[index];
        let duration = parse_duration(&state.duration, &mut self.rng, avg_year_days);
        self.state = state.name.clone();
        self.entered_day = day;
        self.duration_days = duration;
        self.end_day = day + duration - 1;
    }

    /// Transition into the next state starting on `day`: one weighted draw
    /// for the state, then the new state's duration draws.
    pub fn transition(&mut self, day: i64, avg_year_days: Option<f64>) {
        let index = pick_weighted(&self.states, &mut self.rng);
        self.enter(index, day, avg_year_days);
    }

    /// Run every transition needed so the current state covers `day`.
    /// Each new state starts the day after the previous one ended, so the
    /// draw count is bounded by the number of transitions crossed — not the
    /// number of days — which is what makes anchor-reset jumps O(1) in days.
    /// Returns the number of transitions taken.
    pub fn catch_up(&mut self, day: i64, avg_year_days: Option<f64>) -> u64 {
        let mut transitions = 0;
        while self.end_day < day {
            let next_start = self.end_day + 1;
            self.transition(next_start, avg_year_days);
            transitions += 1;
        }
        transitions
    }

    /// Force the runtime into a specific state without touching its own
    /// rng (override durations are rolled on a derived randomizer so the
    /// natural sequence resumes untouched after expiry).
    pub fn force(&mut self, state: &str, day: i64, duration_days: i64) {
        self.state = state.to_string();
        self.entered_day = day;
        self.duration_days = duration_days.max(1);
        self.end_day = day + self.duration_days.max(1) - 1;
    }

    /// Capture the runtime for a snapshot.
    pub fn vector(&self) -> ChainStateVector {
        ChainStateVector {
            state: self.state.clone(),
            entered_day: self.entered_day,
            duration_days: self.duration_days,
            end_day: self.end_day,
            rng_state: self.rng.state(),
        }
    }

    /// Restore a previously captured vector, including the rng state.
    pub fn restore(&mut self, vector: &ChainStateVector) {
        self.state = vector.state.clone();
        self.entered_day = vector.entered_day;
        self.duration_days = vector.duration_days;
        self.end_day = vector.end_day;
        self.rng.set_state(vector.rng_state);
    }
}

/// Weighted state selection: one draw, cumulative walk, strict `>` against
/// the roll. Rounding remainders fall to the last state; a zero total weight
/// falls to the first.
fn pick_weighted(states: &[ChainStateDef], rng: &mut SeededRng) -> usize {
    let weights: Vec<f64> = states.iter().map(|s| s.weight.max(0.0)).collect();
    rng.weighted_index(&weights).unwrap_or(0)
}
