//! Event registry: classifies loaded definitions into the four trigger
//! lookup structures and owns the per-chain state-machine runtimes.

use std::collections::{BTreeMap, HashMap};

use crate::chain::ChainRuntime;
use crate::model::{EventDefinition, Trigger};

/// Index key for a fixed-date event: `"month-day"`, or the intercalary
/// month name when the event targets one.
pub fn fixed_key(month: usize, day: i64, intercalary: Option<&str>) -> String {
    match intercalary {
        Some(name) => name.to_string(),
        None => format!("{month}-{day}"),
    }
}

/// Classified view of the loaded definitions. Rebuilt wholesale on `load`;
/// chain runtimes survive reloads so mid-flight state is never disturbed.
#[derive(Debug, Default)]
pub struct EventRegistry {
    definitions: Vec<EventDefinition>,
    by_id: HashMap<String, usize>,
    /// Fixed-date index; key collisions append, they never overwrite.
    fixed_index: HashMap<String, Vec<usize>>,
    /// Longest fixed-event duration, bounding the lookback when matching.
    max_fixed_duration: i64,
    interval: Vec<usize>,
    /// Conditional definitions, stable-sorted ascending by tier.
    conditionals: Vec<usize>,
    chains: BTreeMap<String, ChainRuntime>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `definitions` into the lookup structures. Called on initial
    /// load and on explicit reload — never implicitly.
    ///
    /// Chain handling: an id that already has a runtime keeps it (with the
    /// refreshed state list); new chains get a runtime starting at
    /// `current_day`; chains with zero states are skipped with a warning.
    pub fn load(
        &mut self,
        definitions: Vec<EventDefinition>,
        current_day: i64,
        avg_year_days: Option<f64>,
    ) {
        self.definitions = Vec::with_capacity(definitions.len());
        self.by_id = HashMap::new();
        self.fixed_index = HashMap::new();
        self.max_fixed_duration = 0;
        self.interval = Vec::new();
        self.conditionals = Vec::new();

        for def in definitions {
            if self.by_id.contains_key(&def.id) {
                tracing::warn!(id = %def.id, "duplicate event id, keeping the first definition");
                continue;
            }
            let index = self.definitions.len();
            self.by_id.insert(def.id.clone(), index);
            match &def.trigger {
                Trigger::Fixed { month, day, intercalary, duration_days, .. } => {
                    let key = fixed_key(*month, *day, intercalary.as_deref());
                    self.fixed_index.entry(key).or_default().push(index);
                    self.max_fixed_duration = self.max_fixed_duration.max(*duration_days);
                }
                Trigger::Interval { .. } => self.interval.push(index),
                Trigger::Conditional { .. } => self.conditionals.push(index),
                Trigger::Chain { seed, states, initial_state } => {
                    if let Some(runtime) = self.chains.get_mut(&def.id) {
                        runtime.set_states(states.clone());
                    } else if let Some(runtime) = ChainRuntime::new(
                        &def.id,
                        states.clone(),
                        *seed,
                        initial_state.as_deref(),
                        current_day,
                        avg_year_days,
                    ) {
                        self.chains.insert(def.id.clone(), runtime);
                    } else {
                        tracing::warn!(id = %def.id, "chain event has no states, skipping");
                    }
                }
            }
            self.definitions.push(def);
        }

        // Stable sort: tier 1 before tier 2, load order within a tier.
        let definitions = &self.definitions;
        self.conditionals.sort_by_key(|&i| match &definitions[i].trigger {
            Trigger::Conditional { tier, .. } => *tier,
            _ => u8::MAX,
        });

        // Drop runtimes for ids that are no longer chain definitions.
        let by_id = &self.by_id;
        let definitions = &self.definitions;
        self.chains.retain(|id, _| {
            by_id
                .get(id)
                .is_some_and(|&i| matches!(definitions[i].trigger, Trigger::Chain { .. }))
        });
    }

    pub fn definitions(&self) -> &[EventDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: &str) -> Option<&EventDefinition> {
        self.by_id.get(id).map(|&i| &self.definitions[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut EventDefinition> {
        self.by_id.get(id).map(|&i| &mut self.definitions[i])
    }

    pub fn fixed_candidates(&self, key: &str) -> &[usize] {
        self.fixed_index.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn max_fixed_duration(&self) -> i64 {
        self.max_fixed_duration
    }

    pub fn interval_indices(&self) -> &[usize] {
        &self.interval
    }

    /// Conditional definition indices, tier-ascending.
    pub fn conditional_indices(&self) -> &[usize] {
        &self.conditionals
    }

    pub fn definition_at(&self, index: usize) -> &EventDefinition {
        &self.definitions[index]
    }

    /// Chain event ids in load order (deterministic evaluation order).
    pub fn chain_ids(&self) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|d| matches!(d.trigger, Trigger::Chain { .. }) && self.chains.contains_key(&d.id))
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn chain(&self, id: &str) -> Option<&ChainRuntime> {
        self.chains.get(id)
    }

    pub fn chain_mut(&mut self, id: &str) -> Option<&mut ChainRuntime> {
        self.chains.get_mut(id)
    }

    pub fn chains(&self) -> impl Iterator<Item = (&String, &ChainRuntime)> {
        self.chains.iter()
    }

    pub fn chains_mut(&mut self) -> impl Iterator<Item = (&String, &mut ChainRuntime)> {
        self.chains.iter_mut()
    }
}
