//! The temporal event-simulation engine: phase-ordered evaluation, effect
//! resolution, operator overrides, and time jumps.
//!
//! One [`Engine`] instance owns all mutable state (registry, chain runtimes,
//! day cache, overrides). Every public operation is synchronous and runs to
//! completion; a multi-threaded host must treat the whole instance as one
//! exclusively-owned unit.

pub mod effects;
mod jump;
mod overrides;

pub use effects::{EffectContext, EffectRegistry, QueryContext};
pub use jump::{AdvanceReport, JumpMode};

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::calendar::{Calendar, CalendarDefinition, MINUTES_PER_DAY};
use crate::chain::ChainRuntime;
use crate::condition::Condition;
use crate::duration::parse_duration;
use crate::error::EngineError;
use crate::model::{
    ActiveEvent, ChainStateVector, EffectMap, EventDefinition, GmOverride, OverrideScope,
    Provenance, SCHEMA_VERSION, Snapshot, Trigger,
};
use crate::registry::{EventRegistry, fixed_key};
use crate::store::{DefinitionSource, StoreError};
use overrides::{OverrideManager, override_rng};

/// Callback invoked with the mutated definition when a permanent override
/// is applied; the host persists it however it stores definitions.
pub type PersistFn = Box<dyn FnMut(&EventDefinition) -> Result<(), StoreError>>;

/// Fractional progress reporting for long time jumps.
pub type ProgressFn = Box<dyn FnMut(f32)>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Largest forward jump still simulated day by day; anything larger
    /// uses anchor reset.
    pub max_simulation_days: i64,
    /// Width of the day-cache window rebuilt behind the clock after a jump.
    pub cache_buffer_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_simulation_days: 366, cache_buffer_days: 7 }
    }
}

struct CacheEntry {
    events: Vec<ActiveEvent>,
    #[allow(dead_code)]
    computed_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

pub struct Engine {
    calendar: Calendar,
    registry: EventRegistry,
    cache: HashMap<i64, CacheEntry>,
    /// Explicit module toggles; absent entries default to enabled.
    modules: BTreeMap<String, bool>,
    overrides: OverrideManager,
    current_day: i64,
    /// Minutes into the current day, for minute-granularity intervals.
    time_of_day: i64,
    config: EngineConfig,
    persist: Option<PersistFn>,
    progress: Option<ProgressFn>,
}

impl Engine {
    pub fn new(calendar: CalendarDefinition) -> Self {
        Self::with_config(calendar, EngineConfig::default())
    }

    pub fn with_config(calendar: CalendarDefinition, config: EngineConfig) -> Self {
        Self {
            calendar: Calendar::new(calendar),
            registry: EventRegistry::new(),
            cache: HashMap::new(),
            modules: BTreeMap::new(),
            overrides: OverrideManager::new(),
            current_day: 0,
            time_of_day: 0,
            config,
            persist: None,
            progress: None,
        }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn current_day(&self) -> i64 {
        self.current_day
    }

    pub fn time_of_day(&self) -> i64 {
        self.time_of_day
    }

    /// Set the intra-day clock (minutes, wrapped into 0..1440). Minute
    /// intervals read it, so cached days are stale afterwards.
    pub fn set_time_of_day(&mut self, minutes: i64) {
        self.time_of_day = minutes.rem_euclid(MINUTES_PER_DAY);
        self.cache.clear();
    }

    pub fn definitions(&self) -> &[EventDefinition] {
        self.registry.definitions()
    }

    pub fn chain(&self, id: &str) -> Option<&ChainRuntime> {
        self.registry.chain(id)
    }

    pub fn gm_overrides(&self) -> &[GmOverride] {
        self.overrides.list()
    }

    pub fn set_persistence(&mut self, persist: PersistFn) {
        self.persist = Some(persist);
    }

    pub fn set_progress_handler(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }

    /// Replace the registry contents. Chain runtimes for ids that stay
    /// chains are preserved, so a reload never disturbs mid-flight state.
    pub fn load_definitions(&mut self, definitions: Vec<EventDefinition>) {
        let avg = self.calendar.average_year_days();
        self.registry.load(definitions, self.current_day, avg);
        self.cache.clear();
    }

    /// Explicit (re)load from a definition source. Any adapter I/O failure
    /// surfaces as fatal; nothing is retried.
    pub fn reload_from(
        &mut self,
        source: &mut dyn DefinitionSource,
        context: Option<&str>,
    ) -> Result<usize, EngineError> {
        let definitions = source.load_all(context)?;
        let count = definitions.len();
        self.load_definitions(definitions);
        Ok(count)
    }

    /// Enable or disable a module. Events carrying a tag mapped to a
    /// disabled module are suppressed entirely. Clears the day cache.
    pub fn toggle_module(&mut self, module: &str, enabled: bool) {
        self.modules.insert(module.to_string(), enabled);
        self.cache.clear();
    }

    pub fn module_enabled(&self, module: &str) -> bool {
        self.modules.get(module).copied().unwrap_or(true)
    }

    fn definition_enabled(&self, def: &EventDefinition) -> bool {
        def.tags.iter().all(|tag| self.module_enabled(tag))
    }

    /// Drop every cached day.
    pub fn invalidate_cache(&mut self) {
        self.cache.clear();
    }

    #[cfg(test)]
    fn cached_days(&self) -> usize {
        self.cache.len()
    }

    /// All events active on `day`, unfiltered. Cached per raw day; context
    /// filtering never touches the cache.
    pub fn active_events(&mut self, day: i64) -> Vec<ActiveEvent> {
        if let Some(entry) = self.cache.get(&day) {
            return entry.events.clone();
        }
        let events = self.compute_day(day);
        self.cache
            .insert(day, CacheEntry { events: events.clone(), computed_at_ms: now_ms() });
        events
    }

    /// Active events narrowed to a query context (location hierarchy,
    /// factions, regions, and the day's season).
    pub fn active_events_filtered(&mut self, day: i64, ctx: &QueryContext) -> Vec<ActiveEvent> {
        let season = self.calendar.date(day).season;
        let events = self.active_events(day);
        events
            .into_iter()
            .filter(|event| {
                self.registry
                    .get(&event.event_id)
                    .is_none_or(|def| effects::definition_in_context(def, ctx, season.as_deref()))
            })
            .collect()
    }

    /// Active events plus their merged effects.
    pub fn effect_registry(&mut self, day: i64, ctx: Option<&QueryContext>) -> EffectRegistry {
        let active = match ctx {
            Some(ctx) => self.active_events_filtered(day, ctx),
            None => self.active_events(day),
        };
        EffectRegistry {
            day,
            effects: effects::resolve_effects(&active),
            active,
            computed_at_ms: now_ms(),
        }
    }

    /// Hierarchically resolved effects for a location context. `day`
    /// defaults to the current day.
    pub fn effect_context(&mut self, ctx: &QueryContext, day: Option<i64>) -> EffectContext {
        let day = day.unwrap_or(self.current_day);
        let active = self.active_events_filtered(day, ctx);
        let scoped: Vec<(ActiveEvent, String)> = active
            .iter()
            .map(|event| {
                let scope = self
                    .registry
                    .get(&event.event_id)
                    .map(|def| best_location_scope(def, ctx))
                    .unwrap_or_default();
                (event.clone(), scope)
            })
            .collect();
        EffectContext {
            day,
            location: ctx.location.clone(),
            effects: effects::resolve_effects_hierarchical(&scoped),
            active,
        }
    }

    /// Operator override entry point: force a chain event into `state`.
    ///
    /// One-off (`permanent == false`): records an auto-expiring override;
    /// the chain reports the forced state with `gm_forced` provenance and
    /// takes no natural transitions until expiry. Permanent: mutates the
    /// definition's `initial_state`, hands the updated definition to the
    /// persistence callback, and resets the runtime — no record is kept.
    ///
    /// The forced duration is rolled on a randomizer derived from the chain
    /// seed and the current day, never on the chain's own randomizer.
    pub fn set_event_state(
        &mut self,
        event_id: &str,
        state: &str,
        permanent: bool,
        note: Option<String>,
    ) -> Result<Option<GmOverride>, EngineError> {
        let def = self
            .registry
            .get(event_id)
            .ok_or_else(|| EngineError::UnknownEvent(event_id.to_string()))?;
        let Trigger::Chain { seed, states, .. } = &def.trigger else {
            return Err(EngineError::NotAChainEvent(event_id.to_string()));
        };
        let state_def = states
            .iter()
            .find(|s| s.name == state)
            .ok_or_else(|| EngineError::UnknownState {
                event: event_id.to_string(),
                state: state.to_string(),
            })?;
        let seed = *seed;
        let duration_expr = state_def.duration.clone();
        if permanent && self.persist.is_none() {
            return Err(EngineError::NoPersistence);
        }

        let mut rng = override_rng(seed, self.current_day);
        let duration = parse_duration(&duration_expr, &mut rng, self.calendar.average_year_days());

        if permanent {
            // Persist first, commit second: a failed save must leave the
            // in-memory definition, runtime, and cache exactly as they were,
            // or the engine diverges from its source.
            let mut updated = self
                .registry
                .get(event_id)
                .cloned()
                .ok_or_else(|| EngineError::UnknownEvent(event_id.to_string()))?;
            if let Trigger::Chain { initial_state, .. } = &mut updated.trigger {
                *initial_state = Some(state.to_string());
            }
            if let Some(callback) = self.persist.as_mut() {
                callback(&updated)?;
            }
            if let Some(def) = self.registry.get_mut(event_id) {
                *def = updated;
            }
            if let Some(runtime) = self.registry.chain_mut(event_id) {
                runtime.force(state, self.current_day, duration);
            }
            self.cache.clear();
            tracing::debug!(event_id, state, "permanent override applied");
            Ok(None)
        } else {
            let record = GmOverride {
                id: self.overrides.next_id(),
                event_id: event_id.to_string(),
                scope: OverrideScope::OneOff,
                state: state.to_string(),
                duration_days: duration,
                applied_day: self.current_day,
                expires_day: self.current_day + duration,
                note,
                created_at_ms: now_ms(),
            };
            self.overrides.insert(record.clone());
            self.cache.clear();
            tracing::debug!(event_id, state, expires_day = record.expires_day, "one-off override applied");
            Ok(Some(record))
        }
    }

    /// Serializable image of every chain runtime.
    pub fn chain_state_vectors(&self) -> BTreeMap<String, ChainStateVector> {
        self.registry
            .chains()
            .map(|(id, runtime)| (id.clone(), runtime.vector()))
            .collect()
    }

    /// Restore chain runtimes from a saved image. Unknown ids are logged
    /// and skipped.
    pub fn restore_chain_state_vectors(&mut self, vectors: &BTreeMap<String, ChainStateVector>) {
        for (id, vector) in vectors {
            match self.registry.chain_mut(id) {
                Some(runtime) => runtime.restore(vector),
                None => tracing::warn!(id = %id, "no chain runtime for saved state vector"),
            }
        }
        self.cache.clear();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            schema_version: SCHEMA_VERSION,
            calendar_id: self.calendar.id().to_string(),
            current_day: self.current_day,
            time_of_day: self.time_of_day,
            chains: self.chain_state_vectors(),
            overrides: self.overrides.list().to_vec(),
            modules: self.modules.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), EngineError> {
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(EngineError::SnapshotSchema(snapshot.schema_version));
        }
        if snapshot.calendar_id != self.calendar.id() {
            return Err(EngineError::CalendarMismatch {
                snapshot: snapshot.calendar_id.clone(),
                engine: self.calendar.id().to_string(),
            });
        }
        self.current_day = snapshot.current_day;
        self.time_of_day = snapshot.time_of_day.rem_euclid(MINUTES_PER_DAY);
        self.restore_chain_state_vectors(&snapshot.chains);
        self.overrides.replace(snapshot.overrides.clone());
        self.modules = snapshot.modules.clone();
        self.cache.clear();
        Ok(())
    }

    /// Evaluate the four trigger phases for one day, strictly in order:
    /// fixed + interval, chain, conditional tier 1, conditional tier 2.
    /// Later phases read the union of earlier results.
    fn compute_day(&mut self, day: i64) -> Vec<ActiveEvent> {
        let avg = self.calendar.average_year_days();
        let mut events: Vec<ActiveEvent> = Vec::new();

        // Phase 1a: fixed dates. The index is keyed by trigger date, so an
        // event still running `k` days after its trigger is found by probing
        // the dates up to the longest fixed duration back.
        let lookback = self.registry.max_fixed_duration().max(1);
        for k in 0..lookback {
            let trigger_day = day - k;
            let date = self.calendar.date(trigger_day);
            let mut keys = vec![fixed_key(date.month, date.day_of_month, None)];
            if let Some(name) = &date.intercalary {
                keys.push(name.clone());
            }
            for key in &keys {
                for &index in self.registry.fixed_candidates(key) {
                    let def = self.registry.definition_at(index);
                    let Trigger::Fixed { day: target_day, year, intercalary, duration_days, .. } =
                        &def.trigger
                    else {
                        continue;
                    };
                    if *duration_days <= k || !self.definition_enabled(def) {
                        continue;
                    }
                    // The intercalary index key carries only the month name;
                    // the day still has to line up (leap days can stretch an
                    // intercalary month past one day).
                    if intercalary.is_some() && date.day_of_month != *target_day {
                        continue;
                    }
                    if year.is_some_and(|y| y != date.year) {
                        continue;
                    }
                    events.push(make_active(
                        def,
                        def.name.clone(),
                        def.effects.clone(),
                        trigger_day,
                        trigger_day + duration_days - 1,
                        day,
                        Provenance::Definition,
                    ));
                }
            }
        }

        // Phase 1b: intervals. The residue gives the most recent trigger
        // without iterating days; 1440 minutes/day for sub-day granularity.
        for &index in self.registry.interval_indices() {
            let def = self.registry.definition_at(index);
            let &Trigger::Interval { interval, offset, use_minutes, duration_days } = &def.trigger
            else {
                continue;
            };
            if interval <= 0 || !self.definition_enabled(def) {
                continue;
            }
            let trigger_day = if use_minutes {
                let counter = day * MINUTES_PER_DAY + self.time_of_day;
                let residue = (counter + offset).rem_euclid(interval);
                (counter - residue).div_euclid(MINUTES_PER_DAY)
            } else {
                day - (day + offset).rem_euclid(interval)
            };
            if day - trigger_day < duration_days {
                events.push(make_active(
                    def,
                    def.name.clone(),
                    def.effects.clone(),
                    trigger_day,
                    trigger_day + duration_days - 1,
                    day,
                    Provenance::Definition,
                ));
            }
        }

        // Phase 2: chains. An active override short-circuits the natural
        // lookup entirely; otherwise the runtime transitions as needed
        // before being read.
        for id in self.registry.chain_ids() {
            let Some(def) = self.registry.get(&id).cloned() else { continue };
            if !self.definition_enabled(&def) {
                continue;
            }
            let Trigger::Chain { states, .. } = &def.trigger else { continue };

            if let Some(forced) = self.overrides.active_for(&id, day) {
                let mut effects = def.effects.clone();
                if let Some(state_def) = states.iter().find(|s| s.name == forced.state) {
                    effects.extend(state_def.effects.clone());
                }
                events.push(make_active(
                    &def,
                    forced.state.clone(),
                    effects,
                    forced.applied_day,
                    forced.expires_day - 1,
                    day,
                    Provenance::GmForced,
                ));
                continue;
            }

            let Some(runtime) = self.registry.chain_mut(&id) else { continue };
            runtime.catch_up(day, avg);
            let state = runtime.state().to_string();
            let (start, end) = (runtime.entered_day(), runtime.end_day());
            let state_effects = runtime.current_state_def().map(|s| s.effects.clone());
            let mut effects = def.effects.clone();
            if let Some(state_effects) = state_effects {
                effects.extend(state_effects);
            }
            events.push(make_active(&def, state, effects, start, end, day, Provenance::Definition));
        }

        // Phases 3 and 4: conditionals, tier by tier. Each tier evaluates
        // against the union of everything earlier, never its own tier.
        let conditional_indices = self.registry.conditional_indices().to_vec();
        let mut cursor = 0;
        while cursor < conditional_indices.len() {
            let tier = conditional_tier(self.registry.definition_at(conditional_indices[cursor]));
            let visible: BTreeMap<String, String> = events
                .iter()
                .map(|e| (e.event_id.clone(), e.state.clone()))
                .collect();
            let mut matched = Vec::new();
            while cursor < conditional_indices.len() {
                let def = self.registry.definition_at(conditional_indices[cursor]);
                if conditional_tier(def) != tier {
                    break;
                }
                cursor += 1;
                if !self.definition_enabled(def) {
                    continue;
                }
                let Trigger::Conditional { condition, .. } = &def.trigger else { continue };
                match Condition::parse(condition) {
                    Ok(parsed) => {
                        self.warn_forward_references(def, &parsed, &visible, tier);
                        if parsed.eval(&visible) {
                            matched.push(make_active(
                                def,
                                def.name.clone(),
                                def.effects.clone(),
                                day,
                                day,
                                day,
                                Provenance::Definition,
                            ));
                        }
                    }
                    Err(err) => {
                        tracing::warn!(id = %def.id, %err, "treating malformed condition as false");
                    }
                }
            }
            events.extend(matched);
        }

        events
    }

    /// A reference to an id that is itself a same-or-later-tier conditional
    /// can never have been evaluated yet; warn, but keep going — the
    /// missing-reference semantics (inactive, empty state) still apply.
    fn warn_forward_references(
        &self,
        def: &EventDefinition,
        condition: &Condition,
        visible: &BTreeMap<String, String>,
        tier: u8,
    ) {
        for referenced in condition.referenced_ids() {
            if visible.contains_key(referenced) {
                continue;
            }
            if let Some(other) = self.registry.get(referenced) {
                if let Trigger::Conditional { tier: other_tier, .. } = &other.trigger {
                    if *other_tier >= tier {
                        tracing::warn!(
                            id = %def.id,
                            references = referenced,
                            "conditional references a same-or-later-tier event"
                        );
                    }
                }
            }
        }
    }
}

fn conditional_tier(def: &EventDefinition) -> u8 {
    match &def.trigger {
        Trigger::Conditional { tier, .. } => *tier,
        _ => u8::MAX,
    }
}

fn make_active(
    def: &EventDefinition,
    state: String,
    effects: EffectMap,
    start_day: i64,
    end_day: i64,
    day: i64,
    provenance: Provenance,
) -> ActiveEvent {
    ActiveEvent {
        event_id: def.id.clone(),
        name: def.name.clone(),
        kind: def.kind(),
        state,
        priority: def.priority,
        effects,
        start_day,
        end_day,
        remaining_days: end_day - day,
        provenance,
    }
}

/// Longest definition location scope that covers the query location, for
/// hierarchical effect stacking. Empty when unrestricted or unmatched.
fn best_location_scope(def: &EventDefinition, ctx: &QueryContext) -> String {
    let Some(query) = ctx.location.as_deref() else {
        return String::new();
    };
    def.locations
        .iter()
        .filter(|scope| effects::location_matches(scope, query))
        .max_by_key(|scope| scope.split('.').count())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MonthDef;
    use crate::model::{ChainStateDef, EventKind};
    use serde_json::json;

    fn calendar() -> CalendarDefinition {
        CalendarDefinition {
            id: "test-cal".into(),
            months: (1..=12)
                .map(|i| MonthDef { name: format!("M{i}"), days: 30, intercalary: false })
                .collect(),
            weekdays: vec![],
            seasons: vec![],
            leap_rules: vec![],
            start_year: 0,
            year_suffix: None,
        }
    }

    fn base_def(id: &str, trigger: Trigger) -> EventDefinition {
        EventDefinition {
            id: id.into(),
            name: id.into(),
            priority: 0,
            effects: EffectMap::new(),
            tags: vec![],
            locations: vec![],
            factions: vec![],
            seasons: vec![],
            regions: vec![],
            trigger,
        }
    }

    fn weather_chain(seed: u32) -> EventDefinition {
        base_def(
            "weather",
            Trigger::Chain {
                seed,
                states: vec![
                    ChainStateDef {
                        name: "clear".into(),
                        weight: 1.0,
                        duration: "2 days".into(),
                        effects: [("sky".to_string(), json!("blue"))].into_iter().collect(),
                    },
                    ChainStateDef {
                        name: "storm".into(),
                        weight: 1.0,
                        duration: "2 days".into(),
                        effects: [("sky".to_string(), json!("black"))].into_iter().collect(),
                    },
                ],
                initial_state: Some("clear".into()),
            },
        )
    }

    #[test]
    fn fixed_event_spans_its_duration() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![base_def(
            "festival",
            Trigger::Fixed { month: 1, day: 5, year: None, intercalary: None, duration_days: 3 },
        )]);
        // Month 1 day 5 is absolute day 34; active through day 36.
        assert!(engine.active_events(33).is_empty());
        for day in 34..=36 {
            let events = engine.active_events(day);
            assert_eq!(events.len(), 1, "day {day}");
            assert_eq!(events[0].start_day, 34);
            assert_eq!(events[0].end_day, 36);
            assert_eq!(events[0].remaining_days, 36 - day);
        }
        assert!(engine.active_events(37).is_empty());
        // Recurs every year on the same calendar date.
        assert_eq!(engine.active_events(34 + 360).len(), 1);
    }

    #[test]
    fn fixed_event_with_year_fires_once() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![base_def(
            "eclipse",
            Trigger::Fixed { month: 0, day: 1, year: Some(1), intercalary: None, duration_days: 1 },
        )]);
        assert!(engine.active_events(0).is_empty());
        assert_eq!(engine.active_events(360).len(), 1);
        assert!(engine.active_events(720).is_empty());
    }

    #[test]
    fn interval_event_fires_on_residue() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![base_def(
            "market",
            Trigger::Interval { interval: 7, offset: 0, use_minutes: false, duration_days: 1 },
        )]);
        assert_eq!(engine.active_events(0).len(), 1);
        assert!(engine.active_events(1).is_empty());
        assert_eq!(engine.active_events(7).len(), 1);
        assert_eq!(engine.active_events(700).len(), 1);
        // Negative days follow the same euclidean residue.
        assert_eq!(engine.active_events(-7).len(), 1);
        assert!(engine.active_events(-1).is_empty());
    }

    #[test]
    fn interval_duration_keeps_latest_instance_active() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![base_def(
            "patrol",
            Trigger::Interval { interval: 10, offset: 0, use_minutes: false, duration_days: 4 },
        )]);
        for day in 0..=3 {
            assert_eq!(engine.active_events(day).len(), 1, "day {day}");
        }
        assert!(engine.active_events(4).is_empty());
        assert_eq!(engine.active_events(12).len(), 1);
    }

    #[test]
    fn minute_interval_respects_time_of_day() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![base_def(
            "bell",
            Trigger::Interval {
                interval: 2 * MINUTES_PER_DAY,
                offset: 0,
                use_minutes: true,
                duration_days: 1,
            },
        )]);
        assert_eq!(engine.active_events(0).len(), 1);
        assert!(engine.active_events(1).is_empty());
        assert_eq!(engine.active_events(2).len(), 1);
    }

    #[test]
    fn chain_state_carries_overlaid_effects() {
        let mut engine = Engine::new(calendar());
        let mut def = weather_chain(42);
        def.effects.insert("domain".into(), json!("weather"));
        engine.load_definitions(vec![def]);
        let events = engine.active_events(0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, "clear");
        assert_eq!(events[0].kind, EventKind::Chain);
        assert_eq!(events[0].provenance, Provenance::Definition);
        assert_eq!(events[0].effects["sky"], json!("blue"));
        assert_eq!(events[0].effects["domain"], json!("weather"));
    }

    #[test]
    fn two_engines_same_seed_agree() {
        let mut a = Engine::new(calendar());
        let mut b = Engine::new(calendar());
        a.load_definitions(vec![weather_chain(99)]);
        b.load_definitions(vec![weather_chain(99)]);
        for day in 0..100 {
            assert_eq!(a.active_events(day), b.active_events(day), "day {day}");
        }
    }

    #[test]
    fn conditional_tiers_evaluate_in_order() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![
            weather_chain(1),
            base_def(
                "flooding",
                Trigger::Conditional {
                    condition: "events['weather'].state == 'storm'".into(),
                    tier: 1,
                },
            ),
            base_def(
                "bridge-closed",
                Trigger::Conditional { condition: "events['flooding'].active".into(), tier: 2 },
            ),
        ]);
        // Initial state is forced to "clear": no conditionals fire.
        let ids: Vec<String> =
            engine.active_events(0).iter().map(|e| e.event_id.clone()).collect();
        assert_eq!(ids, vec!["weather"]);

        // Find a storm day; both tiers must cascade on it.
        let storm_day = (1..200)
            .find(|&d| engine.active_events(d).iter().any(|e| e.state == "storm"))
            .unwrap();
        let ids: Vec<String> =
            engine.active_events(storm_day).iter().map(|e| e.event_id.clone()).collect();
        assert_eq!(ids, vec!["weather", "flooding", "bridge-closed"]);
        let flooding =
            engine.active_events(storm_day).into_iter().find(|e| e.event_id == "flooding").unwrap();
        assert_eq!((flooding.start_day, flooding.end_day), (storm_day, storm_day));
    }

    #[test]
    fn same_tier_reference_sees_inactive() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![
            base_def(
                "always",
                Trigger::Conditional { condition: "!events['peer'].active".into(), tier: 1 },
            ),
            base_def(
                "peer",
                Trigger::Conditional { condition: "!events['always'].active".into(), tier: 1 },
            ),
        ]);
        // Neither sees the other within the tier, so both fire.
        assert_eq!(engine.active_events(0).len(), 2);
    }

    #[test]
    fn malformed_condition_is_inactive_not_fatal() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![base_def(
            "broken",
            Trigger::Conditional { condition: "events['x'].".into(), tier: 1 },
        )]);
        assert!(engine.active_events(0).is_empty());
    }

    #[test]
    fn module_toggle_suppresses_tagged_events() {
        let mut engine = Engine::new(calendar());
        let mut def = base_def(
            "market",
            Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
        );
        def.tags = vec!["economy".into()];
        engine.load_definitions(vec![def, weather_chain(5)]);

        assert_eq!(engine.active_events(0).len(), 2);
        engine.toggle_module("economy", false);
        let ids: Vec<String> =
            engine.active_events(0).iter().map(|e| e.event_id.clone()).collect();
        assert_eq!(ids, vec!["weather"]);
        engine.toggle_module("economy", true);
        assert_eq!(engine.active_events(0).len(), 2);
    }

    #[test]
    fn day_cache_fills_and_clears() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![weather_chain(3)]);
        assert_eq!(engine.cached_days(), 0);
        engine.active_events(0);
        engine.active_events(0);
        engine.active_events(1);
        assert_eq!(engine.cached_days(), 2);
        engine.toggle_module("anything", false);
        assert_eq!(engine.cached_days(), 0);
    }

    #[test]
    fn set_event_state_validation_errors() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![
            weather_chain(1),
            base_def(
                "market",
                Trigger::Interval { interval: 7, offset: 0, use_minutes: false, duration_days: 1 },
            ),
        ]);
        assert!(matches!(
            engine.set_event_state("ghost", "clear", false, None),
            Err(EngineError::UnknownEvent(_))
        ));
        assert!(matches!(
            engine.set_event_state("market", "clear", false, None),
            Err(EngineError::NotAChainEvent(_))
        ));
        assert!(matches!(
            engine.set_event_state("weather", "hurricane", false, None),
            Err(EngineError::UnknownState { .. })
        ));
        assert!(matches!(
            engine.set_event_state("weather", "storm", true, None),
            Err(EngineError::NoPersistence)
        ));
    }

    #[test]
    fn one_off_override_forces_then_expires_cleanly() {
        let mut control = Engine::new(calendar());
        control.load_definitions(vec![weather_chain(42)]);

        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![weather_chain(42)]);
        let record = engine.set_event_state("weather", "storm", false, Some("ambush".into()))
            .unwrap()
            .unwrap();
        assert_eq!(record.applied_day, 0);
        assert_eq!(record.expires_day, record.applied_day + record.duration_days);

        for day in record.applied_day..record.expires_day {
            let events = engine.active_events(day);
            assert_eq!(events[0].state, "storm", "day {day}");
            assert_eq!(events[0].provenance, Provenance::GmForced);
            assert_eq!(events[0].effects["sky"], json!("black"));
        }

        // After expiry the natural sequence is exactly what an engine that
        // never saw the override produces.
        for day in record.expires_day..record.expires_day + 50 {
            assert_eq!(engine.active_events(day), control.active_events(day), "day {day}");
        }
        assert_eq!(
            engine.chain("weather").unwrap().vector(),
            control.chain("weather").unwrap().vector(),
        );
    }

    #[test]
    fn permanent_override_persists_and_keeps_no_record() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let saved: Rc<RefCell<Vec<EventDefinition>>> = Rc::default();
        let sink = Rc::clone(&saved);
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![weather_chain(42)]);
        engine.set_persistence(Box::new(move |def| {
            sink.borrow_mut().push(def.clone());
            Ok(())
        }));

        assert!(engine.set_event_state("weather", "storm", true, None).unwrap().is_none());
        assert!(engine.gm_overrides().is_empty());
        assert_eq!(engine.active_events(0)[0].state, "storm");
        assert_eq!(engine.active_events(0)[0].provenance, Provenance::Definition);

        let persisted = saved.borrow();
        assert_eq!(persisted.len(), 1);
        let Trigger::Chain { initial_state, .. } = &persisted[0].trigger else {
            panic!("persisted definition is not a chain")
        };
        assert_eq!(initial_state.as_deref(), Some("storm"));
    }

    #[test]
    fn failed_persistence_commits_nothing() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![weather_chain(42)]);
        engine.set_persistence(Box::new(|_| Err(StoreError::Other("disk full".into()))));
        let vector_before = engine.chain("weather").unwrap().vector();

        let result = engine.set_event_state("weather", "storm", true, None);
        assert!(matches!(result, Err(EngineError::Store(_))));

        // The in-memory definition, runtime, and natural evaluation are all
        // exactly as they were before the failed save.
        let Trigger::Chain { initial_state, .. } = &engine.definitions()[0].trigger else {
            panic!("definition is not a chain")
        };
        assert_eq!(initial_state.as_deref(), Some("clear"));
        assert_eq!(engine.chain("weather").unwrap().vector(), vector_before);
        assert!(engine.gm_overrides().is_empty());
        assert_eq!(engine.active_events(0)[0].state, "clear");
    }

    #[test]
    fn snapshot_round_trip_restores_clock_chains_and_overrides() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![weather_chain(42)]);
        engine.set_event_state("weather", "storm", false, None).unwrap();
        engine.advance_to_day(30);
        let snapshot = engine.snapshot();

        let mut restored = Engine::new(calendar());
        restored.load_definitions(vec![weather_chain(42)]);
        restored.restore(&snapshot).unwrap();
        assert_eq!(restored.current_day(), 30);
        assert_eq!(restored.gm_overrides(), engine.gm_overrides());
        assert_eq!(
            restored.chain("weather").unwrap().vector(),
            engine.chain("weather").unwrap().vector(),
        );
        for day in 30..60 {
            assert_eq!(restored.active_events(day), engine.active_events(day), "day {day}");
        }
    }

    #[test]
    fn snapshot_restore_rejects_mismatches() {
        let mut engine = Engine::new(calendar());
        let mut snapshot = engine.snapshot();
        snapshot.schema_version = 99;
        assert!(matches!(engine.restore(&snapshot), Err(EngineError::SnapshotSchema(99))));

        let mut snapshot = engine.snapshot();
        snapshot.calendar_id = "other".into();
        assert!(matches!(engine.restore(&snapshot), Err(EngineError::CalendarMismatch { .. })));
    }

    #[test]
    fn filtered_query_drops_out_of_context_events() {
        let mut engine = Engine::new(calendar());
        let mut local = base_def(
            "dock-strike",
            Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
        );
        local.locations = vec!["faerun.waterdeep".into()];
        let global = base_def(
            "comet",
            Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
        );
        engine.load_definitions(vec![local, global]);

        let here = engine.active_events_filtered(0, &QueryContext::at_location("faerun.waterdeep.docks"));
        assert_eq!(here.len(), 2);
        let elsewhere = engine.active_events_filtered(0, &QueryContext::at_location("faerun.cormyr"));
        let ids: Vec<String> = elsewhere.iter().map(|e| e.event_id.clone()).collect();
        assert_eq!(ids, vec!["comet"]);
        // Unfiltered view is untouched.
        assert_eq!(engine.active_events(0).len(), 2);
    }

    #[test]
    fn effect_registry_merges_by_priority() {
        let mut engine = Engine::new(calendar());
        let mut low = base_def(
            "climate",
            Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
        );
        low.priority = 1;
        low.effects.insert("wind".into(), json!("calm"));
        let mut high = base_def(
            "gale",
            Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
        );
        high.priority = 10;
        high.effects.insert("wind".into(), json!("howling"));
        engine.load_definitions(vec![high, low]);

        let registry = engine.effect_registry(0, None);
        assert_eq!(registry.effects["wind"], json!("howling"));
        assert_eq!(registry.active.len(), 2);
    }

    #[test]
    fn effect_context_stacks_multipliers_across_scopes() {
        let mut engine = Engine::new(calendar());
        let mut region = base_def(
            "regional-fair",
            Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
        );
        region.locations = vec!["faerun".into()];
        region.effects.insert("price_multiplier".into(), json!(1.5));
        let mut city = base_def(
            "city-shortage",
            Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
        );
        city.locations = vec!["faerun.waterdeep".into()];
        city.effects.insert("price_multiplier".into(), json!(2.0));
        engine.load_definitions(vec![region, city]);

        let ctx = engine.effect_context(&QueryContext::at_location("faerun.waterdeep"), Some(0));
        let value = ctx.effects["price_multiplier"].as_f64().unwrap();
        assert!((value - 3.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn reload_keeps_chain_progress() {
        let mut engine = Engine::new(calendar());
        engine.load_definitions(vec![weather_chain(42)]);
        engine.active_events(25);
        let before = engine.chain("weather").unwrap().vector();
        engine.load_definitions(vec![weather_chain(42)]);
        assert_eq!(engine.chain("weather").unwrap().vector(), before);
    }
}
