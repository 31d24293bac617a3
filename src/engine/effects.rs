//! Effect aggregation and context filtering.
//!
//! Default conflict rule: among events providing the same effect key, the
//! highest-priority event wins, ties broken by evaluation order ("last
//! wins"). A gust layer at priority 10 therefore suppresses a base climate
//! layer's same-key effect at priority 1 without any special casing.
//!
//! Hierarchical location filtering uses dot paths: an event scoped to `"A"`
//! is visible to queries for `"A"`, `"A.B"`, `"A.B.C"` — never the reverse.
//! Numeric `*_multiplier` keys stack multiplicatively when several hierarchy
//! levels each contribute one; everything else follows the default rule.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use crate::model::{ActiveEvent, EffectMap, EventDefinition};

/// Caller-supplied filter for scoped queries. Empty fields leave the
/// corresponding dimension unfiltered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    /// Dot-path location, e.g. `"faerun.sword_coast.waterdeep"`.
    pub location: Option<String>,
    pub factions: Vec<String>,
    pub regions: Vec<String>,
}

impl QueryContext {
    pub fn at_location(location: impl Into<String>) -> Self {
        Self { location: Some(location.into()), ..Self::default() }
    }
}

/// Resolved view of a day: the active events plus their merged effects.
#[derive(Debug, Clone, Serialize)]
pub struct EffectRegistry {
    pub day: i64,
    pub active: Vec<ActiveEvent>,
    pub effects: EffectMap,
    pub computed_at_ms: u64,
}

/// Hierarchically filtered variant of [`EffectRegistry`].
#[derive(Debug, Clone, Serialize)]
pub struct EffectContext {
    pub day: i64,
    pub location: Option<String>,
    pub active: Vec<ActiveEvent>,
    pub effects: EffectMap,
}

/// True when `scope`'s dot-path segments are a prefix of `query`'s.
pub fn location_matches(scope: &str, query: &str) -> bool {
    let mut scope_parts = scope.split('.');
    let mut query_parts = query.split('.');
    loop {
        match (scope_parts.next(), query_parts.next()) {
            (None, _) => return true,
            (Some(_), None) => return false,
            (Some(s), Some(q)) => {
                if s != q {
                    return false;
                }
            }
        }
    }
}

/// Whether a definition passes the context filter. Each dimension applies
/// only when both the event restricts it and the query supplies a value;
/// season restrictions always apply because the day's season is known.
pub fn definition_in_context(
    def: &EventDefinition,
    ctx: &QueryContext,
    season: Option<&str>,
) -> bool {
    if !def.locations.is_empty() {
        if let Some(query) = ctx.location.as_deref() {
            if !def.locations.iter().any(|scope| location_matches(scope, query)) {
                return false;
            }
        }
    }
    if !def.factions.is_empty() && !ctx.factions.is_empty() {
        if !def.factions.iter().any(|f| ctx.factions.contains(f)) {
            return false;
        }
    }
    if !def.regions.is_empty() && !ctx.regions.is_empty() {
        if !def.regions.iter().any(|r| ctx.regions.contains(r)) {
            return false;
        }
    }
    if !def.seasons.is_empty() {
        let Some(season) = season else { return false };
        if !def.seasons.iter().any(|s| s.eq_ignore_ascii_case(season)) {
            return false;
        }
    }
    true
}

/// Merge every event's effects under the default conflict rule: stable-sort
/// by priority ascending (evaluation order within a priority), then write in
/// order so the strictest priority lands last.
pub fn resolve_effects(events: &[ActiveEvent]) -> EffectMap {
    let mut ordered: Vec<&ActiveEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.priority);
    let mut resolved = EffectMap::new();
    for event in ordered {
        for (key, value) in &event.effects {
            resolved.insert(key.clone(), value.clone());
        }
    }
    resolved
}

fn is_multiplier_key(key: &str) -> bool {
    key.ends_with("_multiplier") || key.ends_with("_mult")
}

/// Resolve effects for a hierarchical location query. Non-multiplier keys
/// follow the default rule over the whole filtered set; `*_multiplier` keys
/// are resolved per contributing location scope and the per-scope winners
/// multiplied together, so a region, city, and district each stacking a
/// price multiplier compound rather than overwrite.
pub fn resolve_effects_hierarchical(events: &[(ActiveEvent, String)]) -> EffectMap {
    let flat: Vec<ActiveEvent> = events.iter().map(|(e, _)| e.clone()).collect();
    let mut resolved = resolve_effects(&flat);

    // Per-scope buckets, shallow scopes first.
    let mut buckets: BTreeMap<(usize, String), Vec<ActiveEvent>> = BTreeMap::new();
    for (event, scope) in events {
        let depth = if scope.is_empty() { 0 } else { scope.split('.').count() };
        buckets
            .entry((depth, scope.clone()))
            .or_default()
            .push(event.clone());
    }

    let multiplier_keys: Vec<String> = resolved
        .keys()
        .filter(|k| is_multiplier_key(k))
        .cloned()
        .collect();
    for key in multiplier_keys {
        let mut product = 1.0f64;
        let mut contributions = 0usize;
        for bucket in buckets.values() {
            let winner = resolve_effects(bucket);
            if let Some(value) = winner.get(&key).and_then(serde_json::Value::as_f64) {
                product *= value;
                contributions += 1;
            }
        }
        if contributions > 1 {
            resolved.insert(key, json!(product));
        }
    }
    resolved
}
