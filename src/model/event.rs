use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Effect payloads are opaque to the engine; only the merge rules interpret
/// specific keys (`light_level`, `*_multiplier`, ...). A `BTreeMap` keeps
/// iteration deterministic.
pub type EffectMap = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventKind {
    Fixed,
    Interval,
    Chain,
    Conditional,
}

string_enum!(EventKind {
    Fixed => "fixed",
    Interval => "interval",
    Chain => "chain",
    Conditional => "conditional",
});

/// Where an active event came from: the natural evaluation pipeline, or an
/// operator override forcing a chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Provenance {
    Definition,
    GmForced,
}

string_enum!(Provenance {
    Definition => "definition",
    GmForced => "gm_forced",
});

/// One named state of a chain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStateDef {
    pub name: String,
    /// Selection weight, ≥ 0. A zero weight makes the state unreachable by
    /// natural transition (it can still be forced by an override).
    pub weight: f64,
    /// Duration expression, e.g. `"2d4 days"` or `"1 month - 1d6 days"`.
    pub duration: String,
    #[serde(default)]
    pub effects: EffectMap,
}

fn default_one() -> i64 {
    1
}

/// The four trigger models, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires on an exact calendar date every year, or once when `year` is
    /// set. `intercalary` targets a named intercalary month instead of a
    /// month/day pair.
    Fixed {
        #[serde(default)]
        month: usize,
        #[serde(default = "default_one")]
        day: i64,
        #[serde(default)]
        year: Option<i64>,
        #[serde(default)]
        intercalary: Option<String>,
        #[serde(default = "default_one")]
        duration_days: i64,
    },
    /// Fires when `(day + offset) % interval == 0`; with `use_minutes`, the
    /// counter is `day * 1440 + time_of_day`.
    Interval {
        interval: i64,
        #[serde(default)]
        offset: i64,
        #[serde(default)]
        use_minutes: bool,
        #[serde(default = "default_one")]
        duration_days: i64,
    },
    /// Seeded state machine: always in exactly one of `states`.
    Chain {
        seed: u32,
        states: Vec<ChainStateDef>,
        #[serde(default)]
        initial_state: Option<String>,
    },
    /// Active when `condition` holds over earlier-phase results. Tier 1
    /// conditionals evaluate before tier 2.
    Conditional {
        condition: String,
        #[serde(default = "default_tier")]
        tier: u8,
    },
}

fn default_tier() -> u8 {
    1
}

impl Trigger {
    pub fn kind(&self) -> EventKind {
        match self {
            Trigger::Fixed { .. } => EventKind::Fixed,
            Trigger::Interval { .. } => EventKind::Interval,
            Trigger::Chain { .. } => EventKind::Chain,
            Trigger::Conditional { .. } => EventKind::Conditional,
        }
    }
}

/// A loaded event definition. `id` is unique across the registry; `effects`
/// values are opaque. The optional scope lists (`tags`, `locations`,
/// `factions`, `seasons`, `regions`) restrict where and when the event is
/// visible — an empty list means unrestricted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub effects: EffectMap,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub factions: Vec<String>,
    #[serde(default)]
    pub seasons: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(flatten)]
    pub trigger: Trigger,
}

impl EventDefinition {
    pub fn kind(&self) -> EventKind {
        self.trigger.kind()
    }
}

/// One event active on a queried day. Derived, never stored: recomputed (or
/// cache-read) per query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveEvent {
    pub event_id: String,
    pub name: String,
    pub kind: EventKind,
    /// Current state label: the chain state name for chains, the event name
    /// otherwise.
    pub state: String,
    pub priority: i32,
    pub effects: EffectMap,
    pub start_day: i64,
    /// Inclusive final day.
    pub end_day: i64,
    pub remaining_days: i64,
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trigger_tagged_serde_shape() {
        let def = EventDefinition {
            id: "market-day".into(),
            name: "Market Day".into(),
            priority: 5,
            effects: EffectMap::from([("prices_multiplier".to_string(), json!(0.9))]),
            tags: vec!["economy".into()],
            locations: vec![],
            factions: vec![],
            seasons: vec![],
            regions: vec![],
            trigger: Trigger::Interval {
                interval: 7,
                offset: 0,
                use_minutes: false,
                duration_days: 1,
            },
        };
        let v = serde_json::to_value(&def).unwrap();
        assert_eq!(v["kind"], "interval");
        assert_eq!(v["interval"], 7);
        assert_eq!(v["effects"]["prices_multiplier"], json!(0.9));

        let back: EventDefinition = serde_json::from_value(v).unwrap();
        assert_eq!(back, def);
        assert_eq!(back.kind(), EventKind::Interval);
    }

    #[test]
    fn chain_definition_deserializes_with_defaults() {
        let def: EventDefinition = serde_json::from_value(json!({
            "id": "weather",
            "name": "Weather",
            "kind": "chain",
            "seed": 99,
            "states": [
                {"name": "clear", "weight": 3.0, "duration": "1d4 days"},
                {"name": "storm", "weight": 1.0, "duration": "1d2 days",
                 "effects": {"travel_multiplier": 1.5}}
            ]
        }))
        .unwrap();
        assert_eq!(def.kind(), EventKind::Chain);
        assert_eq!(def.priority, 0);
        assert!(def.tags.is_empty());
        let Trigger::Chain { seed, states, initial_state } = &def.trigger else {
            panic!("expected chain trigger");
        };
        assert_eq!(*seed, 99);
        assert_eq!(states.len(), 2);
        assert_eq!(initial_state, &None);
        assert!(states[0].effects.is_empty());
    }

    #[test]
    fn fixed_definition_deserializes_minimal() {
        let def: EventDefinition = serde_json::from_value(json!({
            "id": "midsummer",
            "name": "Midsummer Festival",
            "kind": "fixed",
            "month": 5,
            "day": 15,
            "duration_days": 3
        }))
        .unwrap();
        let Trigger::Fixed { month, day, year, intercalary, duration_days } = &def.trigger else {
            panic!("expected fixed trigger");
        };
        assert_eq!((*month, *day, *duration_days), (5, 15, 3));
        assert_eq!(*year, None);
        assert_eq!(*intercalary, None);
    }

    #[test]
    fn conditional_tier_defaults_to_one() {
        let def: EventDefinition = serde_json::from_value(json!({
            "id": "aftermath",
            "name": "Aftermath",
            "kind": "conditional",
            "condition": "events['storm'].active"
        }))
        .unwrap();
        let Trigger::Conditional { tier, .. } = def.trigger else {
            panic!("expected conditional trigger");
        };
        assert_eq!(tier, 1);
    }

    #[test]
    fn kind_string_round_trip() {
        for kind in [EventKind::Fixed, EventKind::Interval, EventKind::Chain, EventKind::Conditional] {
            let s: String = kind.into();
            assert_eq!(EventKind::try_from(s).unwrap(), kind);
        }
        assert!(EventKind::try_from("weekly".to_string()).is_err());
    }

    #[test]
    fn provenance_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Provenance::GmForced).unwrap(), "gm_forced");
        assert_eq!(serde_json::to_value(Provenance::Definition).unwrap(), "definition");
    }
}
