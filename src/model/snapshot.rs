use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::overrides::GmOverride;

pub const SCHEMA_VERSION: u32 = 1;

/// Serializable image of one chain runtime: enough to resume the state
/// machine mid-flight without replaying its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStateVector {
    pub state: String,
    pub entered_day: i64,
    pub duration_days: i64,
    /// Inclusive final day of the current state.
    pub end_day: i64,
    /// Raw randomizer state; restoring it resumes the draw sequence exactly.
    pub rng_state: u32,
}

/// Full world-simulation snapshot for session persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub calendar_id: String,
    pub current_day: i64,
    /// Minutes into the current day (0..1440).
    pub time_of_day: i64,
    pub chains: BTreeMap<String, ChainStateVector>,
    #[serde(default)]
    pub overrides: Vec<GmOverride>,
    /// Module-toggle map; absent modules default to enabled.
    #[serde(default)]
    pub modules: BTreeMap<String, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json() {
        let snapshot = Snapshot {
            schema_version: SCHEMA_VERSION,
            calendar_id: "harptos".into(),
            current_day: 4200,
            time_of_day: 600,
            chains: BTreeMap::from([(
                "weather".to_string(),
                ChainStateVector {
                    state: "storm".into(),
                    entered_day: 4199,
                    duration_days: 3,
                    end_day: 4201,
                    rng_state: 0xDEAD_BEEF,
                },
            )]),
            overrides: vec![],
            modules: BTreeMap::from([("festivals".to_string(), false)]),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn missing_optional_fields_default() {
        let back: Snapshot = serde_json::from_value(serde_json::json!({
            "schema_version": 1,
            "calendar_id": "counter",
            "current_day": 0,
            "time_of_day": 0,
            "chains": {}
        }))
        .unwrap();
        assert!(back.overrides.is_empty());
        assert!(back.modules.is_empty());
    }
}
