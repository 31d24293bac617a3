use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum OverrideScope {
    OneOff,
    Permanent,
}

string_enum!(OverrideScope {
    OneOff => "one_off",
    Permanent => "permanent",
});

/// An operator-issued forced state for a chain event.
///
/// One-off overrides are recorded here and expire on their own; permanent
/// overrides mutate the chain definition's `initial_state` through the
/// persistence callback and leave no record behind, so a stored
/// `GmOverride` always has `scope == OneOff`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmOverride {
    pub id: u64,
    pub event_id: String,
    pub scope: OverrideScope,
    /// Forced chain state name.
    pub state: String,
    pub duration_days: i64,
    pub applied_day: i64,
    /// First day the override no longer applies (exclusive end).
    pub expires_day: i64,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at_ms: u64,
}

impl GmOverride {
    /// Whether this override forces the chain on `day`.
    pub fn active_on(&self, day: i64) -> bool {
        self.scope == OverrideScope::OneOff && day >= self.applied_day && day < self.expires_day
    }

    /// Whether the override has lapsed once the clock reaches `current_day`.
    pub fn expired_by(&self, current_day: i64) -> bool {
        current_day >= self.expires_day
    }
}
