use thiserror::Error;

use crate::store::StoreError;

/// Fatal, surfaced failures. Everything recoverable (malformed condition
/// expressions, unparseable durations, zero-state chains, forward
/// references) is logged and absorbed instead of raised.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown event id '{0}'")]
    UnknownEvent(String),

    #[error("event '{0}' is not a chain event")]
    NotAChainEvent(String),

    #[error("event '{event}' has no state named '{state}'")]
    UnknownState { event: String, state: String },

    #[error("permanent override requires a persistence callback")]
    NoPersistence,

    #[error("snapshot schema version {0} is not supported")]
    SnapshotSchema(u32),

    #[error("snapshot calendar '{snapshot}' does not match engine calendar '{engine}'")]
    CalendarMismatch { snapshot: String, engine: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
