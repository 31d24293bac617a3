#[macro_use]
mod macros;

pub mod event;
pub mod overrides;
pub mod snapshot;

pub use event::{
    ActiveEvent, ChainStateDef, EffectMap, EventDefinition, EventKind, Provenance, Trigger,
};
pub use overrides::{GmOverride, OverrideScope};
pub use snapshot::{ChainStateVector, SCHEMA_VERSION, Snapshot};
