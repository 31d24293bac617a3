pub mod calendar;
pub mod chain;
pub mod condition;
pub mod duration;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod rng;
pub mod store;

pub use calendar::{Calendar, CalendarDate, CalendarDefinition, LeapRule, MonthDef, SeasonDef};
pub use chain::ChainRuntime;
pub use condition::Condition;
pub use duration::parse_duration;
pub use engine::{
    AdvanceReport, EffectContext, EffectRegistry, Engine, EngineConfig, JumpMode, QueryContext,
};
pub use error::EngineError;
pub use model::{
    ActiveEvent, ChainStateDef, EffectMap, EventDefinition, EventKind, GmOverride, OverrideScope,
    Provenance, Snapshot, Trigger,
};
pub use registry::EventRegistry;
pub use rng::SeededRng;
pub use store::{DefinitionSource, JsonFileSource, JsonSnapshotStore, MemorySource, SnapshotStore};
