//! Adapter boundary: where event definitions and world-state snapshots come
//! from and go to. The engine core never touches I/O directly — it calls
//! these traits at explicit load/reload/save points and otherwise operates
//! purely on resident data, so implementations are free to be backed by
//! files, databases, or anything else.

mod json;
mod memory;

pub use json::{JsonFileSource, JsonSnapshotStore};
pub use memory::MemorySource;

use thiserror::Error;

use crate::model::{EventDefinition, Snapshot};

/// Adapter failure. Surfaced as fatal to the caller of the load operation;
/// the core never retries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Adapter-side cache metadata, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub cached: bool,
    pub count: usize,
    pub age_ms: u64,
    pub last_invalidated_ms: Option<u64>,
}

/// Source of event definitions.
pub trait DefinitionSource {
    /// Load every definition. `context` is an opaque hint for sources that
    /// scope their content (e.g. per campaign).
    fn load_all(&mut self, context: Option<&str>) -> Result<Vec<EventDefinition>, StoreError>;

    fn list_ids(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self.load_all(None)?.into_iter().map(|d| d.id).collect())
    }

    fn load_by_id(&mut self, id: &str) -> Result<Option<EventDefinition>, StoreError> {
        Ok(self.load_all(None)?.into_iter().find(|d| d.id == id))
    }

    /// Order-preserving batch lookup: one slot per input id.
    fn load_by_ids(&mut self, ids: &[&str]) -> Result<Vec<Option<EventDefinition>>, StoreError> {
        ids.iter().map(|id| self.load_by_id(id)).collect()
    }

    fn exists(&mut self, id: &str) -> Result<bool, StoreError> {
        Ok(self.load_by_id(id)?.is_some())
    }

    /// Drop any adapter-side cache. Default: no cache, no-op.
    fn invalidate_cache(&mut self) {}

    /// Adapter cache metadata. Default: the adapter keeps no cache.
    fn cache_info(&self) -> Option<CacheInfo> {
        None
    }
}

/// Persistence for world-simulation snapshots. A missing snapshot is a
/// fresh start, not an error.
pub trait SnapshotStore {
    fn load(&mut self) -> Result<Option<Snapshot>, StoreError>;
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError>;
}
