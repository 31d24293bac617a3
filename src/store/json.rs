use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use super::{CacheInfo, DefinitionSource, SnapshotStore, StoreError};
use crate::model::{EventDefinition, Snapshot};

/// Definition source backed by a single JSON file holding an array of
/// definitions. The file is read once and cached; `invalidate_cache`
/// forces a re-read on the next load.
#[derive(Debug)]
pub struct JsonFileSource {
    path: PathBuf,
    cache: Option<Vec<EventDefinition>>,
    loaded_at: Option<Instant>,
    last_invalidated: Option<Instant>,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: None, loaded_at: None, last_invalidated: None }
    }

    fn read_file(&self) -> Result<Vec<EventDefinition>, StoreError> {
        let file = File::open(&self.path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

impl DefinitionSource for JsonFileSource {
    fn load_all(&mut self, _context: Option<&str>) -> Result<Vec<EventDefinition>, StoreError> {
        if self.cache.is_none() {
            self.cache = Some(self.read_file()?);
            self.loaded_at = Some(Instant::now());
        }
        Ok(self.cache.clone().unwrap_or_default())
    }

    fn invalidate_cache(&mut self) {
        self.cache = None;
        self.loaded_at = None;
        self.last_invalidated = Some(Instant::now());
    }

    fn cache_info(&self) -> Option<CacheInfo> {
        Some(CacheInfo {
            cached: self.cache.is_some(),
            count: self.cache.as_ref().map_or(0, Vec::len),
            age_ms: self
                .loaded_at
                .map_or(0, |t| t.elapsed().as_millis() as u64),
            last_invalidated_ms: self
                .last_invalidated
                .map(|t| t.elapsed().as_millis() as u64),
        })
    }
}

/// Snapshot persistence as one pretty-printed JSON file. A missing file is
/// a fresh start (`Ok(None)`), never an error.
#[derive(Debug)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&mut self) -> Result<Option<Snapshot>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        Ok(Some(serde_json::from_reader(file)?))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, snapshot)?;
        Ok(())
    }
}
