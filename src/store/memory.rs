use super::{DefinitionSource, StoreError};
use crate::model::EventDefinition;

/// In-memory definition source, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySource {
    definitions: Vec<EventDefinition>,
}

impl MemorySource {
    pub fn new(definitions: Vec<EventDefinition>) -> Self {
        Self { definitions }
    }
}

impl DefinitionSource for MemorySource {
    fn load_all(&mut self, _context: Option<&str>) -> Result<Vec<EventDefinition>, StoreError> {
        Ok(self.definitions.clone())
    }

    fn list_ids(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self.definitions.iter().map(|d| d.id.clone()).collect())
    }

    fn load_by_id(&mut self, id: &str) -> Result<Option<EventDefinition>, StoreError> {
        Ok(self.definitions.iter().find(|d| d.id == id).cloned())
    }

    fn exists(&mut self, id: &str) -> Result<bool, StoreError> {
        Ok(self.definitions.iter().any(|d| d.id == id))
    }
}
