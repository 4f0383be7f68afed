use super::bridge::{ForeignRefStore, ForeignRegion};
use crate::error::{BridgeError, Result, ResultExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

/// In-process foreign region store keyed by reference id
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    regions: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `ref_id`, replacing any previous region
    pub fn insert(&self, ref_id: impl Into<String>, bytes: Vec<u8>) {
        let ref_id = ref_id.into();
        tracing::debug!("Registered {} bytes under '{}'", bytes.len(), ref_id);
        self.regions.write().insert(ref_id, bytes);
    }

    /// Register the contents of the file at `path` under `ref_id`
    pub fn register_file(&self, ref_id: impl Into<String>, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)
            .map_err(BridgeError::from)
            .with_context(|| format!("Failed to read blob file {}", path.display()))?;
        self.insert(ref_id, bytes);
        Ok(())
    }

    pub fn remove(&self, ref_id: &str) -> Option<Vec<u8>> {
        self.regions.write().remove(ref_id)
    }

    pub fn contains(&self, ref_id: &str) -> bool {
        self.regions.read().contains_key(ref_id)
    }

    /// Modify the region in place; returns false if `ref_id` is unknown
    pub fn mutate(&self, ref_id: &str, f: impl FnOnce(&mut Vec<u8>)) -> bool {
        match self.regions.write().get_mut(ref_id) {
            Some(bytes) => {
                f(bytes);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.regions.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl ForeignRefStore for InMemoryRefStore {
    fn with_region(&self, ref_id: &str, visit: &mut dyn FnMut(ForeignRegion<'_>)) -> bool {
        let regions = self.regions.read();
        match regions.get(ref_id) {
            Some(bytes) => {
                visit(ForeignRegion::new(bytes));
                true
            }
            None => false,
        }
    }
}
