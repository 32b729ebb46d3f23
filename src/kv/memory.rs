//! In-process key-value store.

use super::{KvResult, KvStore};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Key-value store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Remove a key, returning its previous value.
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.values.write().remove(key)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        self.values.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
