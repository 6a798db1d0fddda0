// src/store/memory.rs
use std::collections::HashMap;

use parking_lot::Mutex;

use super::RecordStore;
use crate::error::Result;

/// Process-local record store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn put(&self, owner: &str, key: &str, payload: &str) -> Result<()> {
        self.records
            .lock()
            .insert((owner.to_string(), key.to_string()), payload.to_string());
        Ok(())
    }

    fn get(&self, owner: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .records
            .lock()
            .get(&(owner.to_string(), key.to_string()))
            .cloned())
    }

    fn delete(&self, owner: &str, key: &str) -> Result<bool> {
        Ok(self
            .records
            .lock()
            .remove(&(owner.to_string(), key.to_string()))
            .is_some())
    }
}
