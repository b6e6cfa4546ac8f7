use dashmap::DashMap;

use crate::error::StoreError;
use crate::KeyValueStore;

/// In-memory store backend keyed by (table, key).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<(String, Vec<u8>), Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all tables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .get(&(table.to_string(), key.to_vec()))
            .map(|v| v.clone()))
    }

    fn put_raw(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .insert((table.to_string(), key.to_vec()), value.to_vec());
        Ok(())
    }

    fn delete_raw(&self, table: &str, key: &[u8]) -> Result<(), StoreError> {
        self.entries.remove(&(table.to_string(), key.to_vec()));
        Ok(())
    }

    fn insert_if_absent_raw(
        &self,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, StoreError> {
        let entry = self.entries.entry((table.to_string(), key.to_vec()));
        match entry {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(value.to_vec());
                Ok(true)
            }
        }
    }
}
