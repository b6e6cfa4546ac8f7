//! Keyed persistence for the subflow engine.
//!
//! Every stateful component stores whole records keyed by entity id through
//! the [`KeyValueStore`] trait. Two backends: [`MemoryStore`] for embedded
//! and test use, [`RocksStore`] for durable deployments. Records are
//! serialized with serde_json by the typed accessors in [`TypedStore`].

pub mod error;
pub mod memory;
pub mod rocks;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use rocks::RocksStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Build an unambiguous storage key from length-prefixed segments.
pub fn compose_key(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parts.iter().map(|p| p.len() + 4).sum());
    for part in parts {
        key.extend_from_slice(&(part.len() as u32).to_be_bytes());
        key.extend_from_slice(part);
    }
    key
}

/// Byte-level keyed storage, partitioned into named tables.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value under `key`, if present.
    fn get_raw(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any existing value.
    fn put_raw(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove the value under `key`. Removing an absent key is a no-op.
    fn delete_raw(&self, table: &str, key: &[u8]) -> Result<(), StoreError>;

    /// Store `value` under `key` only if the key is absent.
    /// Returns `false` (and stores nothing) when the key already exists.
    fn insert_if_absent_raw(&self, table: &str, key: &[u8], value: &[u8])
        -> Result<bool, StoreError>;

    /// Whether `key` is present.
    fn contains(&self, table: &str, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get_raw(table, key)?.is_some())
    }
}

/// Serde-typed accessors over any [`KeyValueStore`].
pub trait TypedStore: KeyValueStore {
    /// Fetch and deserialize the record under `key`.
    fn get<T: DeserializeOwned>(&self, table: &str, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.get_raw(table, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store the record under `key`.
    fn put<T: Serialize>(&self, table: &str, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.put_raw(table, key, &bytes)
    }

    /// Serialize and store the record only if `key` is absent.
    fn insert_if_absent<T: Serialize>(
        &self,
        table: &str,
        key: &[u8],
        value: &T,
    ) -> Result<bool, StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.insert_if_absent_raw(table, key, &bytes)
    }
}

impl<S: KeyValueStore + ?Sized> TypedStore for S {}
