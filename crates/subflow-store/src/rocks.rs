//! RocksDB store backend, one column family per table.

use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::Path;

use crate::error::StoreError;
use crate::KeyValueStore;

/// RocksDB-backed store. Tables map to column families declared at open.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a database at `path` with the given tables.
    pub fn open(path: &Path, tables: &[&str]) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StoreError::Backend(format!("cannot create {}: {}", path.display(), e)))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = tables
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::info!(path = %path.display(), tables = tables.len(), "opened rocksdb store");
        Ok(Self { db })
    }

    fn cf(&self, table: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

impl KeyValueStore for RocksStore {
    fn get_raw(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf(table)?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn put_raw(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf(table)?;
        self.db
            .put_cf(cf, key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn delete_raw(&self, table: &str, key: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf(table)?;
        self.db
            .delete_cf(cf, key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn insert_if_absent_raw(
        &self,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, StoreError> {
        // Engine calls are externally serialized (run-to-completion), so a
        // read-then-write check is race-free here.
        if self.get_raw(table, key)?.is_some() {
            return Ok(false);
        }
        self.put_raw(table, key, value)?;
        Ok(true)
    }
}
