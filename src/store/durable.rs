//! ACID-durable key-value store backed by redb.
//!
//! Holds per-user snapshots between runs. All writes go through
//! transactions; reads use MVCC snapshots.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::store::StoreResult;

/// Table for all snapshot data (string keys → binary values).
const META_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("meta");

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "spiralgate.redb";

/// ACID-durable store using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Make sure the table exists so read transactions never see it missing.
        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        txn.open_table(META_TABLE).map_err(redb_err("open_table"))?;
        txn.commit().map_err(redb_err("commit"))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Store many key-value pairs in one transaction.
    pub fn put_batch(&self, entries: &[(&[u8], &[u8])]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(META_TABLE).map_err(redb_err("open_table"))?;
            for (key, value) in entries {
                table.insert(*key, *value).map_err(redb_err("insert"))?;
            }
        }
        txn.commit().map_err(redb_err("commit"))?;
        Ok(())
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(META_TABLE).map_err(redb_err("open_table"))?;
        let mut out = Vec::new();
        for item in table.range::<&[u8]>(prefix..).map_err(redb_err("range"))? {
            let (key, value) = item.map_err(redb_err("range"))?;
            if !key.value().starts_with(prefix) {
                break;
            }
            out.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(out)
    }
}

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl Fn(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn batch_overwrites_existing_keys() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put_batch(&[(b"user:a".as_slice(), b"1".as_slice())]).unwrap();
        store.put_batch(&[(b"user:a".as_slice(), b"2".as_slice())]).unwrap();
        let found = store.scan_prefix(b"user:").unwrap();
        assert_eq!(found, vec![(b"user:a".to_vec(), b"2".to_vec())]);
        assert!(store.scan_prefix(b"missing").unwrap().is_empty());
    }

    #[test]
    fn fresh_store_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        assert!(store.scan_prefix(b"user:").unwrap().is_empty());
    }

    #[test]
    fn scan_prefix_stops_at_prefix_boundary() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        store
            .put_batch(&[
                (b"user:a".as_slice(), b"1".as_slice()),
                (b"user:b".as_slice(), b"2".as_slice()),
                (b"users".as_slice(), b"x".as_slice()),
                (b"zzz".as_slice(), b"y".as_slice()),
            ])
            .unwrap();
        let found = store.scan_prefix(b"user:").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, b"user:a".to_vec());
        assert_eq!(found[1].1, b"2".to_vec());
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();

        {
            let store = DurableStore::open(dir.path()).unwrap();
            store
                .put_batch(&[(b"persist_key".as_slice(), b"persist_val".as_slice())])
                .unwrap();
        }

        let store = DurableStore::open(dir.path()).unwrap();
        assert_eq!(
            store.scan_prefix(b"persist").unwrap(),
            vec![(b"persist_key".to_vec(), b"persist_val".to_vec())]
        );
    }
}
