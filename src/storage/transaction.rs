use rocksdb::{ColumnFamily, DB};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::index::{self, IndexDef};
use super::record::Record;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// A transaction scoped to a declared set of collections. Mutating
/// operations require [`TxMode::ReadWrite`].
pub struct Transaction {
    db: Arc<DB>,
    mode: TxMode,
    scope: Vec<String>,
}

impl Transaction {
    pub(crate) fn new(db: Arc<DB>, mode: TxMode, scope: Vec<String>) -> Self {
        Self { db, mode, scope }
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Get a handle to one of the transaction's collections.
    pub fn collection(&self, name: &str) -> DbResult<CollectionTx<'_>> {
        if !self.scope.iter().any(|n| n == name) {
            return Err(DbError::Operation(format!(
                "Collection '{}' is not part of this transaction",
                name
            )));
        }

        Ok(CollectionTx {
            tx: self,
            name: name.to_string(),
        })
    }
}

/// Handle to one collection inside a transaction: `add`, `get_all`, `put`,
/// `delete`, plus index-backed equality lookup. Secondary index entries are
/// maintained transparently on every write.
pub struct CollectionTx<'a> {
    tx: &'a Transaction,
    name: String,
}

impl CollectionTx<'_> {
    fn cf(&self) -> DbResult<&ColumnFamily> {
        self.tx
            .db
            .cf_handle(&self.name)
            .ok_or_else(|| DbError::TableNotFound(self.name.clone()))
    }

    fn require_write(&self) -> DbResult<()> {
        if self.tx.mode != TxMode::ReadWrite {
            return Err(DbError::Operation(
                "Write attempted in a read-only transaction".to_string(),
            ));
        }
        Ok(())
    }

    /// Append a record. The identifier comes from the collection's sequence
    /// counter; a caller-supplied `id` field is stripped.
    pub async fn add(&self, mut fields: Map<String, Value>) -> DbResult<Record> {
        self.require_write()?;
        fields.remove("id");

        let id = self.next_id()?;
        let record = Record { id, fields };

        let bytes = serde_json::to_vec(&record)?;
        let db = &self.tx.db;
        db.put_cf(self.cf()?, index::doc_key(id), &bytes)
            .map_err(|e| DbError::Operation(format!("Failed to add record: {}", e)))?;

        self.index_insert(&record)?;

        Ok(record)
    }

    /// Get one record by identifier.
    pub async fn get(&self, id: u64) -> DbResult<Record> {
        self.read_record(id)?
            .ok_or_else(|| DbError::Operation(format!("Record {} not found", id)))
    }

    /// Full unordered snapshot of the collection, in identifier order.
    pub async fn get_all(&self) -> DbResult<Vec<Record>> {
        let db = &self.tx.db;
        let cf = self.cf()?;
        let prefix = index::DOC_PREFIX.as_bytes();

        db.prefix_iterator_cf(cf, prefix)
            .take_while(|r| r.as_ref().is_ok_and(|(k, _)| k.starts_with(prefix)))
            .map(|r| {
                let (_, value) = r
                    .map_err(|e| DbError::Operation(format!("Failed to scan records: {}", e)))?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    /// Write a record at its identifier, replacing any previous version and
    /// fixing up index entries.
    pub async fn put(&self, record: &Record) -> DbResult<u64> {
        self.require_write()?;

        if let Some(old) = self.read_record(record.id)? {
            self.index_remove(&old)?;
        }

        let bytes = serde_json::to_vec(record)?;
        let db = &self.tx.db;
        db.put_cf(self.cf()?, index::doc_key(record.id), &bytes)
            .map_err(|e| DbError::Operation(format!("Failed to put record: {}", e)))?;

        self.index_insert(record)?;

        Ok(record.id)
    }

    /// Delete a record by identifier. Deleting a missing record is a no-op.
    pub async fn delete(&self, id: u64) -> DbResult<()> {
        self.require_write()?;

        if let Some(old) = self.read_record(id)? {
            self.index_remove(&old)?;
            let db = &self.tx.db;
            db.delete_cf(self.cf()?, index::doc_key(id))
                .map_err(|e| DbError::Operation(format!("Failed to delete record: {}", e)))?;
        }

        Ok(())
    }

    /// Equality lookup through a column's secondary index.
    pub async fn get_by_index(&self, column: &str, value: &Value) -> DbResult<Vec<Record>> {
        if self.index_def(column)?.is_none() {
            return Err(DbError::Operation(format!(
                "No index on column '{}'",
                column
            )));
        }

        let db = &self.tx.db;
        let cf = self.cf()?;
        let prefix = index::idx_value_prefix(column, value);

        let ids: Vec<u64> = db
            .prefix_iterator_cf(cf, &prefix)
            .take_while(|r| r.as_ref().is_ok_and(|(k, _)| k.starts_with(&prefix[..])))
            .filter_map(|r| {
                r.ok().and_then(|(_, v)| {
                    u64::from_str_radix(&String::from_utf8_lossy(&v), 16).ok()
                })
            })
            .collect();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.read_record(id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    // ==================== Internals ====================

    fn read_record(&self, id: u64) -> DbResult<Option<Record>> {
        let db = &self.tx.db;
        let bytes = db
            .get_cf(self.cf()?, index::doc_key(id))
            .map_err(|e| DbError::Operation(format!("Failed to get record: {}", e)))?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Allocate the next identifier (starting at 1) and persist the counter.
    fn next_id(&self) -> DbResult<u64> {
        let db = &self.tx.db;
        let cf = self.cf()?;

        let current = db
            .get_cf(cf, index::SEQ_KEY.as_bytes())
            .map_err(|e| DbError::Operation(format!("Failed to read sequence: {}", e)))?
            .and_then(|bytes| String::from_utf8_lossy(&bytes).parse::<u64>().ok())
            .unwrap_or(0);
        let next = current + 1;

        db.put_cf(cf, index::SEQ_KEY.as_bytes(), next.to_string().as_bytes())
            .map_err(|e| DbError::Operation(format!("Failed to advance sequence: {}", e)))?;

        Ok(next)
    }

    fn index_defs(&self) -> DbResult<Vec<IndexDef>> {
        let db = &self.tx.db;
        let cf = self.cf()?;
        let prefix = index::IDX_META_PREFIX.as_bytes();

        Ok(db
            .prefix_iterator_cf(cf, prefix)
            .take_while(|r| r.as_ref().is_ok_and(|(k, _)| k.starts_with(prefix)))
            .filter_map(|r| r.ok().and_then(|(_, v)| serde_json::from_slice(&v).ok()))
            .collect())
    }

    fn index_def(&self, column: &str) -> DbResult<Option<IndexDef>> {
        let db = &self.tx.db;
        let bytes = db
            .get_cf(self.cf()?, index::idx_meta_key(column))
            .map_err(|e| DbError::Operation(format!("Failed to read index metadata: {}", e)))?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn index_insert(&self, record: &Record) -> DbResult<()> {
        for def in self.index_defs()? {
            let Some(value) = record.get(&def.column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            if def.unique {
                self.check_unique(&def.column, &value, record.id)?;
            }

            let db = &self.tx.db;
            db.put_cf(
                self.cf()?,
                index::idx_entry_key(&def.column, &value, record.id),
                format!("{:016x}", record.id).as_bytes(),
            )
            .map_err(|e| DbError::Operation(format!("Failed to write index entry: {}", e)))?;
        }

        Ok(())
    }

    fn index_remove(&self, record: &Record) -> DbResult<()> {
        for def in self.index_defs()? {
            let Some(value) = record.get(&def.column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let db = &self.tx.db;
            db.delete_cf(
                self.cf()?,
                index::idx_entry_key(&def.column, &value, record.id),
            )
            .map_err(|e| DbError::Operation(format!("Failed to remove index entry: {}", e)))?;
        }

        Ok(())
    }

    fn check_unique(&self, column: &str, value: &Value, id: u64) -> DbResult<()> {
        let db = &self.tx.db;
        let cf = self.cf()?;
        let prefix = index::idx_value_prefix(column, value);

        let conflict = db
            .prefix_iterator_cf(cf, &prefix)
            .take_while(|r| r.as_ref().is_ok_and(|(k, _)| k.starts_with(&prefix[..])))
            .filter_map(|r| {
                r.ok().and_then(|(_, v)| {
                    u64::from_str_radix(&String::from_utf8_lossy(&v), 16).ok()
                })
            })
            .any(|existing| existing != id);

        if conflict {
            return Err(DbError::Operation(format!(
                "Unique index violation on column '{}'",
                column
            )));
        }

        Ok(())
    }
}
