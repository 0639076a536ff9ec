use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::{self, IndexDef};
use super::record::Record;
use super::transaction::{Transaction, TxMode};
use crate::error::{DbError, DbResult};
use crate::schema::TableSchema;

/// Metadata column family name
pub const META_CF: &str = "_meta";

/// Persisted structural version of the store
const VERSION_KEY: &str = "version";

/// Table schema key prefix inside the metadata column family
const TABLE_PREFIX: &str = "table:";

/// Factory for a store at a filesystem path. Structural changes
/// (collections, indexes) are only possible through the upgrade callback of
/// a versioned [`Store::open`] that raises the persisted version.
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn db_options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts
    }

    fn open_db(&self) -> DbResult<DB> {
        let opts = Self::db_options();

        let mut cf_names = match DB::list_cf(&opts, &self.path) {
            Ok(cfs) => cfs,
            Err(_) => vec!["default".to_string()],
        };
        if !cf_names.contains(&META_CF.to_string()) {
            cf_names.push(META_CF.to_string());
        }

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf_names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        DB::open_cf_descriptors(&opts, &self.path, cf_descriptors)
            .map_err(|e| DbError::Connection(format!("Failed to open store: {}", e)))
    }

    fn read_version(db: &DB) -> DbResult<Option<u64>> {
        let meta = db
            .cf_handle(META_CF)
            .ok_or_else(|| DbError::Connection("Metadata column family missing".to_string()))?;
        let bytes = db
            .get_cf(meta, VERSION_KEY.as_bytes())
            .map_err(|e| DbError::Connection(format!("Failed to read store version: {}", e)))?;

        match bytes {
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                text.parse::<u64>().map(Some).map_err(|_| {
                    DbError::Connection(format!("Corrupt store version: {}", text))
                })
            }
            None => Ok(None),
        }
    }

    fn write_version(db: &DB, version: u64) -> DbResult<()> {
        let meta = db
            .cf_handle(META_CF)
            .ok_or_else(|| DbError::Connection("Metadata column family missing".to_string()))?;
        db.put_cf(meta, VERSION_KEY.as_bytes(), version.to_string().as_bytes())
            .map_err(|e| DbError::Connection(format!("Failed to persist store version: {}", e)))
    }

    /// Open the store at its current persisted version. A fresh store is
    /// initialized at version 1.
    pub fn open_current(&self) -> DbResult<Connection> {
        let db = self.open_db()?;
        let version = match Self::read_version(&db)? {
            Some(v) => v,
            None => {
                Self::write_version(&db, 1)?;
                1
            }
        };

        Ok(Connection::new(db, version))
    }

    /// Open the store at the requested version. The upgrade callback is
    /// invoked only when `version` exceeds the persisted version; it is the
    /// sole place where collections and indexes may be created. Requesting
    /// a version below the persisted one fails.
    pub fn open<F>(&self, version: u64, upgrade: F) -> DbResult<Connection>
    where
        F: FnOnce(&mut UpgradeContext<'_>) -> DbResult<()>,
    {
        let mut db = self.open_db()?;
        let stored = Self::read_version(&db)?.unwrap_or(0);

        if version < stored {
            return Err(DbError::Connection(format!(
                "Requested version {} is below the stored version {}",
                version, stored
            )));
        }

        if version > stored {
            tracing::info!(from = stored, to = version, "upgrading store");
            let mut ctx = UpgradeContext { db: &mut db };
            upgrade(&mut ctx)?;
            Self::write_version(&db, version)?;
        }

        Ok(Connection::new(db, version))
    }
}

/// A live connection at a fixed structural version. Cheap to clone; all
/// clones share the underlying store handle.
#[derive(Clone)]
pub struct Connection {
    db: Arc<DB>,
    version: u64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("version", &self.version)
            .finish()
    }
}

impl Connection {
    fn new(db: DB, version: u64) -> Self {
        Self {
            db: Arc::new(db),
            version,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether a collection exists structurally.
    pub fn has_collection(&self, name: &str) -> bool {
        name != META_CF && name != "default" && self.db.cf_handle(name).is_some()
    }

    /// Begin a transaction over the named collections.
    pub fn begin(&self, names: &[&str], mode: TxMode) -> DbResult<Transaction> {
        for name in names {
            if !self.has_collection(name) {
                return Err(DbError::TableNotFound(name.to_string()));
            }
        }

        Ok(Transaction::new(
            self.db.clone(),
            mode,
            names.iter().map(|n| n.to_string()).collect(),
        ))
    }

    /// All persisted table schemas, in name order.
    pub fn list_tables(&self) -> DbResult<Vec<TableSchema>> {
        let meta = self
            .db
            .cf_handle(META_CF)
            .ok_or_else(|| DbError::Connection("Metadata column family missing".to_string()))?;
        let prefix = TABLE_PREFIX.as_bytes();

        let mut tables: Vec<TableSchema> = self
            .db
            .prefix_iterator_cf(meta, prefix)
            .take_while(|r| r.as_ref().is_ok_and(|(k, _)| k.starts_with(prefix)))
            .filter_map(|r| r.ok().and_then(|(_, v)| serde_json::from_slice(&v).ok()))
            .collect();
        tables.sort_by(|a: &TableSchema, b: &TableSchema| a.name.cmp(&b.name));

        Ok(tables)
    }

    /// The persisted schema of one table, if it exists.
    pub fn table_schema(&self, name: &str) -> DbResult<Option<TableSchema>> {
        let meta = self
            .db
            .cf_handle(META_CF)
            .ok_or_else(|| DbError::Connection("Metadata column family missing".to_string()))?;
        let key = format!("{}{}", TABLE_PREFIX, name);

        let bytes = self
            .db
            .get_cf(meta, key.as_bytes())
            .map_err(|e| DbError::Operation(format!("Failed to read table schema: {}", e)))?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Index metadata for one collection, in column order.
    pub fn list_indexes(&self, table: &str) -> DbResult<Vec<IndexDef>> {
        let cf = self
            .db
            .cf_handle(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        let prefix = index::IDX_META_PREFIX.as_bytes();

        let mut defs: Vec<IndexDef> = self
            .db
            .prefix_iterator_cf(cf, prefix)
            .take_while(|r| r.as_ref().is_ok_and(|(k, _)| k.starts_with(prefix)))
            .filter_map(|r| r.ok().and_then(|(_, v)| serde_json::from_slice(&v).ok()))
            .collect();
        defs.sort_by(|a: &IndexDef, b: &IndexDef| a.column.cmp(&b.column));

        Ok(defs)
    }
}

/// Handed to the upgrade callback of a versioned open; the only place where
/// collections and secondary indexes are structurally created.
pub struct UpgradeContext<'a> {
    db: &'a mut DB,
}

impl UpgradeContext<'_> {
    /// Create a collection for a table definition: the column family, the
    /// persisted schema, and one non-unique secondary index per declared
    /// column other than the identifier. Already-existing collections are
    /// left untouched.
    pub fn create_collection(&mut self, schema: &TableSchema) -> DbResult<()> {
        let name = schema.name.as_str();
        if name.is_empty() || name.starts_with('_') || name == "default" {
            return Err(DbError::Schema(format!("Invalid table name '{}'", name)));
        }

        if self.db.cf_handle(name).is_none() {
            self.db
                .create_cf(name, &Options::default())
                .map_err(|e| DbError::Schema(format!("Failed to create collection: {}", e)))?;
            tracing::info!(table = name, "created collection");
        }

        self.persist_schema(schema)?;

        for column in &schema.columns {
            if column.name != "id" {
                self.create_index(name, &column.name, false)?;
            }
        }

        Ok(())
    }

    /// Create a secondary index over one column, backfilling entries for
    /// existing records. Idempotent per column.
    pub fn create_index(&mut self, table: &str, column: &str, unique: bool) -> DbResult<()> {
        let cf = self
            .db
            .cf_handle(table)
            .ok_or_else(|| DbError::Schema(format!("Cannot index missing table '{}'", table)))?;

        let meta_key = index::idx_meta_key(column);
        let existing = self
            .db
            .get_cf(cf, &meta_key)
            .map_err(|e| DbError::Schema(format!("Failed to read index metadata: {}", e)))?;
        if existing.is_some() {
            return Ok(());
        }

        let def = IndexDef {
            column: column.to_string(),
            unique,
        };
        self.db
            .put_cf(cf, &meta_key, serde_json::to_vec(&def)?)
            .map_err(|e| DbError::Schema(format!("Failed to create index: {}", e)))?;

        // Backfill entries from existing records
        let prefix = index::DOC_PREFIX.as_bytes();
        let records: Vec<Record> = self
            .db
            .prefix_iterator_cf(cf, prefix)
            .take_while(|r| r.as_ref().is_ok_and(|(k, _)| k.starts_with(prefix)))
            .filter_map(|r| r.ok().and_then(|(_, v)| serde_json::from_slice(&v).ok()))
            .collect();

        for record in records {
            if let Some(value) = record.get(column) {
                if !value.is_null() {
                    let entry_key = index::idx_entry_key(column, &value, record.id);
                    self.db
                        .put_cf(cf, entry_key, format!("{:016x}", record.id).as_bytes())
                        .map_err(|e| {
                            DbError::Schema(format!("Failed to build index entry: {}", e))
                        })?;
                }
            }
        }

        Ok(())
    }

    fn persist_schema(&mut self, schema: &TableSchema) -> DbResult<()> {
        let meta = self
            .db
            .cf_handle(META_CF)
            .ok_or_else(|| DbError::Schema("Metadata column family missing".to_string()))?;
        let key = format!("{}{}", TABLE_PREFIX, schema.name);

        let existing = self
            .db
            .get_cf(meta, key.as_bytes())
            .map_err(|e| DbError::Schema(format!("Failed to read table schema: {}", e)))?;
        if existing.is_some() {
            return Ok(());
        }

        self.db
            .put_cf(meta, key.as_bytes(), serde_json::to_vec(schema)?)
            .map_err(|e| DbError::Schema(format!("Failed to persist table schema: {}", e)))
    }
}
