use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{DbError, DbResult};
use crate::sql::ColumnDef;
use crate::storage::{Connection, Store};

/// The persisted definition of a table. Created once, never mutated or
/// dropped; columns are fixed for the table's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub created_at: DateTime<Utc>,
}

impl TableSchema {
    pub fn new(name: String, columns: Vec<ColumnDef>) -> Self {
        Self {
            name,
            columns,
            created_at: Utc::now(),
        }
    }
}

/// Owns the live connection and evolves the store's structural version.
///
/// Structural changes only happen inside the upgrade callback of a
/// versioned reopen, so creating a table means: queue the definition, close
/// the connection, bump the version, reopen, and let the upgrade pass
/// materialize everything queued. One migration runs at a time; a
/// definition is always enqueued before the migration lock is taken, so a
/// migration in flight observes every definition queued before its upgrade
/// pass reads the queue.
pub struct MigrationManager {
    store: Store,
    conn: RwLock<Option<Connection>>,
    version: AtomicU64,
    pending: Mutex<Vec<TableSchema>>,
    migration: AsyncMutex<()>,
}

impl MigrationManager {
    /// Open the store at its current version.
    pub fn open(store: Store) -> DbResult<Self> {
        let conn = store.open_current()?;
        let version = conn.version();

        Ok(Self {
            store,
            conn: RwLock::new(Some(conn)),
            version: AtomicU64::new(version),
            pending: Mutex::new(Vec::new()),
            migration: AsyncMutex::new(()),
        })
    }

    /// The live connection. Fails while the store is closed mid-migration.
    pub fn connection(&self) -> DbResult<Connection> {
        self.conn
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| DbError::Connection("Store connection is closed".to_string()))
    }

    /// Current structural version.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Names of definitions still waiting for a successful migration.
    pub fn pending_tables(&self) -> Vec<String> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    /// All persisted table schemas.
    pub fn list_tables(&self) -> DbResult<Vec<TableSchema>> {
        self.connection()?.list_tables()
    }

    /// Make sure the table exists structurally. Idempotent: an existing
    /// table returns success without touching the version or the queue. A
    /// failed migration leaves the definition queued so a later call
    /// retries it.
    pub async fn ensure_table(&self, def: TableSchema) -> DbResult<()> {
        let name = def.name.clone();
        if name.is_empty() || name.starts_with('_') || name == "default" {
            return Err(DbError::Schema(format!("Invalid table name '{}'", name)));
        }

        if let Ok(conn) = self.connection() {
            if conn.has_collection(&name) {
                return Ok(());
            }
        }

        // Enqueue before taking the migration lock: a migration already in
        // flight must observe this definition when it reads the queue.
        {
            let mut queue = self.pending.lock().unwrap();
            if !queue.iter().any(|d| d.name == name) {
                queue.push(def);
            }
        }

        let _guard = self.migration.lock().await;

        // A migration that ran while we waited may have materialized it
        if let Ok(conn) = self.connection() {
            if conn.has_collection(&name) {
                self.pending.lock().unwrap().retain(|d| d.name != name);
                return Ok(());
            }
        }

        self.run_migration()?;

        let conn = self.connection()?;
        if !conn.has_collection(&name) {
            return Err(DbError::Schema(format!(
                "Migration did not materialize table '{}'",
                name
            )));
        }

        Ok(())
    }

    /// Close, bump the version, reopen with an upgrade pass over the queued
    /// definitions. Runs with the migration lock held.
    fn run_migration(&self) -> DbResult<()> {
        let mut defs: Vec<TableSchema> = self.pending.lock().unwrap().clone();
        if let Ok(conn) = self.connection() {
            defs.retain(|d| !conn.has_collection(&d.name));
        }
        if defs.is_empty() {
            return Ok(());
        }

        let old_version = self.version.load(Ordering::SeqCst);
        let next_version = old_version + 1;

        // Close the live connection; the reopen needs exclusive ownership
        *self.conn.write().unwrap() = None;

        let result = self.store.open(next_version, |ctx| {
            for def in &defs {
                ctx.create_collection(def)?;
            }
            Ok(())
        });

        match result {
            Ok(conn) => {
                self.version.store(conn.version(), Ordering::SeqCst);
                *self.conn.write().unwrap() = Some(conn);

                let created: HashSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
                self.pending
                    .lock()
                    .unwrap()
                    .retain(|d| !created.contains(d.name.as_str()));

                tracing::info!(
                    version = next_version,
                    tables = defs.len(),
                    "store migration complete"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "store migration failed; queued definitions kept for retry"
                );
                // Restore a usable connection at the previous version
                if let Ok(conn) = self.store.open_current() {
                    self.version.store(conn.version(), Ordering::SeqCst);
                    *self.conn.write().unwrap() = Some(conn);
                }
                Err(err)
            }
        }
    }
}
