use std::path::Path;

use serde_json::Value;

use crate::error::DbResult;
use crate::exec::{QueryExecutor, QueryResult};
use crate::schema::{MigrationManager, TableSchema};
use crate::sql::{self, Statement};
use crate::storage::{IndexDef, Store};

/// The embedded engine: parses statements and runs them against the
/// versioned object store. CREATE TABLE goes through the migration
/// manager; everything else through the query executor over the live
/// connection.
pub struct Engine {
    migrations: MigrationManager,
}

impl Engine {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let store = Store::new(path);
        let migrations = MigrationManager::open(store)?;

        tracing::info!(version = migrations.version(), "engine opened");
        Ok(Self { migrations })
    }

    /// Execute one statement with positional parameters.
    pub async fn execute(&self, statement: &str, params: &[Value]) -> DbResult<QueryResult> {
        let parsed = sql::parse(statement)?;
        tracing::debug!(statement = %statement.trim(), "executing");

        match parsed {
            Statement::CreateTable(stmt) => {
                let schema = TableSchema::new(stmt.table, stmt.columns);
                self.migrations.ensure_table(schema).await?;
                Ok(QueryResult::Created)
            }
            Statement::Insert(stmt) => {
                let conn = self.migrations.connection()?;
                QueryExecutor::new(&conn).insert(&stmt, params).await
            }
            Statement::Select(stmt) => {
                let conn = self.migrations.connection()?;
                QueryExecutor::new(&conn).select(&stmt, params).await
            }
            Statement::Update(stmt) => {
                let conn = self.migrations.connection()?;
                QueryExecutor::new(&conn).update(&stmt, params).await
            }
            Statement::Delete(stmt) => {
                let conn = self.migrations.connection()?;
                QueryExecutor::new(&conn).delete(&stmt, params).await
            }
        }
    }

    /// Current structural version of the store.
    pub fn version(&self) -> u64 {
        self.migrations.version()
    }

    /// All persisted table schemas.
    pub fn list_tables(&self) -> DbResult<Vec<TableSchema>> {
        self.migrations.list_tables()
    }

    /// Secondary index metadata of one table.
    pub fn table_indexes(&self, table: &str) -> DbResult<Vec<IndexDef>> {
        self.migrations.connection()?.list_indexes(table)
    }

    /// Table definitions still waiting for a successful migration.
    pub fn pending_tables(&self) -> Vec<String> {
        self.migrations.pending_tables()
    }

    /// The migration manager's live connection, for direct Storage Adapter
    /// access.
    pub fn connection(&self) -> DbResult<crate::storage::Connection> {
        self.migrations.connection()
    }
}
