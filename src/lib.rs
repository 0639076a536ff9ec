pub mod engine;
pub mod error;
pub mod exec;
pub mod schema;
pub mod sql;
pub mod storage;

pub use engine::Engine;
pub use error::{DbError, DbResult};
pub use exec::{QueryExecutor, QueryResult};
pub use schema::{MigrationManager, TableSchema};
pub use sql::{parse, Statement};
pub use storage::{CollectionTx, Connection, Record, Store, Transaction, TxMode};
