use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Operation error: {0}")]
    Operation(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DbError::Parse("unexpected token".to_string());
        assert_eq!(err.to_string(), "Parse error: unexpected token");

        let err = DbError::Connection("store is locked".to_string());
        assert_eq!(err.to_string(), "Connection error: store is locked");

        let err = DbError::Schema("inconsistent pending queue".to_string());
        assert_eq!(err.to_string(), "Schema error: inconsistent pending queue");

        let err = DbError::Operation("column/value count mismatch".to_string());
        assert_eq!(
            err.to_string(),
            "Operation error: column/value count mismatch"
        );

        let err = DbError::TableNotFound("books".to_string());
        assert_eq!(err.to_string(), "Table 'books' not found");
    }

    #[test]
    fn test_error_debug() {
        let err = DbError::TableNotFound("test".to_string());
        let debug = format!("{:?}", err);
        assert!(debug.contains("TableNotFound"));
    }

    #[test]
    fn test_db_result_type() {
        let ok_result: DbResult<i32> = Ok(42);
        assert_eq!(ok_result.unwrap(), 42);

        let err_result: DbResult<i32> = Err(DbError::Operation("test".to_string()));
        assert!(err_result.is_err());
    }
}
