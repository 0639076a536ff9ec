use chrono::Utc;
use futures::future::try_join_all;
use serde_json::{Map, Value};

use super::filter::filter_records;
use super::sort::sort_records;
use crate::error::{DbError, DbResult};
use crate::sql::{
    BindValue, Condition, DeleteStatement, InsertStatement, OrderBy, SelectStatement,
    UpdateStatement,
};
use crate::storage::{Connection, Record, TxMode};

/// The outcome of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// CREATE TABLE completed (or the table already existed).
    Created,
    /// INSERT completed with the generated identifier.
    Inserted { id: u64 },
    /// SELECT result set.
    Rows(Vec<Record>),
    /// Number of records an UPDATE rewrote.
    Updated { count: usize },
    /// Number of records a DELETE removed.
    Deleted { count: usize },
}

/// Translates parsed statements into Storage Adapter operations, filtering
/// and sorting in memory.
pub struct QueryExecutor<'a> {
    conn: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Build a record by zipping the column list with the parameter values,
    /// stamp `created_at`, and append it.
    pub async fn insert(
        &self,
        stmt: &InsertStatement,
        params: &[Value],
    ) -> DbResult<QueryResult> {
        if stmt.columns.len() != params.len() {
            return Err(DbError::Operation(format!(
                "Column/value count mismatch: {} columns, {} values",
                stmt.columns.len(),
                params.len()
            )));
        }

        let mut fields = Map::new();
        for (column, value) in stmt.columns.iter().zip(params) {
            fields.insert(column.clone(), value.clone());
        }
        fields.insert("created_at".to_string(), now_value());

        let tx = self.conn.begin(&[stmt.table.as_str()], TxMode::ReadWrite)?;
        let record = tx.collection(&stmt.table)?.add(fields).await?;

        tracing::debug!(table = %stmt.table, id = record.id, "inserted record");
        Ok(QueryResult::Inserted { id: record.id })
    }

    /// Snapshot the table, then filter and sort in memory. The projection
    /// list is accepted but full records are always returned (known
    /// limitation).
    pub async fn select(
        &self,
        stmt: &SelectStatement,
        params: &[Value],
    ) -> DbResult<QueryResult> {
        let records = self
            .fetch(
                &stmt.table,
                stmt.conditions.as_deref(),
                stmt.order_by.as_ref(),
                params,
            )
            .await?;
        Ok(QueryResult::Rows(records))
    }

    /// Materialize the target set, then rewrite every matched record
    /// concurrently: the SET map merged over its fields plus an
    /// `updated_at` stamp. Resolves once every write settled; the first
    /// failure rejects the whole call and already-applied writes stay.
    pub async fn update(
        &self,
        stmt: &UpdateStatement,
        params: &[Value],
    ) -> DbResult<QueryResult> {
        let targets = self
            .fetch(&stmt.table, Some(&stmt.conditions), None, params)
            .await?;
        let changes = bind_assignments(&stmt.assignments, params)?;
        let stamp = now_value();

        let tx = self.conn.begin(&[stmt.table.as_str()], TxMode::ReadWrite)?;
        let coll = tx.collection(&stmt.table)?;

        let count = targets.len();
        let writes = targets.into_iter().map(|mut record| {
            record.merge(&changes);
            record
                .fields
                .insert("updated_at".to_string(), stamp.clone());
            let coll = &coll;
            async move { coll.put(&record).await }
        });
        try_join_all(writes).await?;

        tracing::debug!(table = %stmt.table, count, "updated records");
        Ok(QueryResult::Updated { count })
    }

    /// Materialize the target set, then delete every matched record
    /// concurrently, with the same settle-all/fail-fast contract as update.
    pub async fn delete(
        &self,
        stmt: &DeleteStatement,
        params: &[Value],
    ) -> DbResult<QueryResult> {
        let targets = self
            .fetch(&stmt.table, Some(&stmt.conditions), None, params)
            .await?;

        let tx = self.conn.begin(&[stmt.table.as_str()], TxMode::ReadWrite)?;
        let coll = tx.collection(&stmt.table)?;

        let count = targets.len();
        let deletes = targets.iter().map(|record| coll.delete(record.id));
        try_join_all(deletes).await?;

        tracing::debug!(table = %stmt.table, count, "deleted records");
        Ok(QueryResult::Deleted { count })
    }

    async fn fetch(
        &self,
        table: &str,
        conditions: Option<&[Condition]>,
        order_by: Option<&OrderBy>,
        params: &[Value],
    ) -> DbResult<Vec<Record>> {
        let tx = self.conn.begin(&[table], TxMode::ReadOnly)?;
        let mut records = tx.collection(table)?.get_all().await?;

        if let Some(conditions) = conditions {
            records = filter_records(records, conditions, params);
        }
        if let Some(order) = order_by {
            records = sort_records(records, order);
        }

        Ok(records)
    }
}

/// Resolve the SET assignments against the parameter list: placeholders
/// bind in order of appearance within the SET clause, starting at index 0.
/// WHERE conditions independently bind from index 0 of the same list.
fn bind_assignments(
    assignments: &[(String, BindValue)],
    params: &[Value],
) -> DbResult<Map<String, Value>> {
    let mut changes = Map::new();
    let mut next_param = 0usize;

    for (column, value) in assignments {
        let resolved = match value {
            BindValue::Literal(v) => v.clone(),
            BindValue::Placeholder(_) => {
                let v = params.get(next_param).cloned().ok_or_else(|| {
                    DbError::Operation(format!(
                        "Missing parameter for SET assignment '{}'",
                        column
                    ))
                })?;
                next_param += 1;
                v
            }
        };
        changes.insert(column.clone(), resolved);
    }

    Ok(changes)
}

fn now_value() -> Value {
    serde_json::to_value(Utc::now()).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_assignments_literals_and_placeholders() {
        let assignments = vec![
            ("rating".to_string(), BindValue::Placeholder("?".to_string())),
            ("memo".to_string(), BindValue::Literal(json!("classic"))),
            ("author".to_string(), BindValue::Placeholder("?".to_string())),
        ];
        let changes = bind_assignments(&assignments, &[json!(5), json!("Herbert")]).unwrap();

        assert_eq!(changes["rating"], json!(5));
        assert_eq!(changes["memo"], json!("classic"));
        assert_eq!(changes["author"], json!("Herbert"));
    }

    #[test]
    fn test_bind_assignments_missing_parameter() {
        let assignments = vec![(
            "rating".to_string(),
            BindValue::Placeholder("?".to_string()),
        )];
        let result = bind_assignments(&assignments, &[]);
        assert!(matches!(result, Err(DbError::Operation(_))));
    }

    #[test]
    fn test_now_value_is_a_timestamp_string() {
        let value = now_value();
        assert!(value.is_string());
    }
}
