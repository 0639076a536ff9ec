use serde_json::Value;

use crate::sql::OrderBy;
use crate::storage::codec::compare_values;
use crate::storage::Record;

/// Stable sort on one field. Values order by type rank, then natively
/// within the type; a missing field sorts as Null. DESC reverses the
/// comparison; ties keep their input order.
pub fn sort_records(mut records: Vec<Record>, order: &OrderBy) -> Vec<Record> {
    records.sort_by(|a, b| {
        let left = a.get(&order.column).unwrap_or(Value::Null);
        let right = b.get(&order.column).unwrap_or(Value::Null);
        let ordering = compare_values(&left, &right);
        if order.descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    records
}
