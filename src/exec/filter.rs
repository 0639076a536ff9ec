use serde_json::Value;
use std::cmp::Ordering;

use crate::sql::{CompareOp, Condition};
use crate::storage::codec::type_rank;
use crate::storage::Record;

/// Evaluate a WHERE conjunction over an in-memory record set: a record
/// passes only if every condition holds.
///
/// Parameter binding is positional: the i-th condition compares against the
/// i-th caller-supplied parameter, regardless of the placeholder or literal
/// written in the statement. A condition with no matching parameter, a
/// missing field, or a type-incompatible comparison evaluates false.
pub fn filter_records(records: Vec<Record>, conditions: &[Condition], params: &[Value]) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| {
            conditions.iter().enumerate().all(|(i, condition)| {
                let Some(param) = params.get(i) else {
                    return false;
                };
                matches_condition(record, condition, param)
            })
        })
        .collect()
}

fn matches_condition(record: &Record, condition: &Condition, param: &Value) -> bool {
    let Some(field) = record.get(&condition.column) else {
        return false;
    };

    match condition.op {
        CompareOp::Eq => values_equal(&field, param),
        CompareOp::Like => like_match(&field, param),
        CompareOp::Gt => matches!(partial_compare(&field, param), Some(Ordering::Greater)),
        CompareOp::Lt => matches!(partial_compare(&field, param), Some(Ordering::Less)),
    }
}

/// Equality with numeric normalization: integers and floats compare by
/// value, everything else by JSON equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(fx), Some(fy)) => fx == fy,
                _ => x == y,
            }
        }
        _ => a == b,
    }
}

/// Substring containment after stripping `%` wildcard markers from the
/// pattern. No `_` wildcard, no anchoring. Only string fields match.
fn like_match(field: &Value, pattern: &Value) -> bool {
    let (Value::String(field), Value::String(pattern)) = (field, pattern) else {
        return false;
    };
    field.contains(&pattern.replace('%', ""))
}

/// Native ordering within one runtime type; comparisons across types have
/// no defined order and fail the condition.
fn partial_compare(a: &Value, b: &Value) -> Option<Ordering> {
    if type_rank(a) != type_rank(b) {
        return None;
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::BindValue;
    use serde_json::json;

    fn record(id: u64, data: Value) -> Record {
        Record {
            id,
            fields: data.as_object().cloned().unwrap_or_default(),
        }
    }

    fn cond(column: &str, op: CompareOp) -> Condition {
        Condition {
            column: column.to_string(),
            op,
            rhs: BindValue::Placeholder("?".to_string()),
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record(1, json!({"title": "Dune", "author": "Herbert", "rating": 5})),
            record(2, json!({"title": "Foundation", "author": "Asimov", "rating": 4})),
            record(3, json!({"title": "Dune Messiah", "author": "Herbert", "rating": 3})),
        ]
    }

    #[test]
    fn test_eq_filter() {
        let out = filter_records(sample(), &[cond("author", CompareOp::Eq)], &[json!("Herbert")]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.get("author") == Some(json!("Herbert"))));
    }

    #[test]
    fn test_eq_on_id() {
        let out = filter_records(sample(), &[cond("id", CompareOp::Eq)], &[json!(2)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn test_numeric_eq_across_int_and_float() {
        let out = filter_records(sample(), &[cond("rating", CompareOp::Eq)], &[json!(5.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn test_like_strips_wildcards() {
        let out = filter_records(sample(), &[cond("title", CompareOp::Like)], &[json!("%Dune%")]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_like_is_substring_containment() {
        let out = filter_records(sample(), &[cond("title", CompareOp::Like)], &[json!("ndatio")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn test_like_non_string_field_fails() {
        let out = filter_records(sample(), &[cond("rating", CompareOp::Like)], &[json!("5")]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_gt_lt() {
        let gt = filter_records(sample(), &[cond("rating", CompareOp::Gt)], &[json!(3)]);
        assert_eq!(gt.len(), 2);

        let lt = filter_records(sample(), &[cond("rating", CompareOp::Lt)], &[json!(4)]);
        assert_eq!(lt.len(), 1);
        assert_eq!(lt[0].id, 3);
    }

    #[test]
    fn test_string_ordering() {
        let out = filter_records(sample(), &[cond("author", CompareOp::Lt)], &[json!("B")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn test_conjunction() {
        let out = filter_records(
            sample(),
            &[cond("author", CompareOp::Eq), cond("rating", CompareOp::Gt)],
            &[json!("Herbert"), json!(4)],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn test_binding_is_positional_not_textual() {
        // The literal written in the condition is ignored; the parameter
        // list decides what each condition compares against.
        let conditions = vec![Condition {
            column: "author".to_string(),
            op: CompareOp::Eq,
            rhs: BindValue::Literal(json!("Asimov")),
        }];
        let out = filter_records(sample(), &conditions, &[json!("Herbert")]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.get("author") == Some(json!("Herbert"))));
    }

    #[test]
    fn test_missing_parameter_fails_closed() {
        let out = filter_records(sample(), &[cond("author", CompareOp::Eq)], &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_field_fails_closed() {
        let out = filter_records(sample(), &[cond("publisher", CompareOp::Eq)], &[json!("x")]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_cross_type_comparison_fails_closed() {
        let out = filter_records(sample(), &[cond("rating", CompareOp::Gt)], &[json!("3")]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_no_conditions_passes_everything() {
        let out = filter_records(sample(), &[], &[]);
        assert_eq!(out.len(), 3);
    }
}
