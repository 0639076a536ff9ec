use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored record: the store-assigned identifier plus an arbitrary field
/// map. Timestamps (`created_at`, `updated_at`) live in the field map as
/// ordinary fields, stamped by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary identifier, assigned from the collection's sequence counter.
    pub id: u64,

    /// The record's fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Get a field value. `id` resolves to the identifier.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == "id" {
            Some(Value::from(self.id))
        } else {
            self.fields.get(field).cloned()
        }
    }

    /// Merge a change set over the existing fields. The identifier is never
    /// caller-assigned, so an `id` key in the changes is ignored.
    pub fn merge(&mut self, changes: &Map<String, Value>) {
        for (key, value) in changes {
            if key != "id" {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    /// Convert to a JSON value including the identifier.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: u64, data: Value) -> Record {
        let fields = data.as_object().cloned().unwrap_or_default();
        Record { id, fields }
    }

    #[test]
    fn test_get_field() {
        let rec = record(7, json!({"title": "Dune", "rating": 5}));
        assert_eq!(rec.get("title"), Some(json!("Dune")));
        assert_eq!(rec.get("rating"), Some(json!(5)));
        assert_eq!(rec.get("missing"), None);
    }

    #[test]
    fn test_get_id() {
        let rec = record(7, json!({}));
        assert_eq!(rec.get("id"), Some(json!(7)));
    }

    #[test]
    fn test_merge_overwrites_fields() {
        let mut rec = record(1, json!({"title": "Dune", "rating": 3}));
        let changes = json!({"rating": 5, "memo": "classic"});
        rec.merge(changes.as_object().unwrap());

        assert_eq!(rec.get("title"), Some(json!("Dune")));
        assert_eq!(rec.get("rating"), Some(json!(5)));
        assert_eq!(rec.get("memo"), Some(json!("classic")));
    }

    #[test]
    fn test_merge_protects_id() {
        let mut rec = record(1, json!({}));
        let changes = json!({"id": 99});
        rec.merge(changes.as_object().unwrap());

        assert_eq!(rec.id, 1);
        assert_eq!(rec.get("id"), Some(json!(1)));
    }

    #[test]
    fn test_serde_round_trip() {
        let rec = record(3, json!({"title": "Dune"}));
        let value = rec.to_value();
        assert_eq!(value["id"], json!(3));
        assert_eq!(value["title"], json!("Dune"));

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, rec);
    }
}
