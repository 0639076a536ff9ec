use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::encode_key;

/// Key prefixes for the data kinds sharing one column family
pub const DOC_PREFIX: &str = "doc:";
pub const IDX_PREFIX: &str = "idx:";
pub const IDX_META_PREFIX: &str = "idx_meta:";
pub const SEQ_KEY: &str = "_stats:seq"; // Auto-increment counter

/// Secondary index metadata, one per indexed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub column: String,
    pub unique: bool,
}

/// Generate a document key: "doc:<id>" with the id zero-padded so the
/// lexicographic scan order is the numeric id order.
pub fn doc_key(id: u64) -> Vec<u8> {
    format!("{}{:016x}", DOC_PREFIX, id).into_bytes()
}

/// Generate an index metadata key: "idx_meta:<column>"
pub fn idx_meta_key(column: &str) -> Vec<u8> {
    format!("{}{}", IDX_META_PREFIX, column).into_bytes()
}

/// Generate an index entry key: "idx:<column>:<hex(encoded value)>:<id>".
/// The hex wrapping keeps the binary-comparable encoding key-safe.
pub fn idx_entry_key(column: &str, value: &Value, id: u64) -> Vec<u8> {
    format!(
        "{}{}:{}:{:016x}",
        IDX_PREFIX,
        column,
        hex::encode(encode_key(value)),
        id
    )
    .into_bytes()
}

/// Scan prefix covering every entry of one column's index for one value.
pub fn idx_value_prefix(column: &str, value: &Value) -> Vec<u8> {
    format!("{}{}:{}:", IDX_PREFIX, column, hex::encode(encode_key(value))).into_bytes()
}

/// Scan prefix covering every entry of one column's index.
pub fn idx_column_prefix(column: &str) -> Vec<u8> {
    format!("{}{}:", IDX_PREFIX, column).into_bytes()
}
