use serde_json::Value;
use std::cmp::Ordering;

/// Encode a value into a binary-comparable key.
/// Preserves sort order: Null < Bool < Number < String < Other.
pub fn encode_key(value: &Value) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    match value {
        Value::Null => {
            key.push(0x01);
        }
        Value::Bool(false) => {
            key.push(0x02);
            key.push(0x00);
        }
        Value::Bool(true) => {
            key.push(0x02);
            key.push(0x01);
        }
        Value::Number(n) => {
            key.push(0x03);
            let f = n.as_f64().unwrap_or(0.0);
            key.extend_from_slice(&encode_f64(f));
        }
        Value::String(s) => {
            key.push(0x04);
            key.extend_from_slice(s.as_bytes());
            key.push(0x00); // Null terminator
        }
        Value::Array(_) | Value::Object(_) => {
            // Composite types fall back to lexical JSON ordering
            key.push(0x05);
            let s = value.to_string();
            key.extend_from_slice(s.as_bytes());
            key.push(0x00);
        }
    }
    key
}

/// Compare two values in the same total order the key encoding produces:
/// type rank first, then the native ordering within the type.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank_a = type_rank(a);
    let rank_b = type_rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let fx = x.as_f64().unwrap_or(0.0);
            let fy = y.as_f64().unwrap_or(0.0);
            fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 1,
        Value::Bool(_) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) | Value::Object(_) => 5,
    }
}

/// Encode f64 to binary-comparable bytes
fn encode_f64(val: f64) -> [u8; 8] {
    let mut bits = val.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        bits = !bits;
    } else {
        bits ^= 0x8000_0000_0000_0000;
    }
    bits.to_be_bytes()
}
