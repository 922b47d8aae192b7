//! Dot-path selection into JSON response bodies (`data.token`, `metadata.total_pages`)

use serde_json::Value;

/// Resolve a dot-separated path. Numeric segments index into arrays.
///
/// An empty path selects the whole document.
pub fn select<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Outcome of reading a numeric field
#[derive(Debug, PartialEq)]
pub enum Numeric {
    Missing,
    Value(u64),
    Invalid(String),
}

/// Read a non-negative integer at `path`.
///
/// Accepts JSON integers, integral floats and numeric strings (some APIs
/// quote their counters). `null` counts as missing.
pub fn select_u64(value: &Value, path: &str) -> Numeric {
    match select(value, path) {
        None | Some(Value::Null) => Numeric::Missing,
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                Numeric::Value(v)
            } else {
                match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 => Numeric::Value(f as u64),
                    _ => Numeric::Invalid(n.to_string()),
                }
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_or_else(|_| Numeric::Invalid(s.clone()), Numeric::Value),
        Some(other) => Numeric::Invalid(other.to_string()),
    }
}
