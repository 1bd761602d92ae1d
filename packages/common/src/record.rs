//! Open key/value payload of a submitted record.
//!
//! The store keeps whatever keys a submission carried. Checking the data
//! against an event's fields happens at the write boundary
//! ([`crate::form::validate_record`]); reads never reject drifted data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that are always dropped from submitted payloads.
const FORBIDDEN_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Nesting deeper than this is rejected outright.
const MAX_DEPTH: usize = 8;

/// Mapping from field label to submitted value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordData(pub Map<String, Value>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Record data must be a JSON object")]
    NotAnObject,
    #[error("Record data is nested too deeply")]
    TooDeep,
}

impl RecordData {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `key` holds a populated value.
    pub fn is_populated(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(is_populated)
    }

    /// Shallow merge: keys in `patch` replace existing keys, a `null`
    /// value removes the key.
    pub fn merge(&mut self, patch: RecordData) {
        for (key, value) in patch.0 {
            if value.is_null() {
                self.0.remove(&key);
            } else {
                self.0.insert(key, value);
            }
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Interpret a stored JSON column. Non-object values read as empty.
    pub fn from_stored(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(map.clone()),
            _ => Self::default(),
        }
    }
}

/// Result of sanitizing an incoming payload.
#[derive(Debug)]
pub struct Sanitized {
    pub data: RecordData,
    /// Number of keys dropped anywhere in the tree.
    pub removed: usize,
}

/// Returns true if a key is unsafe to store in the document column.
///
/// Operator-looking keys (`$where`) and dotted paths are rejected along with
/// prototype-polluting names.
pub fn is_unsafe_key(key: &str) -> bool {
    FORBIDDEN_KEYS.contains(&key) || key.starts_with('$') || key.contains('.')
}

/// Validate the payload shape and strip unsafe keys at every depth.
pub fn sanitize(value: Value) -> Result<Sanitized, PayloadError> {
    let Value::Object(map) = value else {
        return Err(PayloadError::NotAnObject);
    };
    let mut removed = 0;
    let map = clean_map(map, 0, &mut removed)?;
    Ok(Sanitized {
        data: RecordData(map),
        removed,
    })
}

fn clean_map(
    map: Map<String, Value>,
    depth: usize,
    removed: &mut usize,
) -> Result<Map<String, Value>, PayloadError> {
    if depth > MAX_DEPTH {
        return Err(PayloadError::TooDeep);
    }
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if is_unsafe_key(&key) {
            *removed += 1;
            continue;
        }
        out.insert(key, clean_value(value, depth + 1, removed)?);
    }
    Ok(out)
}

fn clean_value(value: Value, depth: usize, removed: &mut usize) -> Result<Value, PayloadError> {
    match value {
        Value::Object(map) => Ok(Value::Object(clean_map(map, depth, removed)?)),
        Value::Array(items) => {
            if depth > MAX_DEPTH {
                return Err(PayloadError::TooDeep);
            }
            items
                .into_iter()
                .map(|v| clean_value(v, depth + 1, removed))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        other => Ok(other),
    }
}

/// A value counts as populated unless it is null, a blank string or an
/// empty array. `false` and `0` are answers.
pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Parse a stored value as a finite number. Numeric strings are accepted.
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
