//! Wire Codec Module
//!
//! Converts [`ScriptValue`]s to JSON bytes and back.
//!
//! Plain values map onto JSON directly. Tuples and structs, which JSON cannot
//! tell apart from arrays and objects, travel inside an envelope:
//!
//! ```json
//! {"__type__": "tuple", "values": [1, 2]}
//! {"__type__": "struct", "values": {"name": "bob"}}
//! ```
//!
//! Numbers with a zero fractional part that fit in `i64` always decode as
//! ints, so `Float(2.0)` comes back as `Int(2)`. The two compare equal in the
//! scripting language, and existing stored data relies on this rule.

use std::fmt;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::ScriptValue;

// == Wire Constants ==
/// Envelope field naming the tagged type.
pub const TYPE_TAG: &str = "__type__";
/// Envelope field holding the tagged payload.
pub const VALUES_FIELD: &str = "values";

/// Deepest container nesting `decode` accepts. serde_json refuses to parse
/// a 128th level, so `encode` refuses to produce one.
pub const MAX_DEPTH: usize = 127;

const TUPLE_TAG: &str = "tuple";
const STRUCT_TAG: &str = "struct";

// == Errors ==
/// Errors raised while encoding a value for storage.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("{path}: int too large: {value}")]
    IntTooLarge { path: String, value: i128 },

    #[error("{path}: float is not finite: {value}")]
    NonFiniteFloat { path: String, value: f64 },

    #[error("{path}: dict key is not a string: {type_name}")]
    NonStringKey {
        path: String,
        type_name: &'static str,
    },

    /// A dict whose `__type__` entry holds a string would read back as an envelope.
    #[error("{path}: dict key \"__type__\" with a string value is reserved")]
    ReservedKey { path: String },

    /// Tuples and structs count twice: the envelope object and its payload.
    #[error("{path}: value nested deeper than {} levels", MAX_DEPTH)]
    TooDeep { path: String },

    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while decoding stored bytes.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: unknown __type__ {tag:?}")]
    UnknownType { path: String, tag: String },

    #[error("{path}: invalid {kind} format: \"values\" must be {expected}")]
    InvalidEnvelope {
        path: String,
        kind: &'static str,
        expected: &'static str,
    },
}

// == Value Path ==
/// Location of an element inside the value being converted, rendered only
/// when an error needs it.
#[derive(Clone, Copy)]
enum Path<'a> {
    Root,
    Index(&'a Path<'a>, usize),
    Key(&'a Path<'a>, &'a str),
    Field(&'a Path<'a>, &'a str),
}

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Root => f.write_str("value"),
            Path::Index(parent, i) => write!(f, "{parent}[{i}]"),
            Path::Key(parent, key) => write!(f, "{parent}[{key:?}]"),
            Path::Field(parent, name) => write!(f, "{parent}.{name}"),
        }
    }
}

// == Encode ==
/// Encodes a value into its JSON wire form.
pub fn encode(value: &ScriptValue) -> Result<Vec<u8>, EncodeError> {
    let json = to_json(value)?;
    Ok(serde_json::to_vec(&json)?)
}

/// Converts a value into a JSON tree without serializing it.
pub fn to_json(value: &ScriptValue) -> Result<Value, EncodeError> {
    to_json_at(value, &Path::Root, 0)
}

/// `depth` counts the JSON containers already open around `value`.
fn to_json_at(value: &ScriptValue, path: &Path<'_>, depth: usize) -> Result<Value, EncodeError> {
    let nested = match value {
        ScriptValue::List(_) | ScriptValue::Dict(_) => depth + 1,
        ScriptValue::Tuple(_) | ScriptValue::Struct(_) => depth + 2,
        _ => depth,
    };
    if nested > MAX_DEPTH {
        return Err(EncodeError::TooDeep {
            path: path.to_string(),
        });
    }

    let json = match value {
        ScriptValue::None => Value::Null,
        ScriptValue::Bool(b) => Value::Bool(*b),
        ScriptValue::Int(i) => {
            let n = i64::try_from(*i).map_err(|_| EncodeError::IntTooLarge {
                path: path.to_string(),
                value: *i,
            })?;
            Value::from(n)
        }
        ScriptValue::Float(f) => {
            let n = Number::from_f64(*f).ok_or_else(|| EncodeError::NonFiniteFloat {
                path: path.to_string(),
                value: *f,
            })?;
            Value::Number(n)
        }
        ScriptValue::String(s) => Value::String(s.clone()),
        ScriptValue::List(items) => Value::Array(items_to_json(items, path, nested)?),
        ScriptValue::Dict(pairs) => {
            let mut map = Map::with_capacity(pairs.len());
            for (key, item) in pairs {
                let ScriptValue::String(key) = key else {
                    return Err(EncodeError::NonStringKey {
                        path: path.to_string(),
                        type_name: key.type_name(),
                    });
                };
                if key == TYPE_TAG && matches!(item, ScriptValue::String(_)) {
                    return Err(EncodeError::ReservedKey {
                        path: path.to_string(),
                    });
                }
                map.insert(key.clone(), to_json_at(item, &Path::Key(path, key), nested)?);
            }
            Value::Object(map)
        }
        ScriptValue::Tuple(items) => {
            envelope(TUPLE_TAG, Value::Array(items_to_json(items, path, nested)?))
        }
        ScriptValue::Struct(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (name, item) in fields {
                map.insert(name.clone(), to_json_at(item, &Path::Field(path, name), nested)?);
            }
            envelope(STRUCT_TAG, Value::Object(map))
        }
    };
    Ok(json)
}

fn items_to_json(
    items: &[ScriptValue],
    path: &Path<'_>,
    depth: usize,
) -> Result<Vec<Value>, EncodeError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| to_json_at(item, &Path::Index(path, i), depth))
        .collect()
}

fn envelope(tag: &str, values: Value) -> Value {
    let mut map = Map::with_capacity(2);
    map.insert(TYPE_TAG.to_string(), Value::String(tag.to_string()));
    map.insert(VALUES_FIELD.to_string(), values);
    Value::Object(map)
}

// == Decode ==
/// Decodes JSON wire bytes back into a value.
pub fn decode(bytes: &[u8]) -> Result<ScriptValue, DecodeError> {
    let json: Value = serde_json::from_slice(bytes)?;
    from_json(json)
}

/// Converts an already parsed JSON tree into a value.
pub fn from_json(json: Value) -> Result<ScriptValue, DecodeError> {
    from_json_at(json, &Path::Root)
}

fn from_json_at(json: Value, path: &Path<'_>) -> Result<ScriptValue, DecodeError> {
    let value = match json {
        Value::Null => ScriptValue::None,
        Value::Bool(b) => ScriptValue::Bool(b),
        Value::Number(n) => number_to_value(&n),
        Value::String(s) => ScriptValue::String(s),
        Value::Array(items) => ScriptValue::List(items_from_json(items, path)?),
        Value::Object(map) => object_to_value(map, path)?,
    };
    Ok(value)
}

fn number_to_value(n: &Number) -> ScriptValue {
    if let Some(i) = n.as_i64() {
        return ScriptValue::Int(i.into());
    }
    // as_f64 only fails with serde_json's arbitrary_precision feature.
    let f = n.as_f64().unwrap_or(f64::NAN);
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        ScriptValue::Int((f as i64).into())
    } else {
        ScriptValue::Float(f)
    }
}

fn object_to_value(mut map: Map<String, Value>, path: &Path<'_>) -> Result<ScriptValue, DecodeError> {
    let tag = match map.get(TYPE_TAG) {
        Some(Value::String(tag)) => Some(tag.clone()),
        _ => None,
    };

    match tag.as_deref() {
        None => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, item) in map {
                let value = from_json_at(item, &Path::Key(path, &key))?;
                pairs.push((ScriptValue::String(key), value));
            }
            Ok(ScriptValue::Dict(pairs))
        }
        Some(TUPLE_TAG) => match map.remove(VALUES_FIELD) {
            Some(Value::Array(items)) => Ok(ScriptValue::Tuple(items_from_json(items, path)?)),
            _ => Err(DecodeError::InvalidEnvelope {
                path: path.to_string(),
                kind: TUPLE_TAG,
                expected: "an array",
            }),
        },
        Some(STRUCT_TAG) => match map.remove(VALUES_FIELD) {
            Some(Value::Object(values)) => {
                let mut fields = Vec::with_capacity(values.len());
                for (name, item) in values {
                    let value = from_json_at(item, &Path::Field(path, &name))?;
                    fields.push((name, value));
                }
                Ok(ScriptValue::Struct(fields))
            }
            _ => Err(DecodeError::InvalidEnvelope {
                path: path.to_string(),
                kind: STRUCT_TAG,
                expected: "an object",
            }),
        },
        Some(other) => Err(DecodeError::UnknownType {
            path: path.to_string(),
            tag: other.to_string(),
        }),
    }
}

fn items_from_json(items: Vec<Value>, path: &Path<'_>) -> Result<Vec<ScriptValue>, DecodeError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| from_json_at(item, &Path::Index(path, i)))
        .collect()
}
