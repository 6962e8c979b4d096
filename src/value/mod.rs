//! Script Value Module
//!
//! The dynamic value model exchanged with the embedded scripting language,
//! plus the JSON wire codec used to persist it.

pub mod codec;


use std::fmt;

pub use codec::{decode, encode, from_json, to_json, DecodeError, EncodeError};

// == Script Value ==
/// A value as seen by scripts running in the embedded host.
///
/// `List`/`Tuple` and `Dict`/`Struct` are kept apart even though JSON has a
/// single shape for each pair; the codec tags tuples and structs so they
/// survive a round trip through the store.
#[derive(Debug, Clone, Default)]
pub enum ScriptValue {
    #[default]
    None,
    Bool(bool),
    /// Host integers narrowed to 128 bits. Only the `i64` range is storable.
    Int(i128),
    Float(f64),
    String(String),
    List(Vec<ScriptValue>),
    /// Ordered key/value pairs. Keys may be any value in memory, but only
    /// string keys can be encoded.
    Dict(Vec<(ScriptValue, ScriptValue)>),
    Tuple(Vec<ScriptValue>),
    /// Named fields of a struct.
    Struct(Vec<(String, ScriptValue)>),
}

impl ScriptValue {
    // == Constructors ==
    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a dict with string keys.
    pub fn dict<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        Self::Dict(
            pairs
                .into_iter()
                .map(|(k, v)| (Self::String(k.into()), v))
                .collect(),
        )
    }

    /// Creates a struct from named fields.
    pub fn structure<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        Self::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    // == Type Name ==
    /// Returns the name scripts see for this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Tuple(_) => "tuple",
            Self::Struct(_) => "struct",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

// == Equality ==
// Mirrors the scripting language: ints and floats compare numerically,
// dict and struct equality ignores field order.
impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        use ScriptValue::*;

        match (self, other) {
            (None, None) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(i), Float(f)) | (Float(f), Int(i)) => int_equals_float(*i, *f),
            (String(a), String(b)) => a == b,
            (List(a), List(b)) | (Tuple(a), Tuple(b)) => a == b,
            (Dict(a), Dict(b)) => same_pairs(a, b),
            (Struct(a), Struct(b)) => same_pairs(a, b),
            _ => false,
        }
    }
}

fn int_equals_float(i: i128, f: f64) -> bool {
    // i128::MAX as f64 rounds up to 2^127, hence the strict upper bound.
    f.fract() == 0.0 && f >= i128::MIN as f64 && f < i128::MAX as f64 && f as i128 == i
}

fn same_pairs<K: PartialEq, V: PartialEq>(a: &[(K, V)], b: &[(K, V)]) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, value)| {
            b.iter()
                .find(|(other_key, _)| other_key == key)
                .is_some_and(|(_, other_value)| other_value == value)
        })
}

// == Conversions ==
impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        Self::Int(i.into())
    }
}

impl From<i32> for ScriptValue {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<f64> for ScriptValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<ScriptValue>> for ScriptValue {
    fn from(items: Vec<ScriptValue>) -> Self {
        Self::List(items)
    }
}

// == Display ==
/// Renders values the way the scripting language prints them.
impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Dict(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Struct(fields) => {
                f.write_str("struct(")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} = {value}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[ScriptValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_equals_float_numerically() {
        assert_eq!(ScriptValue::Int(2), ScriptValue::Float(2.0));
        assert_eq!(ScriptValue::Float(-7.0), ScriptValue::Int(-7));
        assert_ne!(ScriptValue::Int(2), ScriptValue::Float(2.5));
        assert_ne!(ScriptValue::Int(0), ScriptValue::Float(f64::NAN));
    }

    #[test]
    fn test_list_and_tuple_are_distinct() {
        let items = vec![ScriptValue::from(1), ScriptValue::from(2)];
        assert_ne!(ScriptValue::List(items.clone()), ScriptValue::Tuple(items));
    }

    #[test]
    fn test_dict_and_struct_are_distinct() {
        let dict = ScriptValue::dict([("a", ScriptValue::from(1))]);
        let structure = ScriptValue::structure([("a", ScriptValue::from(1))]);
        assert_ne!(dict, structure);
    }

    #[test]
    fn test_dict_equality_ignores_order() {
        let a = ScriptValue::dict([("x", ScriptValue::from(1)), ("y", ScriptValue::from(2))]);
        let b = ScriptValue::dict([("y", ScriptValue::from(2)), ("x", ScriptValue::from(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_list_equality_is_positional() {
        let a = ScriptValue::from(vec![ScriptValue::from(1), ScriptValue::from(2)]);
        let b = ScriptValue::from(vec![ScriptValue::from(2), ScriptValue::from(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_struct_equality_ignores_order() {
        let a = ScriptValue::structure([("name", ScriptValue::from("bob")), ("age", ScriptValue::from(42))]);
        let b = ScriptValue::structure([("age", ScriptValue::from(42)), ("name", ScriptValue::from("bob"))]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ScriptValue::None.type_name(), "NoneType");
        assert_eq!(ScriptValue::Int(1).type_name(), "int");
        assert_eq!(ScriptValue::Tuple(vec![]).type_name(), "tuple");
        assert_eq!(ScriptValue::Struct(vec![]).type_name(), "struct");
    }

    #[test]
    fn test_display() {
        let value = ScriptValue::dict([
            ("t", ScriptValue::Tuple(vec![1.into()])),
            ("f", ScriptValue::Float(2.0)),
            ("s", ScriptValue::structure([("ok", ScriptValue::Bool(true))])),
            ("n", ScriptValue::None),
        ]);
        assert_eq!(
            value.to_string(),
            r#"{"t": (1,), "f": 2.0, "s": struct(ok = True), "n": None}"#
        );
    }
}
