use serde_json::{json, Value as Json};

use crate::error::ValueFromJsonError;
use crate::oid::Oid;

/// A runtime value carried by object attributes, components, and payload
/// contents.
///
/// The value model is closed: scalars plus object references. Object
/// references hold only the oid — never the object itself — so values
/// stay `Copy`-cheap to clone and the heap keeps sole ownership of
/// records.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    /// Reference to another object by oid.
    Object(Oid),
}

impl Value {
    /// The referenced oid, if this value is an object reference.
    pub fn as_oid(&self) -> Option<Oid> {
        match self {
            Value::Object(oid) => Some(*oid),
            _ => None,
        }
    }

    /// Convert to the persisted JSON form. Object references become
    /// `{"oid": "<canonical>"}`; non-finite doubles degrade to JSON null.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Double(d) => json!(d),
            Value::Str(s) => json!(s),
            Value::Object(oid) => json!({ "oid": oid.to_canonical_string() }),
        }
    }

    /// Rebuild a value from its persisted JSON form.
    ///
    /// Integral JSON numbers become [`Value::Int`], other numbers
    /// [`Value::Double`]. The only accepted object shape is a single
    /// `"oid"` key holding a canonical oid string.
    pub fn from_json(json: &Json) -> Result<Self, ValueFromJsonError> {
        match json {
            Json::Null => Err(ValueFromJsonError::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(d) = n.as_f64() {
                    Ok(Value::Double(d))
                } else {
                    Err(ValueFromJsonError::Unsupported(format!("number {n}")))
                }
            }
            Json::String(s) => Ok(Value::Str(s.clone())),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some(Json::String(text)) = map.get("oid") {
                        return Ok(Value::Object(Oid::try_parse(text)?));
                    }
                }
                Err(ValueFromJsonError::Unsupported(
                    "object without a single \"oid\" key".into(),
                ))
            }
            Json::Array(_) => Err(ValueFromJsonError::Unsupported("array".into())),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::Object(oid)
    }
}
