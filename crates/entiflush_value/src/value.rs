//! Dynamic field value type.

use crate::error::{ValueError, ValueResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of a [`Value`], used to declare the type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// The null value.
    Null,
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Byte string.
    Bytes,
    /// 128-bit UUID.
    Uuid,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// A type-erased field value.
///
/// Entity fields are read and written through accessors that produce and
/// consume `Value`s, so the engine can compare, hash and remap keys without
/// knowing the entity's concrete type.
///
/// # Ordering
///
/// The derived order is the natural order of each field type. Variants are
/// declared so that `Null` sorts before every non-null value, and values of
/// different kinds order by kind. Floats are not supported, which keeps the
/// order total and `Eq`/`Hash` consistent with it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
}

impl Value {
    /// Returns the kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Uuid(_) => ValueKind::Uuid,
        }
    }

    /// Check if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a UUID, if it is one.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Converts this value to the given kind.
    ///
    /// Backends report generated identities in whatever representation they
    /// natively use; this brings them back to the key field's declared kind.
    /// `Null` converts to `Null` for every kind.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Conversion`] when no lossless conversion exists.
    pub fn coerce(self, target: ValueKind) -> ValueResult<Value> {
        if self.kind() == target || self.is_null() {
            return Ok(self);
        }

        match (self, target) {
            (Value::Integer(n), ValueKind::Text) => Ok(Value::Text(n.to_string())),
            (Value::Text(s), ValueKind::Integer) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| ValueError::conversion(format!("{s:?}"), target)),
            (Value::Text(s), ValueKind::Uuid) => Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|_| ValueError::conversion(format!("{s:?}"), target)),
            (Value::Uuid(u), ValueKind::Text) => Ok(Value::Text(u.to_string())),
            (Value::Uuid(u), ValueKind::Bytes) => Ok(Value::Bytes(u.as_bytes().to_vec())),
            (Value::Bytes(b), ValueKind::Uuid) => Uuid::from_slice(&b)
                .map(Value::Uuid)
                .map_err(|_| ValueError::conversion(format!("{} bytes", b.len()), target)),
            (Value::Bool(b), ValueKind::Integer) => Ok(Value::Integer(i64::from(b))),
            (value, target) => Err(ValueError::conversion(value, target)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}
