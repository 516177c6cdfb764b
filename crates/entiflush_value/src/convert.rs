//! Conversions between [`Value`] and Rust scalar types.
//!
//! Accessors use these to move field contents in and out of the type-erased
//! representation. `Option<T>` maps `None` to [`Value::Null`].

use crate::error::{ValueError, ValueResult};
use crate::value::{Value, ValueKind};
use uuid::Uuid;

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

macro_rules! try_from_value {
    ($ty:ty, $kind:expr, $pat:pat => $out:expr) => {
        impl TryFrom<Value> for $ty {
            type Error = ValueError;

            fn try_from(value: Value) -> ValueResult<Self> {
                match value {
                    $pat => Ok($out),
                    other => Err(ValueError::type_mismatch($kind, other.kind())),
                }
            }
        }

        impl TryFrom<Value> for Option<$ty> {
            type Error = ValueError;

            fn try_from(value: Value) -> ValueResult<Self> {
                match value {
                    Value::Null => Ok(None),
                    other => <$ty>::try_from(other).map(Some),
                }
            }
        }
    };
}

try_from_value!(bool, ValueKind::Bool, Value::Bool(b) => b);
try_from_value!(i64, ValueKind::Integer, Value::Integer(n) => n);
try_from_value!(String, ValueKind::Text, Value::Text(s) => s);
try_from_value!(Vec<u8>, ValueKind::Bytes, Value::Bytes(b) => b);
try_from_value!(Uuid, ValueKind::Uuid, Value::Uuid(u) => u);

impl TryFrom<Value> for i32 {
    type Error = ValueError;

    fn try_from(value: Value) -> ValueResult<Self> {
        let n = i64::try_from(value)?;
        i32::try_from(n).map_err(|_| ValueError::OutOfRange(n))
    }
}

impl TryFrom<Value> for Option<i32> {
    type Error = ValueError;

    fn try_from(value: Value) -> ValueResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => i32::try_from(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_none_is_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Integer(7));
    }

    #[test]
    fn try_from_wrong_kind() {
        let err = i64::try_from(Value::Text("x".into())).unwrap_err();
        assert_eq!(
            err,
            ValueError::type_mismatch(ValueKind::Integer, ValueKind::Text)
        );
    }

    #[test]
    fn optional_from_null() {
        let parent: Option<i64> = Value::Null.try_into().unwrap();
        assert_eq!(parent, None);
        let parent: Option<i64> = Value::Integer(3).try_into().unwrap();
        assert_eq!(parent, Some(3));
    }

    #[test]
    fn i32_out_of_range() {
        let err = i32::try_from(Value::Integer(i64::MAX)).unwrap_err();
        assert_eq!(err, ValueError::OutOfRange(i64::MAX));
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from("hi"), Value::Text("hi".to_string()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert_eq!(Value::from(()), Value::Null);
    }
}
