//! Value kinds and the conversion between Rust field types and database values.
//!
//! Every member of a persistent struct must implement [`FieldValue`]. The
//! implementation decides the column's [`ValueKind`] and how the member is
//! bound as a parameter and read back from a result row.

use crate::error::{QueryError, Result};
use serde_json::Value;
use std::fmt;

/// Semantic kind of a persistent field, used to pick the SQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Real,
    Text,
    /// Fixed-size character data of exactly `N` bytes.
    FixedText(usize),
}

/// Conversion between a field type and its database representation.
pub trait FieldValue: Sized {
    const KIND: ValueKind;

    /// Value bound as a statement parameter.
    fn to_value(&self) -> Value;

    /// Rebuild the field from a column value. `NULL` yields the type's empty value.
    fn from_value(value: &Value) -> Result<Self>;
}

/// Resolve the value kind of a struct member from an accessor.
///
/// Used by [`declare_persistent!`](crate::declare_persistent) so the member
/// types never have to be spelled out in the declaration.
pub fn kind_of<T, V, F>(_accessor: F) -> ValueKind
where
    V: FieldValue,
    F: Fn(&T) -> &V,
{
    V::KIND
}

fn mismatch(value: &Value, target: &str) -> QueryError {
    QueryError::TypeMapping(format!("cannot convert {} to {}", value, target))
}

macro_rules! impl_integer_field {
    ($($t:ty),+ $(,)?) => {
        $(
            impl FieldValue for $t {
                const KIND: ValueKind = ValueKind::Integer;

                fn to_value(&self) -> Value {
                    Value::from(*self)
                }

                fn from_value(value: &Value) -> Result<Self> {
                    match value {
                        Value::Null => Ok(0),
                        Value::Bool(b) => Ok(<$t>::from(*b)),
                        _ => value
                            .as_i64()
                            .and_then(|v| <$t>::try_from(v).ok())
                            .ok_or_else(|| mismatch(value, stringify!($t))),
                    }
                }
            }
        )+
    };
}

impl_integer_field!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Integer;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            _ => value
                .as_i64()
                .map(|v| v != 0)
                .ok_or_else(|| mismatch(value, "bool")),
        }
    }
}

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Real;

    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(0.0),
            _ => value.as_f64().ok_or_else(|| mismatch(value, "f64")),
        }
    }
}

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Real;

    fn to_value(&self) -> Value {
        Value::from(f64::from(*self))
    }

    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

/// Empty strings are bound as `NULL`, so a `NOT NULL` text column rejects them.
impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        if self.is_empty() {
            Value::Null
        } else {
            Value::String(self.clone())
        }
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(mismatch(value, "String")),
        }
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const KIND: ValueKind = V::KIND;

    fn to_value(&self) -> Value {
        self.as_ref().map(V::to_value).unwrap_or(Value::Null)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            _ => V::from_value(value).map(Some),
        }
    }
}

/// Fixed-size, NUL-padded text stored in a `CHAR(N)` column.
///
/// Marshaled through a text round-trip: the bytes up to the first NUL are
/// bound as a string and a fetched string is copied back, truncated to `N`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedText<const N: usize>([u8; N]);

impl<const N: usize> FixedText<N> {
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(N);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let mut bytes = [0u8; N];
        bytes[..end].copy_from_slice(&text.as_bytes()[..end]);
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(N);
        match std::str::from_utf8(&self.0[..end]) {
            Ok(s) => s,
            Err(e) => std::str::from_utf8(&self.0[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for FixedText<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> From<&str> for FixedText<N> {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl<const N: usize> fmt::Debug for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedText<{}>({:?})", N, self.as_str())
    }
}

impl<const N: usize> fmt::Display for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> FieldValue for FixedText<N> {
    const KIND: ValueKind = ValueKind::FixedText(N);

    fn to_value(&self) -> Value {
        Value::String(self.as_str().to_string())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(s) => Ok(Self::new(s)),
            _ => Err(mismatch(value, "FixedText")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_kinds() {
        assert_eq!(<i32 as FieldValue>::KIND, ValueKind::Integer);
        assert_eq!(<u8 as FieldValue>::KIND, ValueKind::Integer);
        assert_eq!(<bool as FieldValue>::KIND, ValueKind::Integer);
        assert_eq!(<i64 as FieldValue>::KIND, ValueKind::Integer);
    }

    #[test]
    fn test_real_and_text_kinds() {
        assert_eq!(<f32 as FieldValue>::KIND, ValueKind::Real);
        assert_eq!(<f64 as FieldValue>::KIND, ValueKind::Real);
        assert_eq!(<String as FieldValue>::KIND, ValueKind::Text);
        assert_eq!(<FixedText<256> as FieldValue>::KIND, ValueKind::FixedText(256));
        assert_eq!(<Option<String> as FieldValue>::KIND, ValueKind::Text);
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = u8::from_value(&Value::from(300)).unwrap_err();
        assert!(matches!(err, QueryError::TypeMapping(_)));
        assert_eq!(i32::from_value(&Value::Null).unwrap(), 0);
    }

    #[test]
    fn test_empty_string_binds_null() {
        assert_eq!(String::new().to_value(), Value::Null);
        assert_eq!("x".to_string().to_value(), Value::String("x".to_string()));
        assert_eq!(String::from_value(&Value::Null).unwrap(), "");
    }

    #[test]
    fn test_fixed_text_truncates() {
        let text = FixedText::<6>::new("ABCDEFGH");
        assert_eq!(text.as_str(), "ABCDEF");

        let short = FixedText::<6>::new("ABCDE");
        assert_eq!(short.as_str(), "ABCDE");
        assert_eq!(short.as_bytes()[5], 0);
        assert_eq!(FixedText::<6>::from_value(&short.to_value()).unwrap(), short);
    }

    #[test]
    fn test_fixed_text_keeps_char_boundary() {
        // 'é' is two bytes; a 2-byte buffer cannot hold "aé"
        let text = FixedText::<2>::new("aé");
        assert_eq!(text.as_str(), "a");
    }

    #[test]
    fn test_option_null() {
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(&Value::from(7)).unwrap(), Some(7));
        assert_eq!(Some(3i64).to_value(), Value::from(3));
    }
}
