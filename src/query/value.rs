//! Runtime values and composite row identities.

use std::fmt;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};

/// Runtime value flowing out of (and bound into) rendered statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value; text holding an integer also converts.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn from_sql(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Int(v),
            ValueRef::Real(v) => Value::Float(v),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Nulls render as empty text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Int(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// One component of a [`RowKey`].
///
/// Floats are compared by bit pattern so keys stay totally ordered and hashable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    /// NULL component.
    Null,
    /// Integer component.
    Int(i64),
    /// Float component, stored as raw bits.
    Float(u64),
    /// Text component.
    Text(String),
    /// Binary component.
    Bytes(Vec<u8>),
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Null,
            Value::Int(v) => KeyPart::Int(*v),
            Value::Float(v) => KeyPart::Float(v.to_bits()),
            Value::Text(s) => KeyPart::Text(s.clone()),
            Value::Bytes(b) => KeyPart::Bytes(b.clone()),
        }
    }
}

impl From<&KeyPart> for Value {
    fn from(part: &KeyPart) -> Self {
        match part {
            KeyPart::Null => Value::Null,
            KeyPart::Int(v) => Value::Int(*v),
            KeyPart::Float(bits) => Value::Float(f64::from_bits(*bits)),
            KeyPart::Text(s) => Value::Text(s.clone()),
            KeyPart::Bytes(b) => Value::Bytes(b.clone()),
        }
    }
}

/// Composite row identity: one typed part per identity column of a plan.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey(pub Vec<KeyPart>);

impl RowKey {
    /// Builds a key from identity values.
    pub fn from_values(values: &[Value]) -> Self {
        RowKey(values.iter().map(KeyPart::from).collect())
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no parts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every key obtained by nulling out any subset of this key's non-null parts.
    ///
    /// The key itself is included.
    pub fn null_reductions(&self) -> Vec<RowKey> {
        let mut out = vec![Vec::with_capacity(self.0.len())];
        for part in &self.0 {
            let mut next = Vec::with_capacity(out.len() * 2);
            for prefix in out {
                if *part != KeyPart::Null {
                    let mut with_null = prefix.clone();
                    with_null.push(KeyPart::Null);
                    next.push(with_null);
                }
                let mut with_value = prefix;
                with_value.push(part.clone());
                next.push(with_value);
            }
            out = next;
        }
        out.into_iter().map(RowKey).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_do_not_coerce_types() {
        let a = RowKey::from_values(&[Value::Int(12), Value::Null]);
        let b = RowKey::from_values(&[Value::Text("12".into()), Value::Null]);
        assert_ne!(a, b);
        let c = RowKey::from_values(&[Value::Int(1), Value::Int(2)]);
        let d = RowKey::from_values(&[Value::Int(12), Value::Null]);
        assert_ne!(c, d);
    }

    #[test]
    fn null_reductions_enumerate_subsets() {
        let key = RowKey::from_values(&[Value::Int(1), Value::Null, Value::Int(3)]);
        let reductions = key.null_reductions();
        assert_eq!(reductions.len(), 4);
        assert!(reductions.contains(&key));
        assert!(reductions.contains(&RowKey(vec![KeyPart::Null; 3])));
    }

    #[test]
    fn display_renders_null_as_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(Value::from(Some("x")).to_string(), "x");
    }
}
