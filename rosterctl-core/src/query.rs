//! Query descriptors and bound values.
//!
//! A [`Query`] pairs a `&'static str` statement with positional values. The
//! text can only come from a literal, so runtime string building never
//! reaches the executor; everything variable travels as a [`Value`] bound to
//! `$1, $2, ...`.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::QueryError;

/// A typed, nullable value bound to (or read from) a statement.
///
/// Each variant carries an `Option` so a NULL still has a store type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(Option<bool>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Double(Option<f64>),
    Text(Option<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Bool(v) => v.is_none(),
            Value::Int(v) => v.is_none(),
            Value::BigInt(v) => v.is_none(),
            Value::Double(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
        }
    }

    /// Integer content, widening `Int` to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => v.map(i64::from),
            Value::BigInt(v) => *v,
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => *v,
            Value::BigInt(v) => v.and_then(|v| i32::try_from(v).ok()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => *v,
            Value::Int(v) => v.map(f64::from),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => v.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(Some(v)) => write!(f, "{v}"),
            Value::Int(Some(v)) => write!(f, "{v}"),
            Value::BigInt(Some(v)) => write!(f, "{v}"),
            Value::Double(Some(v)) => write!(f, "{v}"),
            Value::Text(Some(v)) => f.write_str(v),
            _ => f.write_str("NULL"),
        }
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(Some(v.into()))
            }
        }

        impl From<Option<$ty>> for Value {
            fn from(v: Option<$ty>) -> Self {
                Value::$variant(v.map(Into::into))
            }
        }
    };
}

impl_from_value!(bool, Bool);
impl_from_value!(i32, Int);
impl_from_value!(i64, BigInt);
impl_from_value!(f64, Double);
impl_from_value!(String, Text);
impl_from_value!(&str, Text);

/// A parameterized statement: optional cache name, static text, bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    name: Option<&'static str>,
    text: &'static str,
    values: Vec<Value>,
}

impl Query {
    pub fn new(text: &'static str) -> Self {
        Self {
            name: None,
            text,
            values: Vec::new(),
        }
    }

    /// Route this statement through the session's prepared statement cache.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Bind the next positional value.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Check that placeholders `$1..$n` match the bound values one to one.
    pub fn validate(&self) -> Result<(), QueryError> {
        let indices = placeholder_indices(self.text);
        let expected = indices.iter().next_back().copied().unwrap_or(0);
        let actual = self.values.len();

        if expected != actual || indices.len() != expected {
            return Err(QueryError::ParameterMismatch { expected, actual });
        }
        Ok(())
    }
}

/// Collect the `$N` placeholder indices in `text`, skipping string literals,
/// quoted identifiers and `--` comments.
pub(crate) fn placeholder_indices(text: &str) -> BTreeSet<usize> {
    let bytes = text.as_bytes();
    let mut indices = BTreeSet::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'$' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end > start {
                    if let Ok(n) = text[start..end].parse::<usize>() {
                        indices.insert(n);
                    }
                }
                i = end.max(i + 1);
            }
            _ => i += 1,
        }
    }

    indices
}
