//! Typed values for descriptor attributes and peer properties.

use crate::color::Color;
use core::fmt;

/// An attribute or property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Color(Color),
    /// A symbolic value out of a closed set (e.g. an alignment).
    Enum(String),
}

/// The kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Text,
    Int,
    Float,
    Bool,
    Color,
    Enum,
}

/// A value could not be read as another kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot read {input:?} as {kind:?}")]
pub struct CoerceError {
    pub kind: ValueKind,
    pub input: String,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Text(_) => ValueKind::Text,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Color(_) => ValueKind::Color,
            Value::Enum(_) => ValueKind::Enum,
        }
    }

    /// Returns the string content of text and enum values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Consumes the value, returning its markup text.
    pub fn into_string(self) -> String {
        match self {
            Value::Text(s) | Value::Enum(s) => s,
            other => other.to_string(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Parses markup text as a value of the given kind.
    pub fn parse(kind: ValueKind, input: &str) -> Result<Value, CoerceError> {
        let fail = || CoerceError {
            kind,
            input: input.to_string(),
        };
        Ok(match kind {
            ValueKind::Text => Value::Text(input.to_string()),
            ValueKind::Enum => Value::Enum(input.to_string()),
            ValueKind::Int => Value::Int(input.trim().parse().map_err(|_| fail())?),
            ValueKind::Float => Value::Float(input.trim().parse().map_err(|_| fail())?),
            ValueKind::Bool => match input.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(fail()),
            },
            ValueKind::Color => Value::Color(Color::from_hex(input.trim()).ok_or_else(fail)?),
        })
    }

    /// Converts this value to another kind.
    ///
    /// Conversions go through the markup representation, except for lossless numeric widening.
    pub fn coerce(self, kind: ValueKind) -> Result<Value, CoerceError> {
        if self.kind() == kind {
            return Ok(self);
        }
        match (self, kind) {
            (Value::Int(i), ValueKind::Float) => Ok(Value::Float(i as f64)),
            (Value::Float(f), ValueKind::Int) if f.fract() == 0. => Ok(Value::Int(f as i64)),
            (value, kind) => Value::parse(kind, &value.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Text(s) | Value::Enum(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Color(c) => write!(f, "{}", c),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Value {
        Value::Color(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_through_markup() {
        assert_eq!(Value::Int(42).coerce(ValueKind::Text), Ok(Value::text("42")));
        assert_eq!(Value::text(" 42").coerce(ValueKind::Int), Ok(Value::Int(42)));
        assert_eq!(Value::Bool(true).coerce(ValueKind::Text), Ok(Value::text("true")));
        assert_eq!(Value::Enum("left".into()).coerce(ValueKind::Text), Ok(Value::text("left")));
        assert_eq!(Value::Int(3).coerce(ValueKind::Float), Ok(Value::Float(3.)));
        assert!(Value::text("abc").coerce(ValueKind::Int).is_err());
        assert!(Value::text("yes").coerce(ValueKind::Bool).is_err());
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(
            Value::parse(ValueKind::Color, "#ffffff"),
            Ok(Value::Color(Color::WHITE))
        );
        let err = Value::parse(ValueKind::Color, "white").unwrap_err();
        assert_eq!(err.kind, ValueKind::Color);
    }
}
