//! Dynamically typed property values
//!
//! Typed accessors are the primary API. `Value` backs the name-based property
//! access used by front-ends, where the type of an incoming value is only
//! known at run time and must be checked before anything is sent.

use std::fmt;

use crate::error::ValidationError;
use crate::firmware::FirmwareVersion;
use crate::quantity::{Quantity, Unit};

/// A property value of any supported type
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating-point number
    Float(f64),
    /// Number with a unit
    Quantity(Quantity),
    /// Free text, also used for enumerated choices
    Text(String),
    /// Firmware version
    Version(FirmwareVersion),
}

impl Value {
    /// Parse a literal typed by a user
    ///
    /// `true`/`false` become booleans, numbers become integers or floats,
    /// a number followed by a unit becomes a quantity, anything else is text.
    pub fn parse_literal(s: &str) -> Value {
        let s = s.trim();
        match s {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
        match s.parse::<Quantity>() {
            Ok(q) => Value::Quantity(q),
            Err(_) => Value::Text(s.to_string()),
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Quantity(_) => "quantity",
            Value::Text(_) => "text",
            Value::Version(_) => "version",
        }
    }

    /// Require a boolean; any other type is a type error
    pub fn as_bool(&self, field: &'static str) -> Result<bool, ValidationError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.wrong_type(field, "a boolean")),
        }
    }

    /// Require a number, attaching `unit` to bare numbers
    pub fn as_quantity(&self, field: &'static str, unit: Unit) -> Result<Quantity, ValidationError> {
        match self {
            Value::Quantity(q) => Ok(*q),
            Value::Int(i) => Ok(Quantity::new(*i as f64, unit)),
            Value::Float(f) => Ok(Quantity::new(*f, unit)),
            other => Err(other.wrong_type(field, "a number or quantity")),
        }
    }

    /// Text form used when matching against enumerated choices
    pub fn as_choice(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn wrong_type(&self, field: &'static str, expected: &'static str) -> ValidationError {
        ValidationError::WrongType {
            field,
            expected,
            got: format!("{} {}", self.type_name(), self),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Quantity(q) => write!(f, "{q}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Version(v) => write!(f, "{v}"),
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

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Value::Quantity(q)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
