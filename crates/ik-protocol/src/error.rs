//! Error types for instrument reply parsing and value validation

use thiserror::Error;

use crate::limits::RangeSpec;
use crate::quantity::Unit;

/// Errors that can occur while parsing an instrument reply
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Reply is not a number of the expected type
    #[error("invalid numeric reply for {field}: {reply:?}")]
    InvalidNumber { field: &'static str, reply: String },

    /// Firmware version string could not be parsed
    #[error("invalid firmware version: {0:?}")]
    InvalidVersion(String),

    /// Reply does not match any literal form the instrument is known to send
    #[error("unrecognized device reply for {field}: {reply:?}")]
    UnrecognizedReply { field: &'static str, reply: String },

    /// Instrument echoed something other than the command we sent
    #[error("expected echo {expected:?}, got {actual:?}")]
    UnexpectedEcho { expected: String, actual: String },

    /// Instrument did not finish the transaction with its prompt
    #[error("expected prompt {expected:?}, got {actual:?}")]
    MissingPrompt { expected: String, actual: String },

    /// Timestamp could not be parsed
    #[error("invalid timestamp: {0:?}")]
    InvalidDate(String),
}

/// Errors raised by client-side validation, before anything is written
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Value lies outside the allowed range
    #[error("{field} value {value} is out of range {range}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        range: RangeSpec,
    },

    /// Value is not a multiple of the required step
    #[error("{field} value {value} must be a multiple of {step}")]
    NotMultiple {
        field: &'static str,
        value: i64,
        step: i64,
    },

    /// Value must be a whole number in the field's unit
    #[error("{field} value {value} is not a whole number of {unit}")]
    NotIntegral {
        field: &'static str,
        value: f64,
        unit: Unit,
    },

    /// Value has the wrong type for the field
    #[error("{field} must be {expected}, got {got}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        got: String,
    },

    /// Value is not one of the field's enumerated choices
    #[error("{value:?} is not a valid {field}")]
    InvalidEnum { field: &'static str, value: String },

    /// Quantity cannot be converted into the field's unit
    #[error("cannot convert {from} to {to}")]
    IncompatibleUnit { from: Unit, to: Unit },

    /// Sub-resource index outside the instrument's fixed set
    #[error("channel {index} out of range (instrument has {count})")]
    ChannelOutOfRange { index: usize, count: usize },

    /// Field cannot be written
    #[error("{0} is read-only")]
    ReadOnly(&'static str),

    /// Property name not known to the driver
    #[error("unknown property: {0}")]
    UnknownProperty(String),
}

impl ValidationError {
    /// Returns true if the value had the wrong type (as opposed to a bad value)
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::WrongType { .. })
    }
}
