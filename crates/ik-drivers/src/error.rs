//! Error types for instrument drivers

use ik_comm::CommError;
use ik_protocol::{ParseError, ValidationError};
use thiserror::Error;

/// Errors that can occur while driving an instrument
#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport failure
    #[error("communication error: {0}")]
    Comm(#[from] CommError),

    /// Instrument reply could not be interpreted
    #[error("protocol error: {0}")]
    Parse(#[from] ParseError),

    /// Value rejected before anything was sent
    #[error("invalid value: {0}")]
    Validation(#[from] ValidationError),
}

impl DriverError {
    /// Returns true if a value of the wrong type was supplied
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::Validation(e) if e.is_type_error())
    }

    /// Returns true if a value of the right type was out of bounds or not
    /// one of the allowed choices
    pub fn is_value_error(&self) -> bool {
        matches!(self, Self::Validation(e) if !e.is_type_error())
    }

    /// Returns true if the instrument did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Comm(e) if e.is_timeout())
    }
}
