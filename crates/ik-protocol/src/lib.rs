//! Instrument Protocol Library
//!
//! This crate provides the wire vocabulary for laboratory instruments that
//! speak line-oriented ASCII protocols:
//!
//! - **Qubitekk CC1**: SCPI-like mnemonics (`WIND?`, `:WIND 7`) with two
//!   firmware-dependent dialects for switches and trigger mode
//! - **Toptica TopMode**: Scheme-like control language
//!   (`(param-ref 'laser1:wavelength)`)
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O. Each instrument module provides:
//! - A command enum that encodes to the exact wire text (without terminator)
//! - Strict reply parsers that reject anything the firmware would not send
//! - Pure validation of outgoing values, so a rejected value never reaches
//!   the transport
//!
//! # Example
//!
//! ```rust
//! use ik_protocol::qubitekk::{Cc1Command, Cc1Dialect, TriggerMode};
//! use ik_protocol::FirmwareVersion;
//!
//! let firmware: FirmwareVersion = "v2.10".parse().unwrap();
//! let dialect = Cc1Dialect::for_firmware(firmware);
//!
//! assert_eq!(dialect, Cc1Dialect::Modern);
//! assert_eq!(
//!     dialect.encode(&Cc1Command::Trigger(Some(TriggerMode::StartStop))),
//!     ":TRIG:MODE STOP"
//! );
//! ```

pub mod error;
pub mod firmware;
pub mod limits;
pub mod quantity;
pub mod qubitekk;
pub mod toptica;
pub mod value;

pub use error::{ParseError, ValidationError};
pub use firmware::FirmwareVersion;
pub use limits::{Cc1Limits, RangeSpec};
pub use quantity::{Quantity, Unit};
pub use value::Value;

/// Trait for commands that render to a single wire line
pub trait EncodeCommand {
    /// Encode this command to its wire text, without the terminator
    fn encode(&self) -> String;
}

/// Parse an integer reply, trimming surrounding whitespace
pub fn parse_integer(field: &'static str, reply: &str) -> Result<i64, ParseError> {
    let trimmed = reply.trim();
    trimmed.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
        field,
        reply: trimmed.to_string(),
    })
}

/// Parse a floating-point reply, trimming surrounding whitespace
pub fn parse_float(field: &'static str, reply: &str) -> Result<f64, ParseError> {
    let trimmed = reply.trim();
    trimmed.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        field,
        reply: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_trims() {
        assert_eq!(parse_integer("window", " 7\r").unwrap(), 7);
        assert_eq!(parse_integer("window", "-3").unwrap(), -3);
    }

    #[test]
    fn test_parse_integer_rejects_garbage() {
        let err = parse_integer("window", "7ns").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                field: "window",
                reply: "7ns".into()
            }
        );
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("wavelength", "780.24").unwrap(), 780.24);
        assert!(parse_float("wavelength", "#f").is_err());
    }
}
