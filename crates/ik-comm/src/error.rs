//! Error types for instrument communicators

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to an instrument
#[derive(Debug, Error)]
pub enum CommError {
    /// Transport support was not compiled in
    #[error("{transport} support is not available (build with the `{feature}` feature)")]
    MissingDependency {
        transport: &'static str,
        feature: &'static str,
    },

    /// Failed to open the transport
    #[error("failed to open {address}: {reason}")]
    Open { address: String, reason: String },

    /// No complete reply within the timeout
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Communicator was closed
    #[error("communicator is closed")]
    Closed,

    /// Operation not offered by this transport
    #[error("{operation} is not supported by this communicator")]
    NotSupported { operation: &'static str },

    /// Status error reported by the VISA library
    #[error("VISA error: {0}")]
    Visa(String),

    /// Connection string could not be parsed
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl CommError {
    /// Map an I/O error, turning read timeouts into [`CommError::Timeout`]
    pub fn from_io(err: std::io::Error, timeout: Duration) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                CommError::Timeout(timeout)
            }
            _ => CommError::Io(err),
        }
    }

    /// Returns true if the transport is simply not compiled in
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, CommError::MissingDependency { .. })
    }

    /// Returns true if the error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommError::Timeout(_))
    }
}
