//! Connection strings and the communicator factory
//!
//! # Format
//!
//! - `vxi11://<host>[/<name>]` - VXI-11 device, name defaults to `inst0`
//! - `serial://<port>[@<baud>]` - serial port, baud defaults to 115200
//! - `tcp://<host>:<port>` - raw TCP socket

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CommError;
use crate::serial::{SerialCommunicator, DEFAULT_BAUD_RATE};
use crate::socket::SocketCommunicator;
use crate::vxi11::{Vxi11Communicator, Vxi11Options, DEFAULT_DEVICE_NAME};
use crate::Communicator;

/// Where and how to reach an instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ConnectionSpec {
    /// VXI-11 over the network
    Vxi11 { host: String, name: String },
    /// Serial port
    Serial { port: String, baud_rate: u32 },
    /// Raw TCP socket
    Tcp { host: String, port: u16 },
}

impl FromStr for ConnectionSpec {
    type Err = CommError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CommError::InvalidAddress(s.to_string());
        let (scheme, rest) = s.trim().split_once("://").ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }

        match scheme.to_ascii_lowercase().as_str() {
            "vxi11" => {
                let (host, name) = match rest.split_once('/') {
                    Some((host, name)) if !name.is_empty() => (host, name),
                    Some((host, _)) => (host, DEFAULT_DEVICE_NAME),
                    None => (rest, DEFAULT_DEVICE_NAME),
                };
                if host.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::Vxi11 {
                    host: host.to_string(),
                    name: name.to_string(),
                })
            }
            "serial" => {
                let (port, baud_rate) = match rest.rsplit_once('@') {
                    Some((port, baud)) => (port, baud.parse().map_err(|_| invalid())?),
                    None => (rest, DEFAULT_BAUD_RATE),
                };
                Ok(Self::Serial {
                    port: port.to_string(),
                    baud_rate,
                })
            }
            "tcp" => {
                let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
                let port = port.parse().map_err(|_| invalid())?;
                if host.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vxi11 { host, name } => write!(f, "vxi11://{host}/{name}"),
            Self::Serial { port, baud_rate } => write!(f, "serial://{port}@{baud_rate}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

/// Open a communicator for `spec`
///
/// `timeout` overrides the transport's default read timeout. Transports not
/// compiled into this build fail with [`CommError::MissingDependency`].
pub fn open(spec: &ConnectionSpec, timeout: Option<Duration>) -> Result<Box<dyn Communicator>, CommError> {
    debug!("Opening {}", spec);
    let mut comm: Box<dyn Communicator> = match spec {
        ConnectionSpec::Vxi11 { host, name } => {
            let mut options = Vxi11Options::new(host.as_str(), name.as_str());
            if let Some(t) = timeout {
                options.timeout = t;
            }
            Box::new(Vxi11Communicator::open_with(options)?)
        }
        ConnectionSpec::Serial { port, baud_rate } => {
            Box::new(SerialCommunicator::open(port, *baud_rate)?)
        }
        ConnectionSpec::Tcp { host, port } => Box::new(SocketCommunicator::open(host, *port)?),
    };
    if let Some(t) = timeout {
        comm.set_timeout(t)?;
    }
    Ok(comm)
}
