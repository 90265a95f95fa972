//! Instrument Communicator Library
//!
//! This crate wraps the transports laboratory instruments are reached over
//! behind one synchronous request/response contract, [`Communicator`]:
//!
//! - **VXI-11**: LAN instruments through the system VISA library (feature `vxi11`)
//! - **Serial**: RS-232 and USB-serial adapters (feature `serial`)
//! - **Socket**: raw TCP, e.g. Ethernet-to-serial bridges
//!
//! Transports that are not compiled in still exist as types; opening them
//! fails with [`CommError::MissingDependency`] so callers can fall back to
//! another transport.
//!
//! # Example
//!
//! ```rust,no_run
//! use ik_comm::{open, Communicator, ConnectionSpec};
//!
//! let spec: ConnectionSpec = "vxi11://192.168.0.20/inst0".parse().unwrap();
//! let mut comm = open(&spec, None).unwrap();
//! let idn = comm.query("*IDN?", None).unwrap();
//! println!("{idn}");
//! comm.close();
//! ```

pub mod connection;
pub mod error;
mod line;
pub mod scanner;
pub mod serial;
pub mod socket;
pub mod vxi11;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use connection::{open, ConnectionSpec};
pub use error::CommError;
pub use line::read_message;
pub use scanner::{PortScanner, SerialPortInfo};
pub use serial::SerialCommunicator;
pub use socket::SocketCommunicator;
pub use vxi11::{Vxi11Communicator, Vxi11Options};

/// Endpoint identity of a communicator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// VXI-11 host and device name (e.g. `inst0`, `gpib0,5`)
    Vxi11 { host: String, name: String },
    /// Serial port and baud rate
    Serial { port: String, baud_rate: u32 },
    /// TCP host and port
    Socket { host: String, port: u16 },
    /// In-process endpoint (simulators, test harnesses)
    Loopback(String),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Vxi11 { host, name } => write!(f, "TCPIP::{host}::{name}::INSTR"),
            Address::Serial { port, baud_rate } => write!(f, "ASRL::{port}::{baud_rate}"),
            Address::Socket { host, port } => write!(f, "TCPIP::{host}::{port}::SOCKET"),
            Address::Loopback(name) => write!(f, "LOOPBACK::{name}"),
        }
    }
}

/// Synchronous request/response access to one instrument link
///
/// Every I/O method takes `&mut self`, so a communicator carries at most one
/// transaction at a time. Sharing one between threads needs an outer lock.
pub trait Communicator: Send {
    /// Endpoint this communicator talks to
    fn address(&self) -> Address;

    /// Character sequence that ends a message
    fn terminator(&self) -> &str;

    /// Change the message terminator
    fn set_terminator(&mut self, terminator: &str);

    /// Timeout applied to subsequent reads
    fn timeout(&self) -> Duration;

    /// Change the read timeout
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), CommError>;

    /// Read from the instrument
    ///
    /// `Some(n)` reads up to `n` bytes. `None` reads one message up to the
    /// terminator, which is stripped from the result.
    fn read(&mut self, size: Option<usize>) -> Result<String, CommError>;

    /// Write raw text; no terminator is appended
    fn write(&mut self, msg: &str) -> Result<(), CommError>;

    /// Send one command line (message plus terminator)
    fn sendcmd(&mut self, msg: &str) -> Result<(), CommError> {
        let line = format!("{msg}{}", self.terminator());
        self.write(&line)
    }

    /// Send a command and read its reply
    fn query(&mut self, msg: &str, size: Option<usize>) -> Result<String, CommError> {
        self.sendcmd(msg)?;
        self.read(size)
    }

    /// Release the transport. Never fails; errors during teardown are logged
    /// and dropped. Calling it twice is harmless.
    fn close(&mut self);

    /// Returns true once [`Communicator::close`] has run
    fn is_closed(&self) -> bool;

    /// Random access is not offered by instrument links
    fn seek(&mut self, _offset: u64) -> Result<u64, CommError> {
        Err(CommError::NotSupported { operation: "seek" })
    }

    /// Random access is not offered by instrument links
    fn tell(&mut self) -> Result<u64, CommError> {
        Err(CommError::NotSupported { operation: "tell" })
    }

    /// Instrument links deliver each write immediately
    fn flush(&mut self) -> Result<(), CommError> {
        Err(CommError::NotSupported { operation: "flush" })
    }
}

macro_rules! forward_communicator {
    ($ty:ty) => {
        impl<T: Communicator + ?Sized> Communicator for $ty {
            fn address(&self) -> Address {
                (**self).address()
            }

            fn terminator(&self) -> &str {
                (**self).terminator()
            }

            fn set_terminator(&mut self, terminator: &str) {
                (**self).set_terminator(terminator)
            }

            fn timeout(&self) -> Duration {
                (**self).timeout()
            }

            fn set_timeout(&mut self, timeout: Duration) -> Result<(), CommError> {
                (**self).set_timeout(timeout)
            }

            fn read(&mut self, size: Option<usize>) -> Result<String, CommError> {
                (**self).read(size)
            }

            fn write(&mut self, msg: &str) -> Result<(), CommError> {
                (**self).write(msg)
            }

            fn sendcmd(&mut self, msg: &str) -> Result<(), CommError> {
                (**self).sendcmd(msg)
            }

            fn query(&mut self, msg: &str, size: Option<usize>) -> Result<String, CommError> {
                (**self).query(msg, size)
            }

            fn close(&mut self) {
                (**self).close()
            }

            fn is_closed(&self) -> bool {
                (**self).is_closed()
            }

            fn seek(&mut self, offset: u64) -> Result<u64, CommError> {
                (**self).seek(offset)
            }

            fn tell(&mut self) -> Result<u64, CommError> {
                (**self).tell()
            }

            fn flush(&mut self) -> Result<(), CommError> {
                (**self).flush()
            }
        }
    };
}

forward_communicator!(&mut T);
forward_communicator!(Box<T>);
