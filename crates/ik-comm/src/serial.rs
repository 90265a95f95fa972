//! Serial port communicator
//!
//! Backed by the `serialport` crate when the `serial` feature is enabled.
//! Without it, [`SerialCommunicator::open`] reports a missing dependency.

use std::time::Duration;

/// Default baud rate for instrument serial links
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout for serial links
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[cfg(feature = "serial")]
pub use imp::SerialCommunicator;

#[cfg(not(feature = "serial"))]
pub use stub::SerialCommunicator;

#[cfg(feature = "serial")]
mod imp {
    use std::io::Write;
    use std::time::Duration;

    use serialport::SerialPort;
    use tracing::{info, trace, warn};

    use super::DEFAULT_TIMEOUT;
    use crate::error::CommError;
    use crate::line::read_message;
    use crate::{Address, Communicator};

    /// Communicator over a serial port
    pub struct SerialCommunicator {
        port_name: String,
        baud_rate: u32,
        port: Option<Box<dyn SerialPort>>,
        terminator: String,
        timeout: Duration,
    }

    impl SerialCommunicator {
        /// Open `port` at `baud_rate`, 8N1
        pub fn open(port: &str, baud_rate: u32) -> Result<Self, CommError> {
            let handle = serialport::new(port, baud_rate)
                .timeout(DEFAULT_TIMEOUT)
                .open()
                .map_err(|e| CommError::Open {
                    address: port.to_string(),
                    reason: e.to_string(),
                })?;
            info!("Opened serial port {} at {} baud", port, baud_rate);
            Ok(Self {
                port_name: port.to_string(),
                baud_rate,
                port: Some(handle),
                terminator: "\n".to_string(),
                timeout: DEFAULT_TIMEOUT,
            })
        }

        fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, CommError> {
            self.port.as_mut().ok_or(CommError::Closed)
        }
    }

    impl Communicator for SerialCommunicator {
        fn address(&self) -> Address {
            Address::Serial {
                port: self.port_name.clone(),
                baud_rate: self.baud_rate,
            }
        }

        fn terminator(&self) -> &str {
            &self.terminator
        }

        fn set_terminator(&mut self, terminator: &str) {
            self.terminator = terminator.to_string();
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn set_timeout(&mut self, timeout: Duration) -> Result<(), CommError> {
            self.port()?.set_timeout(timeout)?;
            self.timeout = timeout;
            Ok(())
        }

        fn read(&mut self, size: Option<usize>) -> Result<String, CommError> {
            let terminator = self.terminator.clone();
            let timeout = self.timeout;
            read_message(self.port()?, &terminator, size, timeout)
        }

        fn write(&mut self, msg: &str) -> Result<(), CommError> {
            trace!(">> {:?}", msg);
            self.port()?.write_all(msg.as_bytes())?;
            Ok(())
        }

        fn close(&mut self) {
            if let Some(mut port) = self.port.take() {
                if let Err(e) = port.flush() {
                    warn!("Error flushing {} on close: {}", self.port_name, e);
                }
                info!("Closed serial port {}", self.port_name);
            }
        }

        fn is_closed(&self) -> bool {
            self.port.is_none()
        }
    }

    impl Drop for SerialCommunicator {
        fn drop(&mut self) {
            self.close();
        }
    }
}

#[cfg(not(feature = "serial"))]
mod stub {
    use std::convert::Infallible;
    use std::time::Duration;

    use crate::error::CommError;
    use crate::{Address, Communicator};

    /// Serial communicator placeholder; this build has no serial support
    pub struct SerialCommunicator {
        never: Infallible,
    }

    impl SerialCommunicator {
        /// Always fails with [`CommError::MissingDependency`]
        pub fn open(_port: &str, _baud_rate: u32) -> Result<Self, CommError> {
            Err(CommError::MissingDependency {
                transport: "serial",
                feature: "serial",
            })
        }
    }

    impl Communicator for SerialCommunicator {
        fn address(&self) -> Address {
            match self.never {}
        }

        fn terminator(&self) -> &str {
            match self.never {}
        }

        fn set_terminator(&mut self, _terminator: &str) {
            match self.never {}
        }

        fn timeout(&self) -> Duration {
            match self.never {}
        }

        fn set_timeout(&mut self, _timeout: Duration) -> Result<(), CommError> {
            match self.never {}
        }

        fn read(&mut self, _size: Option<usize>) -> Result<String, CommError> {
            match self.never {}
        }

        fn write(&mut self, _msg: &str) -> Result<(), CommError> {
            match self.never {}
        }

        fn close(&mut self) {
            match self.never {}
        }

        fn is_closed(&self) -> bool {
            match self.never {}
        }
    }
}
