//! VXI-11 communicator
//!
//! LAN instruments are reached through the system VISA library (NI-VISA,
//! Keysight IO Libraries) via `visa-rs`. A link is a VISA session on the
//! resource `TCPIP::<host>::<name>::INSTR`; VISA runs the VXI-11 core
//! channel underneath and asserts END on the last byte of every write.
//!
//! Compiled without the `vxi11` feature, [`Vxi11Communicator::open`] fails
//! with [`CommError::MissingDependency`].

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CommError;
use crate::Address;

#[cfg(feature = "vxi11")]
pub use imp::Vxi11Communicator;
#[cfg(not(feature = "vxi11"))]
pub use stub::Vxi11Communicator;

/// Device name used when none is given
pub const DEFAULT_DEVICE_NAME: &str = "inst0";

/// Default I/O timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for a VXI-11 link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vxi11Options {
    /// Instrument host name or IP address
    pub host: String,
    /// Logical device name
    pub name: String,
    /// I/O timeout
    pub timeout: Duration,
    /// Open the session with an exclusive lock
    pub lock_device: bool,
    /// How long `open` waits for a lock held by another session
    pub lock_timeout: Duration,
}

impl Vxi11Options {
    /// Options for `name` on `host`, everything else default
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn address(&self) -> Address {
        Address::Vxi11 {
            host: self.host.clone(),
            name: self.name.clone(),
        }
    }

    /// VISA resource string, e.g. `TCPIP::10.0.0.5::inst0::INSTR`
    pub fn resource(&self) -> String {
        self.address().to_string()
    }
}

impl Default for Vxi11Options {
    fn default() -> Self {
        Self {
            host: String::new(),
            name: DEFAULT_DEVICE_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
            lock_device: false,
            lock_timeout: Duration::ZERO,
        }
    }
}

/// Whether a VISA status text names an expired timeout (`VI_ERROR_TMO`)
#[cfg_attr(not(feature = "vxi11"), allow(dead_code))]
fn is_timeout_status(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("errortmo") || message.contains("error_tmo") || message.contains("timeout")
}

/// Give VISA timeouts the `TimedOut` kind
///
/// visa-rs reports status codes as `io::Error`s of kind `Other`, so
/// [`CommError::from_io`] would not see the timeout otherwise.
#[cfg_attr(not(feature = "vxi11"), allow(dead_code))]
fn normalize_timeout(err: io::Error) -> io::Error {
    if err.kind() != io::ErrorKind::TimedOut && is_timeout_status(&err.to_string()) {
        io::Error::new(io::ErrorKind::TimedOut, err)
    } else {
        err
    }
}

/// Millisecond value for `VI_ATTR_TMO_VALUE`, saturating
#[cfg_attr(not(feature = "vxi11"), allow(dead_code))]
fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(feature = "vxi11")]
mod imp {
    use std::ffi::CString;
    use std::io::{self, Read, Write};
    use std::time::Duration;

    use tracing::{debug, info, trace};
    use visa_rs::attribute::AttrTmoValue;
    use visa_rs::prelude::*;
    use visa_rs::VisaString;

    use super::{normalize_timeout, timeout_millis, Vxi11Options, DEFAULT_DEVICE_NAME};
    use crate::error::CommError;
    use crate::line::read_message;
    use crate::{Address, Communicator};

    /// Open VISA session
    ///
    /// Closing the default resource manager closes every session it
    /// opened, so the manager lives exactly as long as the instrument.
    /// Fields drop in order: instrument first.
    struct Session {
        instr: Instrument,
        _rm: DefaultRM,
    }

    impl Read for Session {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.instr.read(buf).map_err(normalize_timeout)
        }
    }

    impl Write for Session {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.instr.write(buf).map_err(normalize_timeout)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.instr.flush().map_err(normalize_timeout)
        }
    }

    fn set_io_timeout(instr: &Instrument, timeout: Duration) -> Result<(), CommError> {
        let value = AttrTmoValue::new_checked(timeout_millis(timeout))
            .ok_or_else(|| CommError::Visa(format!("timeout {timeout:?} out of range")))?;
        instr.set_attr(value).map_err(|e| CommError::Visa(e.to_string()))
    }

    /// Communicator for a VXI-11 instrument
    pub struct Vxi11Communicator {
        options: Vxi11Options,
        session: Option<Session>,
        terminator: String,
        timeout: Duration,
    }

    impl Vxi11Communicator {
        /// Open a link to `name` on `host` with default options
        pub fn open(host: &str, name: Option<&str>) -> Result<Self, CommError> {
            Self::open_with(Vxi11Options::new(host, name.unwrap_or(DEFAULT_DEVICE_NAME)))
        }

        /// Open a link with explicit options
        pub fn open_with(options: Vxi11Options) -> Result<Self, CommError> {
            let resource = options.resource();
            let open_error = |reason: String| CommError::Open {
                address: resource.clone(),
                reason,
            };

            let rm = DefaultRM::new().map_err(|e| open_error(format!("no VISA library: {e}")))?;
            let c_resource = CString::new(resource.as_str())
                .map_err(|_| CommError::InvalidAddress(resource.clone()))?;
            let access = if options.lock_device {
                AccessMode::EXCLUSIVE_LOCK
            } else {
                AccessMode::NO_LOCK
            };
            let instr = rm
                .open(&VisaString::from(c_resource), access, options.lock_timeout)
                .map_err(|e| open_error(e.to_string()))?;
            set_io_timeout(&instr, options.timeout)?;
            debug!(
                "VISA session on {} (lock {}, timeout {:?})",
                resource, options.lock_device, options.timeout
            );
            info!("Opened VXI-11 device {} on {}", options.name, options.host);

            Ok(Self {
                timeout: options.timeout,
                options,
                session: Some(Session { instr, _rm: rm }),
                terminator: "\n".to_string(),
            })
        }

        /// Whether the session was opened with an exclusive lock
        pub fn is_locked(&self) -> bool {
            self.session.is_some() && self.options.lock_device
        }

        fn session(&mut self) -> Result<&mut Session, CommError> {
            self.session.as_mut().ok_or(CommError::Closed)
        }
    }

    impl Communicator for Vxi11Communicator {
        fn address(&self) -> Address {
            self.options.address()
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
            set_io_timeout(&self.session()?.instr, timeout)?;
            self.timeout = timeout;
            Ok(())
        }

        fn read(&mut self, size: Option<usize>) -> Result<String, CommError> {
            let timeout = self.timeout;
            let terminator = self.terminator.clone();
            read_message(self.session()?, &terminator, size, timeout)
        }

        // One VISA write per call; VISA asserts END on its last byte.
        fn write(&mut self, msg: &str) -> Result<(), CommError> {
            trace!(">> {:?}", msg);
            let timeout = self.timeout;
            self.session()?
                .write_all(msg.as_bytes())
                .map_err(|e| CommError::from_io(e, timeout))
        }

        fn close(&mut self) {
            if self.session.take().is_some() {
                info!(
                    "Closed VXI-11 device {} on {}",
                    self.options.name, self.options.host
                );
            }
        }

        fn is_closed(&self) -> bool {
            self.session.is_none()
        }
    }

    impl Drop for Vxi11Communicator {
        fn drop(&mut self) {
            self.close();
        }
    }
}

#[cfg(not(feature = "vxi11"))]
mod stub {
    use std::convert::Infallible;
    use std::time::Duration;

    use super::Vxi11Options;
    use crate::error::CommError;
    use crate::{Address, Communicator};

    /// VXI-11 communicator placeholder; this build has no VISA support
    pub struct Vxi11Communicator {
        never: Infallible,
    }

    impl Vxi11Communicator {
        /// Always fails with [`CommError::MissingDependency`]
        pub fn open(_host: &str, _name: Option<&str>) -> Result<Self, CommError> {
            Self::open_with(Vxi11Options::default())
        }

        /// Always fails with [`CommError::MissingDependency`]
        pub fn open_with(_options: Vxi11Options) -> Result<Self, CommError> {
            Err(CommError::MissingDependency {
                transport: "VXI-11",
                feature: "vxi11",
            })
        }

        pub fn is_locked(&self) -> bool {
            match self.never {}
        }
    }

    impl Communicator for Vxi11Communicator {
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

#[cfg(all(test, not(feature = "vxi11")))]
mod stub_tests {
    use super::*;

    #[test]
    fn test_missing_dependency() {
        let err = Vxi11Communicator::open("10.0.0.5", None).err().unwrap();
        assert!(err.is_missing_dependency());
        assert_eq!(
            err.to_string(),
            "VXI-11 support is not available (build with the `vxi11` feature)"
        );
    }
}
