//! Serial port scanner
//!
//! Lists the serial ports an instrument could be attached to, with USB
//! metadata where the platform reports it.

use serde::Serialize;
use tracing::info;

use crate::error::CommError;

/// Information about a serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Port without USB metadata
    pub fn plain(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    /// One-line description for listings
    pub fn describe(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!(
                "{} [{:04x}:{:04x}] {}",
                self.port,
                vid,
                pid,
                self.product.as_deref().unwrap_or("Unknown")
            ),
            _ => self.port.clone(),
        }
    }

    #[cfg(feature = "serial")]
    fn from_serialport(name: String, port_type: &serialport::SerialPortType) -> Self {
        match port_type {
            serialport::SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self::plain(name),
        }
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains one of these patterns
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // Bluetooth ports on macOS
                    "Bluetooth".to_string(),
                    "debug".to_string(),
                ],
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    #[cfg(feature = "serial")]
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, CommError> {
        info!("Enumerating serial ports...");
        let ports = serialport::available_ports()
            .map_err(|e| CommError::EnumerationFailed(e.to_string()))?;

        let result = self.filter(
            ports
                .into_iter()
                .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type)),
        );

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
        }
        Ok(result)
    }

    /// Serial support is not compiled in
    #[cfg(not(feature = "serial"))]
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, CommError> {
        info!("Serial port enumeration unavailable in this build");
        Err(CommError::MissingDependency {
            transport: "serial",
            feature: "serial",
        })
    }

    #[cfg_attr(not(feature = "serial"), allow(dead_code))]
    fn filter(&self, ports: impl IntoIterator<Item = SerialPortInfo>) -> Vec<SerialPortInfo> {
        ports
            .into_iter()
            .filter(|p| !self.should_skip_port(p))
            .collect()
    }

    #[cfg_attr(not(feature = "serial"), allow(dead_code))]
    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
