//! Firmware version reported by an instrument
//!
//! Instruments report versions as `1.2.3`, `v2.10` or just `v1`. Missing
//! components are zero, and every component is a plain integer, so `v2.001`
//! is `2.1.0` and sorts below `v2.10` (`2.10.0`).

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A `(major, minor, patch)` firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl FirmwareVersion {
    /// Create a version from its components
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version reply such as `"1.2.3"` or `"v2.10"`
    pub fn parse(reply: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidVersion(reply.trim().to_string());

        let trimmed = reply.trim();
        let cleaned = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if cleaned.is_empty() {
            return Err(invalid());
        }

        let mut parts = [0u32; 3];
        let mut count = 0;
        for component in cleaned.split('.') {
            if count == parts.len() {
                return Err(invalid());
            }
            parts[count] = component.parse::<u32>().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Returns the version as a tuple
    pub fn as_tuple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl From<(u32, u32, u32)> for FirmwareVersion {
    fn from((major, minor, patch): (u32, u32, u32)) -> Self {
        Self::new(major, minor, patch)
    }
}

impl FromStr for FirmwareVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        assert_eq!(FirmwareVersion::parse("1.2.3").unwrap().as_tuple(), (1, 2, 3));
    }

    #[test]
    fn test_parse_major_only() {
        assert_eq!(FirmwareVersion::parse("v1").unwrap().as_tuple(), (1, 0, 0));
    }

    #[test]
    fn test_parse_leading_zeros() {
        assert_eq!(FirmwareVersion::parse("v2.001").unwrap().as_tuple(), (2, 1, 0));
        assert_eq!(FirmwareVersion::parse("v2.010").unwrap().as_tuple(), (2, 10, 0));
        assert_eq!(FirmwareVersion::parse("v2.10\r").unwrap().as_tuple(), (2, 10, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(FirmwareVersion::parse("").is_err());
        assert!(FirmwareVersion::parse("v").is_err());
        assert!(FirmwareVersion::parse("Unknown command").is_err());
        assert!(FirmwareVersion::parse("1.2.3.4").is_err());
        assert!(FirmwareVersion::parse("1..2").is_err());
    }

    #[test]
    fn test_parse_only_strips_leading_v() {
        assert!(FirmwareVersion::parse("2v.1v0").is_err());
        assert!(FirmwareVersion::parse("vv2").is_err());
        assert_eq!(FirmwareVersion::parse(" v3.1 ").unwrap().as_tuple(), (3, 1, 0));
    }

    #[test]
    fn test_ordering() {
        let old: FirmwareVersion = "v2.001".parse().unwrap();
        let new: FirmwareVersion = "v2.10".parse().unwrap();
        assert!(old < new);
        assert!(FirmwareVersion::new(3, 0, 0) > new);
    }

    #[test]
    fn test_display() {
        assert_eq!(FirmwareVersion::new(2, 10, 0).to_string(), "2.10.0");
    }
}
