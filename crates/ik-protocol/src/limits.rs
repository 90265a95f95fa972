//! Client-side limits for settable instrument fields
//!
//! Bounds are data rather than code so they can be adjusted from a settings
//! file when a hardware revision documents different limits.

use std::fmt;

use crate::error::ValidationError;
use crate::quantity::{Quantity, Unit};

/// Inclusive integer range; `None` means unbounded on that side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeSpec {
    /// Smallest allowed value
    pub min: Option<i64>,
    /// Largest allowed value
    pub max: Option<i64>,
}

impl RangeSpec {
    /// Range bounded on both sides
    pub const fn between(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Range with only a lower bound
    pub const fn at_least(min: i64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Returns whether `value` lies inside the range
    pub fn contains(&self, value: i64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "[{min}, {max}]"),
            (Some(min), None) => write!(f, "[{min}, ∞)"),
            (None, Some(max)) => write!(f, "(-∞, {max}]"),
            (None, None) => f.write_str("(-∞, ∞)"),
        }
    }
}

/// Limits for the Qubitekk CC1 settable fields
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Cc1Limits {
    /// Coincidence window in nanoseconds
    pub window_ns: RangeSpec,
    /// Channel delay in nanoseconds
    pub delay_ns: RangeSpec,
    /// Delay must be a multiple of this many nanoseconds
    pub delay_step_ns: i64,
    /// Dwell time in seconds
    pub dwell_s: RangeSpec,
}

impl Default for Cc1Limits {
    fn default() -> Self {
        Self {
            window_ns: RangeSpec::between(0, 7),
            delay_ns: RangeSpec::between(0, 14),
            delay_step_ns: 2,
            dwell_s: RangeSpec::at_least(0),
        }
    }
}

impl Cc1Limits {
    /// Validate a coincidence window, returning whole nanoseconds
    pub fn validate_window(&self, window: Quantity) -> Result<u32, ValidationError> {
        checked_integer("window", window, Unit::Nanoseconds, self.window_ns)
    }

    /// Validate a delay, returning whole nanoseconds
    pub fn validate_delay(&self, delay: Quantity) -> Result<u32, ValidationError> {
        let ns = checked_integer("delay", delay, Unit::Nanoseconds, self.delay_ns)?;
        if self.delay_step_ns > 1 && i64::from(ns) % self.delay_step_ns != 0 {
            return Err(ValidationError::NotMultiple {
                field: "delay",
                value: i64::from(ns),
                step: self.delay_step_ns,
            });
        }
        Ok(ns)
    }

    /// Validate a dwell time, returning whole seconds
    pub fn validate_dwell_time(&self, dwell: Quantity) -> Result<u32, ValidationError> {
        checked_integer("dwell time", dwell, Unit::Seconds, self.dwell_s)
    }
}

/// Convert to a whole number of `unit` and check it against `range`
fn checked_integer(
    field: &'static str,
    quantity: Quantity,
    unit: Unit,
    range: RangeSpec,
) -> Result<u32, ValidationError> {
    let value = quantity.to_integer(field, unit)?;
    if !range.contains(value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            range,
        });
    }
    // Wire fields are unsigned; a configured range reaching below zero still can't be sent
    u32::try_from(value).map_err(|_| ValidationError::OutOfRange {
        field,
        value,
        range: RangeSpec::between(0, i64::from(u32::MAX)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        let limits = Cc1Limits::default();
        assert_eq!(limits.validate_window(Quantity::ns(0.0)).unwrap(), 0);
        assert_eq!(limits.validate_window(Quantity::ns(7.0)).unwrap(), 7);
        assert!(matches!(
            limits.validate_window(Quantity::ns(10.0)),
            Err(ValidationError::OutOfRange { value: 10, .. })
        ));
        assert!(matches!(
            limits.validate_window(Quantity::ns(-1.0)),
            Err(ValidationError::OutOfRange { value: -1, .. })
        ));
    }

    #[test]
    fn test_delay_must_be_even() {
        let limits = Cc1Limits::default();
        assert_eq!(limits.validate_delay(Quantity::ns(2.0)).unwrap(), 2);
        assert_eq!(limits.validate_delay(Quantity::ns(14.0)).unwrap(), 14);
        assert_eq!(
            limits.validate_delay(Quantity::ns(1.0)).unwrap_err(),
            ValidationError::NotMultiple {
                field: "delay",
                value: 1,
                step: 2
            }
        );
        assert!(limits.validate_delay(Quantity::ns(-1.0)).is_err());
        assert!(limits.validate_delay(Quantity::ns(16.0)).is_err());
    }

    #[test]
    fn test_dwell_time_rescales() {
        let limits = Cc1Limits::default();
        assert_eq!(
            limits
                .validate_dwell_time(Quantity::new(3000.0, Unit::Milliseconds))
                .unwrap(),
            3
        );
        assert!(limits.validate_dwell_time(Quantity::s(-1.0)).is_err());
        assert!(limits.validate_dwell_time(Quantity::nm(1.0)).is_err());
    }

    #[test]
    fn test_range_display() {
        assert_eq!(RangeSpec::between(0, 7).to_string(), "[0, 7]");
        assert_eq!(RangeSpec::at_least(0).to_string(), "[0, ∞)");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delay_accepts_exactly_even_in_range(ns in -20i64..40) {
                let result = Cc1Limits::default().validate_delay(Quantity::ns(ns as f64));
                prop_assert_eq!(result.is_ok(), (0..=14).contains(&ns) && ns % 2 == 0);
            }

            #[test]
            fn negative_values_always_rejected(v in -1000i64..0) {
                let limits = Cc1Limits::default();
                prop_assert!(limits.validate_window(Quantity::ns(v as f64)).is_err());
                prop_assert!(limits.validate_delay(Quantity::ns(v as f64)).is_err());
                prop_assert!(limits.validate_dwell_time(Quantity::s(v as f64)).is_err());
            }
        }
    }
}
