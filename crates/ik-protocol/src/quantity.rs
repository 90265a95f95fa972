//! Physical quantities attached to instrument values
//!
//! Instruments report bare numbers; the driver knows the unit of each field.
//! Only the conversions the drivers need are modelled here: time units
//! rescale to one another, everything else only converts to itself.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Units used by instrument fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Unit {
    /// Plain number (counts, intensities)
    Dimensionless,
    /// Picoseconds
    Picoseconds,
    /// Nanoseconds
    Nanoseconds,
    /// Microseconds
    Microseconds,
    /// Milliseconds
    Milliseconds,
    /// Seconds
    Seconds,
    /// Nanometers
    Nanometers,
}

impl Unit {
    /// Returns the conventional symbol for the unit
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Dimensionless => "",
            Unit::Picoseconds => "ps",
            Unit::Nanoseconds => "ns",
            Unit::Microseconds => "us",
            Unit::Milliseconds => "ms",
            Unit::Seconds => "s",
            Unit::Nanometers => "nm",
        }
    }

    /// Power-of-ten exponent relative to the second, for time units
    fn time_exponent(&self) -> Option<i32> {
        match self {
            Unit::Picoseconds => Some(-12),
            Unit::Nanoseconds => Some(-9),
            Unit::Microseconds => Some(-6),
            Unit::Milliseconds => Some(-3),
            Unit::Seconds => Some(0),
            Unit::Dimensionless | Unit::Nanometers => None,
        }
    }

    /// Factor to multiply a value in `self` by to express it in `to`
    fn factor_to(&self, to: Unit) -> Option<f64> {
        if *self == to {
            return Some(1.0);
        }
        let from_exp = self.time_exponent()?;
        let to_exp = to.time_exponent()?;
        Some(10f64.powi(from_exp - to_exp))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Dimensionless => f.write_str("dimensionless"),
            other => f.write_str(other.symbol()),
        }
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "dimensionless" => Ok(Unit::Dimensionless),
            "ps" => Ok(Unit::Picoseconds),
            "ns" => Ok(Unit::Nanoseconds),
            "us" | "µs" => Ok(Unit::Microseconds),
            "ms" => Ok(Unit::Milliseconds),
            "s" => Ok(Unit::Seconds),
            "nm" => Ok(Unit::Nanometers),
            other => Err(format!("unknown unit: {other}")),
        }
    }
}

/// A magnitude together with its unit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantity {
    /// Magnitude expressed in `unit`
    pub value: f64,
    /// Unit of the magnitude
    pub unit: Unit,
}

impl Quantity {
    /// Create a new quantity
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Dimensionless quantity
    pub fn dimensionless(value: f64) -> Self {
        Self::new(value, Unit::Dimensionless)
    }

    /// Quantity in nanoseconds
    pub fn ns(value: f64) -> Self {
        Self::new(value, Unit::Nanoseconds)
    }

    /// Quantity in seconds
    pub fn s(value: f64) -> Self {
        Self::new(value, Unit::Seconds)
    }

    /// Quantity in nanometers
    pub fn nm(value: f64) -> Self {
        Self::new(value, Unit::Nanometers)
    }

    /// Express this quantity in another unit
    pub fn rescale(self, unit: Unit) -> Result<Quantity, ValidationError> {
        let factor = self
            .unit
            .factor_to(unit)
            .ok_or(ValidationError::IncompatibleUnit {
                from: self.unit,
                to: unit,
            })?;
        Ok(Quantity::new(self.value * factor, unit))
    }

    /// Express this quantity in `unit` as a whole number
    ///
    /// Floating-point noise from rescaling (e.g. `0.002 us` → `2.0000000000000004 ns`)
    /// is tolerated; anything further from an integer is rejected.
    pub fn to_integer(self, field: &'static str, unit: Unit) -> Result<i64, ValidationError> {
        let scaled = self.rescale(unit)?;
        let rounded = scaled.value.round();
        let tolerance = 1e-9 * rounded.abs().max(1.0);
        if !scaled.value.is_finite() || (scaled.value - rounded).abs() > tolerance {
            return Err(ValidationError::NotIntegral {
                field,
                value: scaled.value,
                unit,
            });
        }
        Ok(rounded as i64)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Unit::Dimensionless => write!(f, "{}", self.value),
            unit => write!(f, "{} {}", self.value, unit.symbol()),
        }
    }
}

impl FromStr for Quantity {
    type Err = String;

    /// Parse `"7"`, `"7 ns"` or `"7ns"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(split);
        let value = number
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid quantity: {s}"))?;
        Ok(Quantity::new(value, unit.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_time_units() {
        let q = Quantity::new(2.0, Unit::Microseconds).rescale(Unit::Nanoseconds).unwrap();
        assert_eq!(q.unit, Unit::Nanoseconds);
        assert!((q.value - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rescale_incompatible() {
        let err = Quantity::nm(780.0).rescale(Unit::Seconds).unwrap_err();
        assert_eq!(
            err,
            ValidationError::IncompatibleUnit {
                from: Unit::Nanometers,
                to: Unit::Seconds
            }
        );
    }

    #[test]
    fn test_to_integer_tolerates_rescale_noise() {
        let q = Quantity::new(0.002, Unit::Microseconds);
        assert_eq!(q.to_integer("delay", Unit::Nanoseconds).unwrap(), 2);
    }

    #[test]
    fn test_to_integer_rejects_fraction() {
        let err = Quantity::ns(2.5).to_integer("delay", Unit::Nanoseconds).unwrap_err();
        assert!(matches!(err, ValidationError::NotIntegral { .. }));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!("7 ns".parse::<Quantity>().unwrap(), Quantity::ns(7.0));
        assert_eq!("7ns".parse::<Quantity>().unwrap(), Quantity::ns(7.0));
        assert_eq!("20".parse::<Quantity>().unwrap(), Quantity::dimensionless(20.0));
        assert_eq!("1.5 s".parse::<Quantity>().unwrap(), Quantity::s(1.5));
        assert!("ns".parse::<Quantity>().is_err());
        assert!("3 parsecs".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::ns(2.0).to_string(), "2 ns");
        assert_eq!(Quantity::dimensionless(20.0).to_string(), "20");
    }
}
