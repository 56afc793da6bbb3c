//! Unit-agnostic temperature value type.
//!
//! Stored internally as kelvin.  Exactly 0 K is the "no reading"
//! sentinel (`is_valid()` is false); arithmetic can never produce a
//! negative kelvin value.  Comparison uses a fixed absolute tolerance
//! to absorb floating-point drift from repeated unit conversions.

use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};
use core::str::FromStr;

use crate::error::ParseError;

/// Absolute equality tolerance in kelvin.
const TOLERANCE_K: f64 = 1e-4;

const CELSIUS_OFFSET: f64 = 273.15;
const FAHRENHEIT_OFFSET: f64 = 32.0;

/// Degrees Celsius per degree Fahrenheit.  The deployed controllers
/// are calibrated against 0.556, not the exact 5/9; keep them in
/// agreement.
const FAHRENHEIT_FACTOR: f64 = 0.556;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Map a one-character suffix (case-insensitive) to a unit.
    pub fn from_suffix(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Self::Celsius),
            'F' => Some(Self::Fahrenheit),
            'K' => Some(Self::Kelvin),
            _ => None,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius => write!(f, "C"),
            Self::Fahrenheit => write!(f, "F"),
            Self::Kelvin => write!(f, "K"),
        }
    }
}

// ---------------------------------------------------------------------------
// Temperature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Temperature {
    kelvin: f64,
}

impl Temperature {
    /// Construct from a value in the given unit.  Returns `None` if the
    /// value lies below absolute zero in that unit.
    pub fn new(value: f64, unit: TemperatureUnit) -> Option<Self> {
        let kelvin = kelvin_from(value, unit);
        if !kelvin.is_finite() || kelvin < 0.0 {
            return None;
        }
        Some(Self { kelvin })
    }

    /// The 0 K "no reading / not applicable" sentinel.
    pub const fn zero() -> Self {
        Self { kelvin: 0.0 }
    }

    /// Construct directly from kelvin, clamping negatives to the
    /// sentinel.  Used by the sensor path where the input is the
    /// result of a numeric conversion, not user data.
    pub(crate) fn from_kelvin_clamped(kelvin: f64) -> Self {
        if kelvin.is_finite() && kelvin > 0.0 {
            Self { kelvin }
        } else {
            Self::zero()
        }
    }

    /// False for the 0 K sentinel.
    pub fn is_valid(&self) -> bool {
        self.kelvin > 0.0
    }

    /// Value in the given unit.
    pub fn get(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.kelvin - CELSIUS_OFFSET,
            TemperatureUnit::Fahrenheit => {
                (self.kelvin - CELSIUS_OFFSET) / FAHRENHEIT_FACTOR + FAHRENHEIT_OFFSET
            }
            TemperatureUnit::Kelvin => self.kelvin,
        }
    }

    pub fn to_celsius(&self) -> f64 {
        self.get(TemperatureUnit::Celsius)
    }

    pub fn to_fahrenheit(&self) -> f64 {
        self.get(TemperatureUnit::Fahrenheit)
    }

    pub fn to_kelvin(&self) -> f64 {
        self.kelvin
    }

    /// Absolute difference from `other`, expressed in the given unit.
    pub fn diff(&self, other: &Temperature, unit: TemperatureUnit) -> f64 {
        let dk = (self.kelvin - other.kelvin).abs();
        match unit {
            // Celsius and kelvin degrees have the same size.
            TemperatureUnit::Celsius | TemperatureUnit::Kelvin => dk,
            TemperatureUnit::Fahrenheit => dk / FAHRENHEIT_FACTOR,
        }
    }
}

fn kelvin_from(value: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Celsius => value + CELSIUS_OFFSET,
        TemperatureUnit::Fahrenheit => (value - FAHRENHEIT_OFFSET) * FAHRENHEIT_FACTOR + CELSIUS_OFFSET,
        TemperatureUnit::Kelvin => value,
    }
}

// ---------------------------------------------------------------------------
// Comparison (tolerance-based)
// ---------------------------------------------------------------------------

impl PartialEq for Temperature {
    fn eq(&self, other: &Self) -> bool {
        (self.kelvin - other.kelvin).abs() <= TOLERANCE_K
    }
}

impl PartialOrd for Temperature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else {
            self.kelvin.partial_cmp(&other.kelvin)
        }
    }
}

// ---------------------------------------------------------------------------
// Arithmetic (subtraction clamps at the sentinel)
// ---------------------------------------------------------------------------

impl Add for Temperature {
    type Output = Temperature;

    fn add(self, rhs: Temperature) -> Temperature {
        Temperature {
            kelvin: self.kelvin + rhs.kelvin,
        }
    }
}

impl AddAssign for Temperature {
    fn add_assign(&mut self, rhs: Temperature) {
        self.kelvin += rhs.kelvin;
    }
}

impl Sub for Temperature {
    type Output = Temperature;

    fn sub(self, rhs: Temperature) -> Temperature {
        Temperature {
            kelvin: (self.kelvin - rhs.kelvin).max(0.0),
        }
    }
}

impl SubAssign for Temperature {
    fn sub_assign(&mut self, rhs: Temperature) {
        self.kelvin = (self.kelvin - rhs.kelvin).max(0.0);
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}C", self.to_celsius())
    }
}

// ---------------------------------------------------------------------------
// Parsing — "<number><C|F|K>", e.g. "18.5C", "64f", "290K"
// ---------------------------------------------------------------------------

impl FromStr for Temperature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let suffix = s.chars().next_back().ok_or(ParseError::NoNumber)?;
        let number = &s[..s.len() - suffix.len_utf8()];
        if number.is_empty() {
            return Err(ParseError::NoNumber);
        }
        let value: f64 = number.parse().map_err(|_| ParseError::NoNumber)?;
        let unit = TemperatureUnit::from_suffix(suffix).ok_or(ParseError::BadUnit)?;
        Temperature::new(value, unit).ok_or(ParseError::BelowAbsoluteZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_to_kelvin() {
        let t = Temperature::new(0.0, TemperatureUnit::Celsius).unwrap();
        assert!((t.to_kelvin() - 273.15).abs() < 1e-9);
    }

    #[test]
    fn fahrenheit_uses_calibration_factor() {
        // (212 - 32) * 0.556 = 100.08C, not the textbook 100C.
        let t = Temperature::new(212.0, TemperatureUnit::Fahrenheit).unwrap();
        assert!((t.to_celsius() - 100.08).abs() < 1e-9);
    }

    #[test]
    fn round_trip_all_units() {
        for unit in [
            TemperatureUnit::Celsius,
            TemperatureUnit::Fahrenheit,
            TemperatureUnit::Kelvin,
        ] {
            let t = Temperature::new(18.5, unit).unwrap();
            let back = Temperature::new(t.to_kelvin(), TemperatureUnit::Kelvin).unwrap();
            assert!(
                (back.get(unit) - 18.5).abs() < 1e-4,
                "round trip through kelvin failed for {unit}"
            );
        }
    }

    #[test]
    fn below_absolute_zero_rejected() {
        assert!(Temperature::new(-1.0, TemperatureUnit::Kelvin).is_none());
        assert!(Temperature::new(-274.0, TemperatureUnit::Celsius).is_none());
    }

    #[test]
    fn zero_kelvin_is_sentinel() {
        let t = Temperature::zero();
        assert!(!t.is_valid());
        assert!(Temperature::new(0.0, TemperatureUnit::Kelvin).unwrap() == t);
    }

    #[test]
    fn tolerance_equality() {
        let a = Temperature::new(293.15, TemperatureUnit::Kelvin).unwrap();
        let b = Temperature::new(293.15 + 5e-5, TemperatureUnit::Kelvin).unwrap();
        let c = Temperature::new(293.16, TemperatureUnit::Kelvin).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
        assert!(c > a);
    }

    #[test]
    fn subtraction_clamps_to_sentinel() {
        let small = Temperature::new(10.0, TemperatureUnit::Kelvin).unwrap();
        let big = Temperature::new(20.0, TemperatureUnit::Kelvin).unwrap();
        let d = small - big;
        assert!(!d.is_valid());
        assert!((d.to_kelvin()).abs() < 1e-12);

        let mut m = small;
        m -= big;
        assert!(!m.is_valid());
    }

    #[test]
    fn addition_and_diff() {
        let a = Temperature::new(10.0, TemperatureUnit::Kelvin).unwrap();
        let b = Temperature::new(15.0, TemperatureUnit::Kelvin).unwrap();
        assert!(((a + b).to_kelvin() - 25.0).abs() < 1e-9);
        assert!((a.diff(&b, TemperatureUnit::Celsius) - 5.0).abs() < 1e-9);
        assert!((a.diff(&b, TemperatureUnit::Fahrenheit) - 5.0 / 0.556).abs() < 1e-9);
    }

    #[test]
    fn parse_accepts_all_suffixes() {
        assert_eq!(
            "18.5C".parse::<Temperature>().unwrap(),
            Temperature::new(18.5, TemperatureUnit::Celsius).unwrap()
        );
        assert_eq!(
            "64f".parse::<Temperature>().unwrap(),
            Temperature::new(64.0, TemperatureUnit::Fahrenheit).unwrap()
        );
        assert_eq!(
            "290k".parse::<Temperature>().unwrap(),
            Temperature::new(290.0, TemperatureUnit::Kelvin).unwrap()
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("C".parse::<Temperature>(), Err(ParseError::NoNumber));
        assert_eq!("".parse::<Temperature>(), Err(ParseError::NoNumber));
        assert_eq!("18.5X".parse::<Temperature>(), Err(ParseError::BadUnit));
        assert_eq!("18.5".parse::<Temperature>(), Err(ParseError::BadUnit));
        assert_eq!(
            "-10K".parse::<Temperature>(),
            Err(ParseError::BelowAbsoluteZero)
        );
    }
}
