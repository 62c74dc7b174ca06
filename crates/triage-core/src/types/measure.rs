//! # Fixed-Point Clinical Values
//!
//! Every numeric clinical input (temperature, lab values, rates) is stored as
//! an integer count of hundredths. Band boundaries in the classifiers are
//! written against the same scale, so comparisons are exact and no
//! floating-point arithmetic is ever performed.
//!
//! ## Text Form
//!
//! - Accepts `.` or `,` as decimal separator (`"37,5"` == `"37.5"`)
//! - Digits beyond the second decimal are rounded half-up
//! - Displays without trailing zeros (`4`, `37.5`, `4.05`)
//!
//! ## Serialization
//!
//! Human-readable formats (JSON, TOML) see the text form and accept either a
//! number or a string. Binary formats (postcard) see the raw hundredths.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A clinical value in hundredths of its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Measure(i64);

/// Reasons a text value cannot become a [`Measure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeasureParseError {
    /// Nothing but whitespace was supplied.
    #[error("empty value")]
    Empty,
    /// The text is not a decimal number.
    #[error("not a number: {0}")]
    Invalid(String),
    /// The number does not fit the fixed-point range.
    #[error("value out of range")]
    OutOfRange,
}

impl Measure {
    /// Number of stored units per whole unit.
    pub const SCALE: i64 = 100;

    /// Create a measure from a raw count of hundredths.
    #[must_use]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Create a measure from a whole number of units.
    #[must_use]
    pub const fn from_whole(value: i64) -> Self {
        Self(value.saturating_mul(Self::SCALE))
    }

    /// Create a measure from tenths of a unit (`375` → 37.5).
    #[must_use]
    pub const fn from_tenths(tenths: i64) -> Self {
        Self(tenths.saturating_mul(10))
    }

    /// Raw hundredths.
    #[must_use]
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    /// Nearest whole number, halves rounded away from zero.
    #[must_use]
    pub const fn round(self) -> i64 {
        let half = Self::SCALE / 2;
        if self.0 >= 0 {
            self.0.saturating_add(half) / Self::SCALE
        } else {
            self.0.saturating_sub(half) / Self::SCALE
        }
    }

    /// Whether the value is strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `self / denominator` as a measure, truncated to hundredths.
    ///
    /// Returns `None` when the denominator is not positive.
    #[must_use]
    pub fn ratio_to(self, denominator: Measure) -> Option<Measure> {
        if !denominator.is_positive() {
            return None;
        }
        let scaled = self.0.checked_mul(Self::SCALE)?;
        Some(Self(scaled / denominator.0))
    }
}

// =============================================================================
// PARSING
// =============================================================================

impl FromStr for Measure {
    type Err = MeasureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MeasureParseError::Empty);
        }
        let invalid = || MeasureParseError::Invalid(trimmed.to_string());

        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let mut parts = unsigned.splitn(2, ['.', ',']);
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next().unwrap_or("");

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let mut whole: i64 = 0;
        for b in int_part.bytes() {
            whole = whole
                .checked_mul(10)
                .and_then(|w| w.checked_add(i64::from(b - b'0')))
                .ok_or(MeasureParseError::OutOfRange)?;
        }

        let digits: Vec<i64> = frac_part.bytes().map(|b| i64::from(b - b'0')).collect();
        let tenths = digits.first().copied().unwrap_or(0);
        let hundredths = digits.get(1).copied().unwrap_or(0);
        let round_up = digits.get(2).is_some_and(|d| *d >= 5);

        let mut value = whole
            .checked_mul(Self::SCALE)
            .and_then(|v| v.checked_add(tenths * 10 + hundredths))
            .ok_or(MeasureParseError::OutOfRange)?;
        if round_up {
            value = value.checked_add(1).ok_or(MeasureParseError::OutOfRange)?;
        }

        Ok(Self(if negative { -value } else { value }))
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / 100;
        let frac = abs % 100;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else if frac % 10 == 0 {
            write!(f, "{sign}{whole}.{}", frac / 10)
        } else {
            write!(f, "{sign}{whole}.{frac:02}")
        }
    }
}

// =============================================================================
// SERDE
// =============================================================================

impl Serialize for Measure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Measure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(MeasureVisitor)
        } else {
            i64::deserialize(deserializer).map(Measure)
        }
    }
}

struct MeasureVisitor;

impl Visitor<'_> for MeasureVisitor {
    type Value = Measure;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Measure, E> {
        v.checked_mul(Measure::SCALE)
            .map(Measure)
            .ok_or_else(|| E::custom(MeasureParseError::OutOfRange))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Measure, E> {
        i64::try_from(v)
            .map_err(|_| E::custom(MeasureParseError::OutOfRange))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Measure, E> {
        // Go through the shortest decimal text form; no float math involved.
        self.visit_str(&v.to_string())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Measure, E> {
        v.parse().map_err(E::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================
