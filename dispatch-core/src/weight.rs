//! Order weights quantised to hundredths of a unit.
//!
//! Weights arrive as decimal numbers with at most two fractional digits.
//! Storing them as integer hundredths keeps capacity arithmetic exact and
//! lets the packer index its table by weight directly.

use std::fmt;
use std::iter::Sum;

use thiserror::Error;

/// Errors raised when converting a decimal number into a [`Weight`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum WeightError {
    /// The value was NaN or infinite.
    #[error("weight must be a finite number")]
    NotFinite,
    /// The value cannot be represented as a non-negative count of hundredths.
    #[error("weight {value} is outside the representable range")]
    OutOfRange {
        /// Offending value.
        value: f64,
    },
}

/// A non-negative weight measured in hundredths of a unit.
///
/// # Examples
/// ```
/// use dispatch_core::Weight;
///
/// let weight = Weight::from_decimal(7.5)?;
/// assert_eq!(weight.hundredths(), 750);
/// assert_eq!(weight.to_string(), "7.5");
/// # Ok::<(), dispatch_core::WeightError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "f64", into = "f64")
)]
pub struct Weight(u32);

impl Weight {
    /// The empty weight.
    pub const ZERO: Self = Self(0);

    /// Build a weight from a count of hundredths.
    #[must_use]
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    /// Build a weight from whole units.
    #[must_use]
    pub const fn from_units(units: u32) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Round a decimal number to two places and quantise it.
    ///
    /// # Errors
    /// Returns [`WeightError`] for non-finite, negative, or oversized input.
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "the scaled value is range-checked before the cast"
    )]
    pub fn from_decimal(value: f64) -> Result<Self, WeightError> {
        if !value.is_finite() {
            return Err(WeightError::NotFinite);
        }
        let scaled = (value * 100.0).round();
        if scaled < 0.0 || scaled > f64::from(u32::MAX) {
            return Err(WeightError::OutOfRange { value });
        }
        Ok(Self(scaled as u32))
    }

    /// The weight as a count of hundredths.
    #[must_use]
    pub const fn hundredths(self) -> u32 {
        self.0
    }

    /// The weight as a decimal number of units.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "presentation converts hundredths back to decimal units"
    )]
    pub fn as_decimal(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Add two weights, saturating at the representable maximum.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Sum for Weight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl<'a> Sum<&'a Self> for Weight {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl TryFrom<f64> for Weight {
    type Error = WeightError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<Weight> for f64 {
    fn from(weight: Weight) -> Self {
        weight.as_decimal()
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}
