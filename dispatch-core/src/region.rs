//! Delivery regions identified by positive integer codes.

use std::fmt;

use thiserror::Error;

/// Error returned by [`Region::new`] for the reserved code `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("region code must be a positive integer")]
pub struct InvalidRegionCode;

/// An opaque delivery region. Identity is the code itself.
///
/// # Examples
/// ```
/// use dispatch_core::Region;
///
/// let region = Region::new(12)?;
/// assert_eq!(region.code(), 12);
/// assert!(Region::new(0).is_err());
/// # Ok::<(), dispatch_core::InvalidRegionCode>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u32", into = "u32")
)]
pub struct Region(u32);

impl Region {
    /// Validate and wrap a region code.
    ///
    /// # Errors
    /// Returns [`InvalidRegionCode`] when `code` is zero.
    pub const fn new(code: u32) -> Result<Self, InvalidRegionCode> {
        if code == 0 {
            return Err(InvalidRegionCode);
        }
        Ok(Self(code))
    }

    /// The numeric region code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Region {
    type Error = InvalidRegionCode;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<Region> for u32 {
    fn from(region: Region) -> Self {
        region.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
