//! Courier vehicle types.
//!
//! Each vehicle type fixes the load a courier may carry at once and the pay
//! coefficient applied to a batch's expected reward.
//!
//! # Examples
//! ```
//! use dispatch_core::{VehicleType, Weight};
//!
//! assert_eq!(VehicleType::Bike.capacity(), Weight::from_units(15));
//! assert_eq!(VehicleType::Car.pay_coefficient(), 9);
//! assert_eq!("foot".parse::<VehicleType>()?, VehicleType::Foot);
//! # Ok::<(), dispatch_core::UnknownVehicleType>(())
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::Weight;

/// Error returned when parsing an unrecognised vehicle type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vehicle type {value:?} (expected foot, bike or car)")]
pub struct UnknownVehicleType {
    /// The rejected input.
    pub value: String,
}

/// How a courier travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum VehicleType {
    /// Walking courier.
    Foot,
    /// Bicycle courier.
    Bike,
    /// Courier driving a car.
    Car,
}

impl VehicleType {
    /// Return the vehicle type as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Foot => "foot",
            Self::Bike => "bike",
            Self::Car => "car",
        }
    }

    /// Maximum total weight carried concurrently.
    #[must_use]
    pub const fn capacity(self) -> Weight {
        match self {
            Self::Foot => Weight::from_units(10),
            Self::Bike => Weight::from_units(15),
            Self::Car => Weight::from_units(50),
        }
    }

    /// Multiplier applied to the base rate when a batch is created.
    #[must_use]
    pub const fn pay_coefficient(self) -> u32 {
        match self {
            Self::Foot => 2,
            Self::Bike => 5,
            Self::Car => 9,
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = UnknownVehicleType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foot" => Ok(Self::Foot),
            "bike" => Ok(Self::Bike),
            "car" => Ok(Self::Car),
            _ => Err(UnknownVehicleType {
                value: s.to_owned(),
            }),
        }
    }
}
