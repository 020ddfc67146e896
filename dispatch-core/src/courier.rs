//! Couriers and the attributes that drive order eligibility.

use std::collections::BTreeSet;

use crate::{Region, TimeWindow, VehicleType, Weight};

/// Courier identifier.
pub type CourierId = u64;

/// A courier with the regions and hours they work.
///
/// Vehicle type, regions and working hours may change at any time; the
/// dispatcher reconciles the courier's open batch after each change.
///
/// # Examples
/// ```
/// use dispatch_core::{Courier, Region, TimeWindow, VehicleType, Weight};
///
/// let courier = Courier::new(
///     1,
///     VehicleType::Bike,
///     [Region::new(1)?],
///     [TimeWindow::parse("09:00-18:00")?],
/// );
/// assert_eq!(courier.capacity(), Weight::from_units(15));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Courier {
    /// Unique identifier.
    #[cfg_attr(feature = "serde", serde(rename = "courier_id"))]
    pub id: CourierId,
    /// Vehicle used for deliveries.
    #[cfg_attr(feature = "serde", serde(rename = "courier_type"))]
    pub vehicle: VehicleType,
    /// Regions the courier serves.
    pub regions: BTreeSet<Region>,
    /// Daily windows the courier works.
    pub working_hours: BTreeSet<TimeWindow>,
}

impl Courier {
    /// Construct a courier.
    pub fn new<R, H>(id: CourierId, vehicle: VehicleType, regions: R, working_hours: H) -> Self
    where
        R: IntoIterator<Item = Region>,
        H: IntoIterator<Item = TimeWindow>,
    {
        Self {
            id,
            vehicle,
            regions: regions.into_iter().collect(),
            working_hours: working_hours.into_iter().collect(),
        }
    }

    /// Maximum load for the courier's current vehicle.
    #[must_use]
    pub const fn capacity(&self) -> Weight {
        self.vehicle.capacity()
    }
}
