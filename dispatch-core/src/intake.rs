//! Validation of incoming courier and order payloads.
//!
//! Drafts mirror the shape callers submit: raw numbers and strings with a
//! fixed set of fields. Unknown fields are rejected during deserialisation.
//! Turning a draft into a domain value checks every field; checks that need
//! the repository (duplicates, unknown regions) happen in the
//! [`Dispatcher`](crate::Dispatcher).

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::{
    Courier, CourierId, Order, OrderError, OrderId, Region, TimeWindow, TimeWindowError,
    UnknownVehicleType, VehicleType, Weight, WeightError,
};

/// Entity kind named in intake rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum EntityKind {
    /// Courier payloads.
    Courier,
    /// Order payloads.
    Order,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Courier => "courier",
            Self::Order => "order",
        })
    }
}

/// A single field failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// `courier_type` is not a known vehicle.
    #[error(transparent)]
    Vehicle(#[from] UnknownVehicleType),
    /// A region code is not a positive integer.
    #[error("region code {value} must be a positive integer")]
    Region {
        /// Rejected code.
        value: i64,
    },
    /// A time window key is malformed.
    #[error(transparent)]
    TimeWindow(#[from] TimeWindowError),
    /// The weight could not be quantised.
    #[error(transparent)]
    Weight(#[from] WeightError),
    /// The order failed its own invariants.
    #[error(transparent)]
    Order(#[from] OrderError),
    /// The region has not been registered and auto-creation is disabled.
    #[error("region {region} is not registered")]
    UnknownRegion {
        /// Unregistered region.
        region: Region,
    },
    /// The time window has not been registered and auto-creation is
    /// disabled.
    #[error("time window {key} is not registered")]
    UnknownTimeWindow {
        /// Unregistered key.
        key: String,
    },
    /// The update names no field to change.
    #[error("update must change at least one field")]
    EmptyUpdate,
}

fn parse_region(value: i64) -> Result<Region, FieldError> {
    u32::try_from(value)
        .ok()
        .and_then(|code| Region::new(code).ok())
        .ok_or(FieldError::Region { value })
}

fn parse_regions(values: &[i64]) -> Result<BTreeSet<Region>, FieldError> {
    values.iter().map(|value| parse_region(*value)).collect()
}

fn parse_windows(keys: &[String]) -> Result<BTreeSet<TimeWindow>, FieldError> {
    keys.iter()
        .map(|key| TimeWindow::parse(key).map_err(FieldError::from))
        .collect()
}

/// A courier as submitted for registration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(deny_unknown_fields)
)]
pub struct CourierDraft {
    /// Requested identifier.
    pub courier_id: CourierId,
    /// Vehicle name: `foot`, `bike` or `car`.
    pub courier_type: String,
    /// Region codes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub regions: Vec<i64>,
    /// Working window keys.
    #[cfg_attr(feature = "serde", serde(default))]
    pub working_hours: Vec<String>,
}

impl CourierDraft {
    /// Validate every field and build the courier.
    ///
    /// # Errors
    /// Returns the first [`FieldError`] encountered.
    pub fn validate(&self) -> Result<Courier, FieldError> {
        let vehicle: VehicleType = self.courier_type.parse()?;
        Ok(Courier {
            id: self.courier_id,
            vehicle,
            regions: parse_regions(&self.regions)?,
            working_hours: parse_windows(&self.working_hours)?,
        })
    }
}

/// An order as submitted for registration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(deny_unknown_fields)
)]
pub struct OrderDraft {
    /// Requested identifier.
    pub order_id: OrderId,
    /// Weight in units with up to two decimal places.
    pub weight: f64,
    /// Delivery region code.
    pub region: i64,
    /// Acceptable delivery window keys.
    pub delivery_hours: Vec<String>,
}

impl OrderDraft {
    /// Validate every field and build the order.
    ///
    /// # Errors
    /// Returns the first [`FieldError`] encountered.
    pub fn validate(&self) -> Result<Order, FieldError> {
        let weight = Weight::from_decimal(self.weight)?;
        let region = parse_region(self.region)?;
        let hours = parse_windows(&self.delivery_hours)?;
        Ok(Order::new(self.order_id, weight, region, hours)?)
    }
}

/// A partial change to a courier's attributes.
///
/// The identifier is not a field: an attempt to send `courier_id` fails as
/// an unknown field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(deny_unknown_fields)
)]
pub struct CourierUpdate {
    /// New vehicle name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub courier_type: Option<String>,
    /// New region codes, replacing the old set.
    #[cfg_attr(feature = "serde", serde(default))]
    pub regions: Option<Vec<i64>>,
    /// New working window keys, replacing the old set.
    #[cfg_attr(feature = "serde", serde(default))]
    pub working_hours: Option<Vec<String>>,
}

impl CourierUpdate {
    /// Apply the update to a copy of `courier`.
    ///
    /// # Errors
    /// Returns [`FieldError::EmptyUpdate`] when no field is present, or the
    /// first invalid field.
    pub fn apply(&self, courier: &Courier) -> Result<Courier, FieldError> {
        if self.courier_type.is_none() && self.regions.is_none() && self.working_hours.is_none()
        {
            return Err(FieldError::EmptyUpdate);
        }
        let mut updated = courier.clone();
        if let Some(name) = &self.courier_type {
            updated.vehicle = name.parse()?;
        }
        if let Some(codes) = &self.regions {
            updated.regions = parse_regions(codes)?;
        }
        if let Some(keys) = &self.working_hours {
            updated.working_hours = parse_windows(keys)?;
        }
        Ok(updated)
    }
}

/// Report regions and windows of an entity that are not yet registered.
pub(crate) fn check_registered<'a, R, W>(
    regions: R,
    windows: W,
    known_regions: &BTreeSet<Region>,
    known_windows: &BTreeSet<TimeWindow>,
) -> Result<(), FieldError>
where
    R: IntoIterator<Item = &'a Region>,
    W: IntoIterator<Item = &'a TimeWindow>,
{
    if let Some(region) = regions.into_iter().find(|r| !known_regions.contains(*r)) {
        return Err(FieldError::UnknownRegion { region: *region });
    }
    if let Some(window) = windows.into_iter().find(|w| !known_windows.contains(*w)) {
        return Err(FieldError::UnknownTimeWindow {
            key: window.key().to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn draft() -> CourierDraft {
        CourierDraft {
            courier_id: 7,
            courier_type: "bike".into(),
            regions: vec![1, 12],
            working_hours: vec!["09:00-18:00".into()],
        }
    }

    #[rstest]
    fn courier_draft_builds_courier() {
        let courier = draft().validate().expect("valid draft");
        assert_eq!(courier.id, 7);
        assert_eq!(courier.vehicle, VehicleType::Bike);
        assert_eq!(courier.regions.len(), 2);
    }

    #[rstest]
    #[case::vehicle(CourierDraft { courier_type: "plane".into(), ..draft() })]
    #[case::zero_region(CourierDraft { regions: vec![0], ..draft() })]
    #[case::negative_region(CourierDraft { regions: vec![-3], ..draft() })]
    #[case::bad_window(CourierDraft { working_hours: vec!["9-18".into()], ..draft() })]
    fn courier_draft_rejects_bad_fields(#[case] candidate: CourierDraft) {
        assert!(candidate.validate().is_err());
    }

    #[rstest]
    #[case(0.0, false)]
    #[case(0.01, true)]
    #[case(50.0, true)]
    #[case(50.01, false)]
    #[case(-1.0, false)]
    fn order_draft_checks_weight_bounds(#[case] weight: f64, #[case] accepted: bool) {
        let candidate = OrderDraft {
            order_id: 1,
            weight,
            region: 3,
            delivery_hours: vec!["10:00-12:00".into()],
        };
        assert_eq!(candidate.validate().is_ok(), accepted);
    }

    #[rstest]
    fn empty_update_is_rejected() {
        let courier = draft().validate().expect("valid draft");
        let err = CourierUpdate::default()
            .apply(&courier)
            .expect_err("empty update");
        assert_eq!(err, FieldError::EmptyUpdate);
    }

    #[rstest]
    fn update_replaces_only_given_fields() {
        let courier = draft().validate().expect("valid draft");
        let update = CourierUpdate {
            courier_type: Some("foot".into()),
            ..CourierUpdate::default()
        };
        let updated = update.apply(&courier).expect("valid update");
        assert_eq!(updated.vehicle, VehicleType::Foot);
        assert_eq!(updated.regions, courier.regions);
        assert_eq!(updated.working_hours, courier.working_hours);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn update_payload_cannot_change_identifier() {
        let payload = r#"{"courier_id": 3, "regions": [1]}"#;
        let result: Result<CourierUpdate, _> = serde_json::from_str(payload);
        assert!(result.is_err());
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn order_payload_rejects_unknown_fields() {
        let payload = r#"{"order_id": 1, "weight": 1.5, "region": 2, "delivery_hours": [], "colour": "red"}"#;
        let result: Result<OrderDraft, _> = serde_json::from_str(payload);
        assert!(result.is_err());
    }
}
