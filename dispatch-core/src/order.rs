//! Delivery orders.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::{Region, TimeWindow, Weight};

/// Order identifier.
pub type OrderId = u64;

/// Lightest accepted order weight.
pub const MIN_ORDER_WEIGHT: Weight = Weight::from_hundredths(1);

/// Heaviest accepted order weight.
pub const MAX_ORDER_WEIGHT: Weight = Weight::from_units(50);

/// Errors returned by [`Order::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The weight lies outside `0.01..=50`.
    #[error("order weight {weight} is outside {MIN_ORDER_WEIGHT}..={MAX_ORDER_WEIGHT}")]
    WeightOutOfRange {
        /// Rejected weight.
        weight: Weight,
    },
}

/// An order waiting to be delivered to a single region.
///
/// Orders never change after creation. Assignment and completion state is
/// held by the batch that contains the order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    /// Unique identifier.
    #[cfg_attr(feature = "serde", serde(rename = "order_id"))]
    pub id: OrderId,
    /// Order weight.
    pub weight: Weight,
    /// Delivery region.
    pub region: Region,
    /// Windows in which the customer accepts delivery.
    pub delivery_hours: BTreeSet<TimeWindow>,
}

impl Order {
    /// Validate and construct an [`Order`].
    ///
    /// # Errors
    /// Returns [`OrderError::WeightOutOfRange`] unless
    /// `MIN_ORDER_WEIGHT <= weight <= MAX_ORDER_WEIGHT`.
    ///
    /// # Examples
    /// ```
    /// use dispatch_core::{Order, Region, TimeWindow, Weight};
    ///
    /// let order = Order::new(
    ///     7,
    ///     Weight::from_decimal(2.5)?,
    ///     Region::new(3)?,
    ///     [TimeWindow::parse("10:00-12:00")?],
    /// )?;
    /// assert_eq!(order.weight.hundredths(), 250);
    /// assert!(Order::new(8, Weight::from_units(51), Region::new(3)?, []).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new<H>(
        id: OrderId,
        weight: Weight,
        region: Region,
        delivery_hours: H,
    ) -> Result<Self, OrderError>
    where
        H: IntoIterator<Item = TimeWindow>,
    {
        if !(MIN_ORDER_WEIGHT..=MAX_ORDER_WEIGHT).contains(&weight) {
            return Err(OrderError::WeightOutOfRange { weight });
        }
        Ok(Self {
            id,
            weight,
            region,
            delivery_hours: delivery_hours.into_iter().collect(),
        })
    }
}
