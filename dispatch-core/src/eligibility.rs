//! Predicates deciding which orders a courier may carry.
//!
//! An order is eligible for a courier when it is delivered to one of the
//! courier's regions, weighs no more than the courier's vehicle capacity, and
//! has at least one delivery window overlapping one of the courier's working
//! windows. The predicates work over materialised entities supplied by a
//! [`DispatchStore`](crate::DispatchStore); they never query storage
//! themselves.

use std::collections::BTreeSet;

use crate::{Courier, Order, OrderId};

/// Whether orders already delivered in some batch are filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletedOrders {
    /// Drop orders with a completion timestamp.
    #[default]
    Exclude,
    /// Keep delivered orders in the result.
    Include,
}

/// The order is delivered to a region the courier serves.
#[must_use]
pub fn serves_region(courier: &Courier, order: &Order) -> bool {
    courier.regions.contains(&order.region)
}

/// The order fits the courier's vehicle on its own.
#[must_use]
pub fn fits_vehicle(courier: &Courier, order: &Order) -> bool {
    order.weight <= courier.capacity()
}

/// Some delivery window of the order overlaps some working window of the
/// courier.
#[must_use]
pub fn matches_hours(courier: &Courier, order: &Order) -> bool {
    order.delivery_hours.iter().any(|delivery| {
        courier
            .working_hours
            .iter()
            .any(|working| working.overlaps(delivery))
    })
}

/// Region, weight and hours all allow `courier` to take `order`.
///
/// # Examples
/// ```
/// use dispatch_core::{Courier, Order, Region, TimeWindow, VehicleType, Weight, is_eligible};
///
/// let courier = Courier::new(
///     1,
///     VehicleType::Foot,
///     [Region::new(1)?],
///     [TimeWindow::parse("09:00-12:00")?],
/// );
/// let near = Order::new(1, Weight::from_units(3), Region::new(1)?, [TimeWindow::parse("11:00-13:00")?])?;
/// let heavy = Order::new(2, Weight::from_units(11), Region::new(1)?, [TimeWindow::parse("11:00-13:00")?])?;
/// assert!(is_eligible(&courier, &near));
/// assert!(!is_eligible(&courier, &heavy));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use]
pub fn is_eligible(courier: &Courier, order: &Order) -> bool {
    serves_region(courier, order) && fits_vehicle(courier, order) && matches_hours(courier, order)
}

/// Filter `orders` down to those eligible for `courier`.
///
/// With [`CompletedOrders::Exclude`], orders listed in `completed` are
/// dropped as well. The result is sorted by order identifier; an empty
/// result is not an error.
#[must_use]
pub fn eligible_orders<I>(
    courier: &Courier,
    orders: I,
    completed: &BTreeSet<OrderId>,
    filter: CompletedOrders,
) -> Vec<Order>
where
    I: IntoIterator<Item = Order>,
{
    let mut eligible: Vec<Order> = orders
        .into_iter()
        .filter(|order| filter == CompletedOrders::Include || !completed.contains(&order.id))
        .filter(|order| is_eligible(courier, order))
        .collect();
    eligible.sort_unstable_by_key(|order| order.id);
    eligible
}
