//! Assignment batches and their per-order completion records.
//!
//! A batch groups the orders handed to one courier in a single assignment
//! round. It is *open* while at least one of its orders has no completion
//! timestamp and *closed* once every order is complete.

use chrono::{DateTime, Utc};

use crate::{CourierId, OrderId, Weight};

/// Batch identifier.
pub type BatchId = u64;

/// Membership and completion record of one order inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchOrder {
    /// The referenced order.
    pub order_id: OrderId,
    /// Weight of the order, kept for ordering and capacity checks.
    pub weight: Weight,
    /// When the order was delivered, if it has been.
    pub complete_time: Option<DateTime<Utc>>,
    /// Seconds between the previous marker and `complete_time`.
    pub delivery_time: Option<u64>,
}

impl BatchOrder {
    /// A membership record for an order that is not yet delivered.
    #[must_use]
    pub const fn pending(order_id: OrderId, weight: Weight) -> Self {
        Self {
            order_id,
            weight,
            complete_time: None,
            delivery_time: None,
        }
    }

    /// Report whether the order has been delivered.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete_time.is_some()
    }
}

/// A courier's assignment round.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Batch {
    /// Unique identifier.
    pub id: BatchId,
    /// Courier who owns the batch.
    pub courier_id: CourierId,
    /// When the batch was created.
    pub assign_time: DateTime<Utc>,
    /// Reward fixed when the batch was created.
    pub expected_reward: u64,
    /// Member orders sorted by weight, then identifier.
    pub orders: Vec<BatchOrder>,
}

impl Batch {
    /// Report whether any member order is still undelivered.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.orders.iter().any(|order| !order.is_complete())
    }

    /// Report whether at least one member order has been delivered.
    #[must_use]
    pub fn has_completion(&self) -> bool {
        self.orders.iter().any(BatchOrder::is_complete)
    }

    /// Member orders that are not yet delivered.
    pub fn pending_orders(&self) -> impl Iterator<Item = &BatchOrder> {
        self.orders.iter().filter(|order| !order.is_complete())
    }

    /// Look up the membership record for `order_id`.
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> Option<&BatchOrder> {
        self.orders.iter().find(|order| order.order_id == order_id)
    }

    /// The instant a delivery of `order_id` is measured from: the latest
    /// completion among the other members, or the batch's creation time when
    /// none of them is complete.
    #[must_use]
    pub fn completion_marker(&self, order_id: OrderId) -> DateTime<Utc> {
        self.orders
            .iter()
            .filter(|order| order.order_id != order_id)
            .filter_map(|order| order.complete_time)
            .max()
            .unwrap_or(self.assign_time)
    }
}

/// A batch that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatch {
    /// Courier who owns the batch.
    pub courier_id: CourierId,
    /// Creation time.
    pub assign_time: DateTime<Utc>,
    /// Reward fixed at creation.
    pub expected_reward: u64,
    /// Member orders.
    pub orders: Vec<BatchOrder>,
}

impl NewBatch {
    /// Attach the identifier chosen by the store.
    ///
    /// Member orders are sorted by weight, then identifier.
    #[must_use]
    pub fn into_batch(self, id: BatchId) -> Batch {
        let mut orders = self.orders;
        orders.sort_by_key(|order| (order.weight, order.order_id));
        Batch {
            id,
            courier_id: self.courier_id,
            assign_time: self.assign_time,
            expected_reward: self.expected_reward,
            orders,
        }
    }
}
