//! Failures surfaced by [`Dispatcher`](crate::Dispatcher) operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{CourierId, EntityKind, FieldError, OrderId, StoreError};

/// Errors returned by dispatch operations.
///
/// None of these are retried internally; callers translate them into their
/// own responses.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No courier carries the identifier.
    #[error("courier {courier_id} does not exist")]
    CourierNotFound {
        /// Requested courier.
        courier_id: CourierId,
    },
    /// The order is not assigned to the courier.
    #[error("order {order_id} is not assigned to courier {courier_id}")]
    AssignmentNotFound {
        /// Requested courier.
        courier_id: CourierId,
        /// Requested order.
        order_id: OrderId,
    },
    /// The completion time precedes the previous completion in the batch,
    /// or the batch's creation when none exists.
    #[error("order {order_id} cannot complete at {complete_time}; earliest allowed is {marker}")]
    InvalidTime {
        /// Order being completed.
        order_id: OrderId,
        /// Requested completion time.
        complete_time: DateTime<Utc>,
        /// Earliest acceptable completion time.
        marker: DateTime<Utc>,
    },
    /// Another assignment claimed the order first.
    #[error("order {order_id} was assigned concurrently")]
    AssignmentConflict {
        /// Contested order.
        order_id: OrderId,
    },
    /// Intake rejected some entities; nothing was written.
    #[error("rejected {entity} ids: {ids:?}")]
    Rejected {
        /// Kind of entity submitted.
        entity: EntityKind,
        /// Identifiers of every invalid entity, in input order.
        ids: Vec<u64>,
    },
    /// The courier update is invalid; nothing was written.
    #[error("invalid update for courier {courier_id}: {source}")]
    InvalidCourierUpdate {
        /// Courier being updated.
        courier_id: CourierId,
        /// Field failure.
        #[source]
        source: FieldError,
    },
    /// The repository failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
