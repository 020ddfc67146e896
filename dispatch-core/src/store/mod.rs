//! Repository seam for couriers, orders and batches.
//!
//! The [`DispatchStore`] trait is the only way the dispatcher touches
//! persisted state. Eligibility and packing work on the materialised
//! entities it returns; the store itself never evaluates business rules
//! beyond the membership uniqueness enforced by
//! [`DispatchStore::create_batch`].

use std::collections::BTreeSet;
use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Batch, BatchId, Courier, CourierId, NewBatch, Order, OrderId, Region, TimeWindow};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteStore, SqliteStoreError};

/// Errors raised by [`DispatchStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order already belongs to a batch.
    #[error("order {order_id} is already assigned to a batch")]
    OrderAlreadyAssigned {
        /// Conflicting order.
        order_id: OrderId,
    },
    /// No batch carries the identifier.
    #[error("batch {batch_id} does not exist")]
    MissingBatch {
        /// Requested batch.
        batch_id: BatchId,
    },
    /// The batch exists but does not contain the order.
    #[error("order {order_id} is not a member of batch {batch_id}")]
    MissingBatchOrder {
        /// Requested batch.
        batch_id: BatchId,
        /// Requested order.
        order_id: OrderId,
    },
    /// Records with these identifiers are already stored.
    #[error("{entity} identifiers already stored: {ids:?}")]
    AlreadyStored {
        /// Kind of record, such as `"courier"`.
        entity: &'static str,
        /// Conflicting identifiers, in input order.
        ids: Vec<u64>,
    },
    /// No courier carries the identifier.
    #[error("courier {courier_id} does not exist")]
    MissingCourier {
        /// Requested courier.
        courier_id: CourierId,
    },
    /// A batch member references an order that is not stored.
    #[error("order {order_id} does not exist")]
    MissingOrder {
        /// Requested order.
        order_id: OrderId,
    },
    /// A persisted record could not be turned back into a domain value.
    #[error("stored {entity} {id} is invalid: {reason}")]
    InvalidRecord {
        /// Kind of record, such as `"courier"`.
        entity: &'static str,
        /// Identifier of the record.
        id: u64,
        /// What failed to validate.
        reason: String,
    },
    /// The storage backend failed.
    #[error("{operation} failed: {source}")]
    Backend {
        /// Store operation that was running.
        operation: &'static str,
        /// Backend error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a backend failure raised while running `operation`.
    #[must_use]
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Persistence for the dispatch domain.
///
/// Every method takes `&self`; implementations synchronise internally so one
/// store can serve concurrent dispatch calls. Writes that touch more than one
/// record must be atomic.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "test-support")]
/// # {
/// use dispatch_core::{Courier, DispatchStore, Region, TimeWindow, VehicleType};
/// use dispatch_core::test_support::MemoryStore;
///
/// let store = MemoryStore::default();
/// let courier = Courier::new(
///     1,
///     VehicleType::Car,
///     [Region::new(4).expect("region")],
///     [TimeWindow::parse("08:00-20:00").expect("window")],
/// );
/// store.save_couriers(&[courier.clone()]).expect("save");
/// assert_eq!(store.courier(1).expect("load"), Some(courier));
/// assert!(store.open_batch(1).expect("load").is_none());
/// # }
/// ```
pub trait DispatchStore: Send + Sync {
    /// Look up a courier.
    fn courier(&self, id: CourierId) -> Result<Option<Courier>, StoreError>;

    /// Insert new couriers as one unit.
    ///
    /// Fails with [`StoreError::AlreadyStored`], writing nothing, when any
    /// identifier is already stored or repeats within `couriers`.
    fn save_couriers(&self, couriers: &[Courier]) -> Result<(), StoreError>;

    /// Overwrite a stored courier's vehicle, regions and working hours.
    ///
    /// Fails with [`StoreError::MissingCourier`] when the courier is unknown.
    fn replace_courier(&self, courier: &Courier) -> Result<(), StoreError>;

    /// Look up an order.
    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Insert new orders as one unit.
    ///
    /// Fails with [`StoreError::AlreadyStored`] under the same rules as
    /// [`Self::save_couriers`].
    fn save_orders(&self, orders: &[Order]) -> Result<(), StoreError>;

    /// Every stored order accepted by `predicate`, sorted by identifier.
    fn orders_matching(
        &self,
        predicate: &dyn Fn(&Order) -> bool,
    ) -> Result<Vec<Order>, StoreError>;

    /// Regions referenced so far.
    fn known_regions(&self) -> Result<BTreeSet<Region>, StoreError>;

    /// Register regions, ignoring those already known.
    fn upsert_regions(&self, regions: &BTreeSet<Region>) -> Result<(), StoreError>;

    /// Time windows referenced so far.
    fn known_time_windows(&self) -> Result<BTreeSet<TimeWindow>, StoreError>;

    /// Register time windows by key, ignoring those already known.
    fn upsert_time_windows(&self, windows: &BTreeSet<TimeWindow>) -> Result<(), StoreError>;

    /// Orders that are a member of any batch, delivered or not.
    fn assigned_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError>;

    /// Orders with a completion timestamp.
    fn completed_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError>;

    /// Batches owned by a courier, oldest first.
    fn batches(&self, courier_id: CourierId) -> Result<Vec<Batch>, StoreError>;

    /// Persist a batch and its members.
    ///
    /// Fails with [`StoreError::OrderAlreadyAssigned`], writing nothing,
    /// when any member already belongs to a batch.
    fn create_batch(&self, batch: NewBatch) -> Result<Batch, StoreError>;

    /// Remove pending members from a batch and return the ones removed.
    ///
    /// Delivered members are kept even when listed. A batch left without
    /// members is deleted.
    fn detach_orders(
        &self,
        batch_id: BatchId,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderId>, StoreError>;

    /// Store the completion time and delivery duration of a batch member.
    fn record_completion(
        &self,
        batch_id: BatchId,
        order_id: OrderId,
        complete_time: DateTime<Utc>,
        delivery_time: u64,
    ) -> Result<(), StoreError>;

    /// The courier's batch that still has undelivered orders, if any.
    fn open_batch(&self, courier_id: CourierId) -> Result<Option<Batch>, StoreError> {
        Ok(self
            .batches(courier_id)?
            .into_iter()
            .find(Batch::is_open))
    }
}
