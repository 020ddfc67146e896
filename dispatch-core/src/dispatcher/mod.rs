//! The batch manager.
//!
//! [`Dispatcher`] ties eligibility, packing and persistence together. It
//! keeps at most one open batch per courier, re-packs that batch when the
//! courier's attributes change, and records deliveries. Work for one courier
//! runs under that courier's lock; different couriers never contend.

use chrono::{DateTime, Utc};

use crate::eligibility::{self, CompletedOrders};
use crate::locks::LockRegistry;
use crate::{
    Batch, BatchId, BatchOrder, Clock, Courier, CourierId, DispatchConfig, DispatchError,
    DispatchStore, NewBatch, Order, OrderId, PackItem, Packer, StoreError, SystemClock, Weight,
    ensure_valid_selection,
};

mod completion;
mod registration;

#[cfg(test)]
mod tests;

pub use registration::{CourierReport, CourierUpdateOutcome};

/// The courier's current assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Assignment {
    /// Batch holding the orders.
    pub batch_id: BatchId,
    /// When the batch was created.
    pub assign_time: DateTime<Utc>,
    /// Undelivered orders of the batch, sorted by identifier.
    pub order_ids: Vec<OrderId>,
}

impl Assignment {
    fn of(batch: &Batch) -> Self {
        let mut order_ids: Vec<_> = batch.pending_orders().map(|order| order.order_id).collect();
        order_ids.sort_unstable();
        Self {
            batch_id: batch.id,
            assign_time: batch.assign_time,
            order_ids,
        }
    }
}

/// Result of re-evaluating an open batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReconcileOutcome {
    /// Undelivered orders still in the batch, sorted by identifier.
    pub kept: Vec<OrderId>,
    /// Orders detached and returned to the unassigned pool, sorted by
    /// identifier.
    pub released: Vec<OrderId>,
}

/// Assigns orders to couriers and tracks their deliveries.
///
/// The dispatcher is generic over the engine boundaries: a repository, a
/// packing strategy, and a clock.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "test-support")]
/// # {
/// use dispatch_core::test_support::{ExhaustivePacker, MemoryStore};
/// use dispatch_core::{CourierDraft, Dispatcher, OrderDraft};
///
/// let dispatcher = Dispatcher::new(MemoryStore::default(), ExhaustivePacker);
/// dispatcher
///     .register_couriers(&[CourierDraft {
///         courier_id: 1,
///         courier_type: "foot".into(),
///         regions: vec![1],
///         working_hours: vec!["09:00-18:00".into()],
///     }])
///     .expect("register courier");
/// dispatcher
///     .register_orders(&[OrderDraft {
///         order_id: 10,
///         weight: 4.5,
///         region: 1,
///         delivery_hours: vec!["10:00-11:00".into()],
///     }])
///     .expect("register order");
///
/// let assignment = dispatcher
///     .get_or_create_active_batch(1)
///     .expect("assign")
///     .expect("an order fits");
/// assert_eq!(assignment.order_ids, vec![10]);
/// # }
/// ```
#[derive(Debug)]
pub struct Dispatcher<S, P, C = SystemClock>
where
    S: DispatchStore,
    P: Packer,
    C: Clock,
{
    store: S,
    packer: P,
    clock: C,
    config: DispatchConfig,
    courier_locks: LockRegistry<CourierId>,
    completion_locks: LockRegistry<(BatchId, OrderId)>,
}

impl<S, P> Dispatcher<S, P, SystemClock>
where
    S: DispatchStore,
    P: Packer,
{
    /// Construct a dispatcher using the system clock and default
    /// configuration.
    #[must_use]
    pub fn new(store: S, packer: P) -> Self {
        Self::with_config(store, packer, DispatchConfig::default())
    }

    /// Construct a dispatcher using the system clock and explicit
    /// configuration.
    #[must_use]
    pub fn with_config(store: S, packer: P, config: DispatchConfig) -> Self {
        Self::with_clock(store, packer, SystemClock, config)
    }
}

impl<S, P, C> Dispatcher<S, P, C>
where
    S: DispatchStore,
    P: Packer,
    C: Clock,
{
    /// Construct a dispatcher with every collaborator supplied.
    #[must_use]
    pub fn with_clock(store: S, packer: P, clock: C, config: DispatchConfig) -> Self {
        Self {
            store,
            packer,
            clock,
            config,
            courier_locks: LockRegistry::default(),
            completion_locks: LockRegistry::default(),
        }
    }

    /// The underlying repository.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Orders the courier could carry right now, sorted by identifier.
    ///
    /// Delivered orders are left out. Orders sitting in any batch, including
    /// the courier's own, are still listed when they match.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers, or a
    /// repository failure.
    pub fn eligible_orders(&self, courier_id: CourierId) -> Result<Vec<Order>, DispatchError> {
        let courier = self.require_courier(courier_id)?;
        let completed = self.store.completed_order_ids()?;
        let matching = self
            .store
            .orders_matching(&|order| eligibility::is_eligible(&courier, order))?;
        Ok(eligibility::eligible_orders(
            &courier,
            matching,
            &completed,
            CompletedOrders::Exclude,
        ))
    }

    /// Return the courier's open batch, creating one when none exists.
    ///
    /// An existing open batch is returned unchanged, so repeated calls yield
    /// the same batch and orders until something is delivered or the courier
    /// changes. Otherwise the heaviest fitting selection of never-assigned
    /// eligible orders becomes a new batch whose reward is fixed now.
    /// Returns `None` when nothing can be assigned; no batch is created.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers,
    /// [`DispatchError::AssignmentConflict`] when a concurrent assignment
    /// claimed a selected order, or a repository failure.
    ///
    /// # Panics
    /// Panics when the packer returns a selection over capacity.
    pub fn get_or_create_active_batch(
        &self,
        courier_id: CourierId,
    ) -> Result<Option<Assignment>, DispatchError> {
        let _guard = self.courier_locks.lock(&courier_id);
        let courier = self.require_courier(courier_id)?;
        if let Some(batch) = self.store.open_batch(courier_id)? {
            log::debug!("courier {courier_id} keeps open batch {}", batch.id);
            return Ok(Some(Assignment::of(&batch)));
        }

        let assigned = self.store.assigned_order_ids()?;
        let pool = self.store.orders_matching(&|order| {
            !assigned.contains(&order.id) && eligibility::is_eligible(&courier, order)
        })?;
        let items: Vec<PackItem> = pool.iter().map(PackItem::from).collect();
        let selection = self.pack(&items, courier.capacity());
        if selection.is_empty() {
            log::debug!(
                "no order fits courier {courier_id} among {} candidates",
                items.len()
            );
            return Ok(None);
        }

        let orders = items
            .iter()
            .filter(|item| selection.contains(&item.id))
            .map(|item| BatchOrder::pending(item.id, item.weight))
            .collect();
        let new_batch = NewBatch {
            courier_id,
            assign_time: self.clock.now(),
            expected_reward: self.reward_for(&courier),
            orders,
        };
        let batch = self.store.create_batch(new_batch).map_err(|err| match err {
            StoreError::OrderAlreadyAssigned { order_id } => {
                DispatchError::AssignmentConflict { order_id }
            }
            other => DispatchError::Store(other),
        })?;
        log::info!(
            "created batch {} for courier {courier_id} with {} orders",
            batch.id,
            batch.orders.len()
        );
        Ok(Some(Assignment::of(&batch)))
    }

    /// Re-evaluate the courier's open batch against their current
    /// attributes.
    ///
    /// Undelivered members that are no longer eligible are released. When
    /// the remaining members outweigh the courier's capacity, the heaviest
    /// fitting subset is kept and the rest released. Delivered members are
    /// never touched.
    ///
    /// # Errors
    /// Returns [`DispatchError::CourierNotFound`] for unknown couriers, or a
    /// repository failure.
    ///
    /// # Panics
    /// Panics when the packer returns a selection over capacity.
    pub fn reconcile(&self, courier_id: CourierId) -> Result<ReconcileOutcome, DispatchError> {
        let _guard = self.courier_locks.lock(&courier_id);
        let courier = self.require_courier(courier_id)?;
        self.reconcile_locked(&courier)
    }

    /// Body of [`Self::reconcile`]; the caller holds the courier's lock.
    fn reconcile_locked(&self, courier: &Courier) -> Result<ReconcileOutcome, DispatchError> {
        let Some(batch) = self.store.open_batch(courier.id)? else {
            return Ok(ReconcileOutcome::default());
        };

        let mut candidates = Vec::new();
        let mut released = Vec::new();
        for member in batch.pending_orders() {
            let order = self.require_order(member.order_id)?;
            if eligibility::is_eligible(courier, &order) {
                candidates.push(PackItem::from(&order));
            } else {
                released.push(order.id);
            }
        }

        let capacity = courier.capacity();
        let load: Weight = candidates.iter().map(|item| item.weight).sum();
        let mut kept = if load > capacity {
            let selection = self.pack(&candidates, capacity);
            released.extend(
                candidates
                    .iter()
                    .map(|item| item.id)
                    .filter(|id| !selection.contains(id)),
            );
            selection
        } else {
            candidates.iter().map(|item| item.id).collect()
        };
        kept.sort_unstable();
        released.sort_unstable();

        if !released.is_empty() {
            let detached = self.store.detach_orders(batch.id, &released)?;
            if detached.len() != released.len() {
                log::warn!(
                    "batch {} kept orders delivered during reconciliation among {released:?}",
                    batch.id
                );
            }
            released = detached;
            released.sort_unstable();
            log::info!(
                "released orders {released:?} from batch {} of courier {}",
                batch.id,
                courier.id
            );
        }
        Ok(ReconcileOutcome { kept, released })
    }

    fn pack(&self, items: &[PackItem], capacity: Weight) -> Vec<OrderId> {
        let selection = self.packer.pack(items, capacity);
        ensure_valid_selection(items, &selection, capacity);
        selection
    }

    fn reward_for(&self, courier: &Courier) -> u64 {
        self.config
            .base_rate
            .saturating_mul(u64::from(courier.vehicle.pay_coefficient()))
    }

    fn require_courier(&self, courier_id: CourierId) -> Result<Courier, DispatchError> {
        self.store
            .courier(courier_id)?
            .ok_or(DispatchError::CourierNotFound { courier_id })
    }

    fn require_order(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        self.store
            .order(order_id)?
            .ok_or_else(|| StoreError::MissingOrder { order_id }.into())
    }
}
