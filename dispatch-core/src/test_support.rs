//! Test-only collaborators for the dispatcher.
//!
//! The helpers in this module are available to unit tests and behavioural
//! tests. They are gated behind the `test-support` feature (and `cfg(test)`).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};

use crate::{
    Batch, BatchId, BatchOrder, Clock, Courier, CourierId, DispatchStore, NewBatch, Order,
    OrderId, PackItem, Packer, Region, StoreError, TimeWindow, VehicleType, Weight,
};

/// Largest input [`ExhaustivePacker`] accepts.
pub const EXHAUSTIVE_LIMIT: usize = 20;

#[derive(Debug, Default)]
struct Tables {
    couriers: BTreeMap<CourierId, Courier>,
    orders: BTreeMap<OrderId, Order>,
    regions: BTreeSet<Region>,
    windows: BTreeSet<TimeWindow>,
    batches: BTreeMap<BatchId, Batch>,
    last_batch_id: BatchId,
}

impl Tables {
    fn members(&self) -> impl Iterator<Item = &BatchOrder> {
        self.batches.values().flat_map(|batch| batch.orders.iter())
    }
}

/// Identifiers among `ids` that are already stored or repeat within `ids`.
fn taken_ids<T>(stored: &BTreeMap<u64, T>, ids: impl IntoIterator<Item = u64>) -> Vec<u64> {
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .filter(|id| !seen.insert(*id) || stored.contains_key(id))
        .collect()
}

/// In-memory `DispatchStore` implementation used in tests.
///
/// The store performs linear scans and is intended only for small datasets.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a store holding the given couriers and orders.
    #[must_use]
    pub fn with_entities<C, O>(couriers: C, orders: O) -> Self
    where
        C: IntoIterator<Item = Courier>,
        O: IntoIterator<Item = Order>,
    {
        let store = Self::default();
        {
            let mut tables = store.tables.write();
            tables.couriers = couriers.into_iter().map(|c| (c.id, c)).collect();
            tables.orders = orders.into_iter().map(|o| (o.id, o)).collect();
        }
        store
    }

    /// Number of stored batches.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.tables.read().batches.len()
    }
}

impl DispatchStore for MemoryStore {
    fn courier(&self, id: CourierId) -> Result<Option<Courier>, StoreError> {
        Ok(self.tables.read().couriers.get(&id).cloned())
    }

    fn save_couriers(&self, couriers: &[Courier]) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let ids = taken_ids(&tables.couriers, couriers.iter().map(|courier| courier.id));
        if !ids.is_empty() {
            return Err(StoreError::AlreadyStored {
                entity: "courier",
                ids,
            });
        }
        for courier in couriers {
            tables.couriers.insert(courier.id, courier.clone());
        }
        Ok(())
    }

    fn replace_courier(&self, courier: &Courier) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let stored = tables
            .couriers
            .get_mut(&courier.id)
            .ok_or(StoreError::MissingCourier {
                courier_id: courier.id,
            })?;
        *stored = courier.clone();
        Ok(())
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().orders.get(&id).cloned())
    }

    fn save_orders(&self, orders: &[Order]) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let ids = taken_ids(&tables.orders, orders.iter().map(|order| order.id));
        if !ids.is_empty() {
            return Err(StoreError::AlreadyStored {
                entity: "order",
                ids,
            });
        }
        for order in orders {
            tables.orders.insert(order.id, order.clone());
        }
        Ok(())
    }

    fn orders_matching(
        &self,
        predicate: &dyn Fn(&Order) -> bool,
    ) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .tables
            .read()
            .orders
            .values()
            .filter(|order| predicate(order))
            .cloned()
            .collect())
    }

    fn known_regions(&self) -> Result<BTreeSet<Region>, StoreError> {
        Ok(self.tables.read().regions.clone())
    }

    fn upsert_regions(&self, regions: &BTreeSet<Region>) -> Result<(), StoreError> {
        self.tables.write().regions.extend(regions.iter().copied());
        Ok(())
    }

    fn known_time_windows(&self) -> Result<BTreeSet<TimeWindow>, StoreError> {
        Ok(self.tables.read().windows.clone())
    }

    fn upsert_time_windows(&self, windows: &BTreeSet<TimeWindow>) -> Result<(), StoreError> {
        self.tables.write().windows.extend(windows.iter().cloned());
        Ok(())
    }

    fn assigned_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError> {
        Ok(self
            .tables
            .read()
            .members()
            .map(|member| member.order_id)
            .collect())
    }

    fn completed_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError> {
        Ok(self
            .tables
            .read()
            .members()
            .filter(|member| member.is_complete())
            .map(|member| member.order_id)
            .collect())
    }

    fn batches(&self, courier_id: CourierId) -> Result<Vec<Batch>, StoreError> {
        Ok(self
            .tables
            .read()
            .batches
            .values()
            .filter(|batch| batch.courier_id == courier_id)
            .cloned()
            .collect())
    }

    fn create_batch(&self, batch: NewBatch) -> Result<Batch, StoreError> {
        let mut tables = self.tables.write();
        for member in &batch.orders {
            let order_id = member.order_id;
            if !tables.orders.contains_key(&order_id) {
                return Err(StoreError::MissingOrder { order_id });
            }
            if tables.members().any(|existing| existing.order_id == order_id) {
                return Err(StoreError::OrderAlreadyAssigned { order_id });
            }
        }
        tables.last_batch_id += 1;
        let stored = batch.into_batch(tables.last_batch_id);
        tables.batches.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn detach_orders(
        &self,
        batch_id: BatchId,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderId>, StoreError> {
        let mut tables = self.tables.write();
        let batch = tables
            .batches
            .get_mut(&batch_id)
            .ok_or(StoreError::MissingBatch { batch_id })?;
        let detached: Vec<OrderId> = batch
            .orders
            .iter()
            .filter(|member| !member.is_complete() && order_ids.contains(&member.order_id))
            .map(|member| member.order_id)
            .collect();
        batch
            .orders
            .retain(|member| !detached.contains(&member.order_id));
        if batch.orders.is_empty() {
            tables.batches.remove(&batch_id);
        }
        Ok(detached)
    }

    fn record_completion(
        &self,
        batch_id: BatchId,
        order_id: OrderId,
        complete_time: DateTime<Utc>,
        delivery_time: u64,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let member = tables
            .batches
            .get_mut(&batch_id)
            .ok_or(StoreError::MissingBatch { batch_id })?
            .orders
            .iter_mut()
            .find(|member| member.order_id == order_id)
            .ok_or(StoreError::MissingBatchOrder { batch_id, order_id })?;
        member.complete_time = Some(complete_time);
        member.delivery_time = Some(delivery_time);
        Ok(())
    }
}

/// A [`Clock`] that reports a caller-controlled instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// A clock stopped at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Reference [`Packer`] that tries every subset.
///
/// Picks the heaviest subset within capacity, preferring the first one found
/// in subset-mask order on ties. Only suitable for up to
/// [`EXHAUSTIVE_LIMIT`] items.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExhaustivePacker;

impl Packer for ExhaustivePacker {
    fn pack(&self, items: &[PackItem], capacity: Weight) -> Vec<OrderId> {
        assert!(
            items.len() <= EXHAUSTIVE_LIMIT,
            "exhaustive packing is limited to {EXHAUSTIVE_LIMIT} items"
        );
        let subset = |mask: u32| {
            items
                .iter()
                .enumerate()
                .filter(move |(index, _)| mask & (1 << index) != 0)
                .map(|(_, item)| item)
        };
        let mut best_mask = 0;
        let mut best_weight = Weight::ZERO;
        for mask in 0..(1_u32 << items.len()) {
            let total: Weight = subset(mask).map(|item| item.weight).sum();
            if total <= capacity && total > best_weight {
                best_mask = mask;
                best_weight = total;
            }
        }
        subset(best_mask).map(|item| item.id).collect()
    }
}

/// The instant 2024-03-01 `hour`:`minute`:00 UTC.
///
/// # Panics
/// Panics for an invalid hour or minute.
#[must_use]
#[expect(clippy::expect_used, reason = "fixtures use literal clock times")]
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0)
        .single()
        .expect("valid fixture time")
}

/// Construct a courier from literal codes and window keys.
///
/// # Panics
/// Panics for a zero region code or malformed window key.
#[must_use]
#[expect(clippy::expect_used, reason = "fixtures use literal, known-valid input")]
pub fn courier(id: CourierId, vehicle: VehicleType, regions: &[u32], hours: &[&str]) -> Courier {
    Courier::new(
        id,
        vehicle,
        regions
            .iter()
            .map(|code| Region::new(*code).expect("fixture region")),
        hours
            .iter()
            .map(|key| TimeWindow::parse(key).expect("fixture window")),
    )
}

/// Construct an order from a weight in hundredths, a region code and window
/// keys.
///
/// # Panics
/// Panics when any input is invalid.
#[must_use]
#[expect(clippy::expect_used, reason = "fixtures use literal, known-valid input")]
pub fn order(id: OrderId, hundredths: u32, region: u32, hours: &[&str]) -> Order {
    Order::new(
        id,
        Weight::from_hundredths(hundredths),
        Region::new(region).expect("fixture region"),
        hours
            .iter()
            .map(|key| TimeWindow::parse(key).expect("fixture window")),
    )
    .expect("fixture order")
}
