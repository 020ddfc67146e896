//! Tests for the `Dispatcher`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use rstest::{fixture, rstest};

use super::*;
use crate::test_support::{ExhaustivePacker, FixedClock, MemoryStore, at, courier, order};
use crate::{CourierDraft, CourierUpdate, EntityKind, OrderDraft, Region, TimeWindow, VehicleType};

type TestDispatcher = Dispatcher<MemoryStore, ExhaustivePacker, FixedClock>;

const HOURS: &[&str] = &["09:00-18:00"];
const SLOT: &[&str] = &["10:00-12:00"];

fn dispatcher_with(couriers: Vec<Courier>, orders: Vec<Order>) -> TestDispatcher {
    Dispatcher::with_clock(
        MemoryStore::with_entities(couriers, orders),
        ExhaustivePacker,
        FixedClock::new(at(9, 0)),
        DispatchConfig::default(),
    )
}

/// A bike courier (capacity 15) and orders weighing 2, 3, 7.5 and 9.
#[fixture]
fn bike_dispatcher() -> TestDispatcher {
    dispatcher_with(
        vec![courier(1, VehicleType::Bike, &[1], HOURS)],
        vec![
            order(11, 200, 1, SLOT),
            order(12, 300, 1, SLOT),
            order(13, 750, 1, SLOT),
            order(14, 900, 1, SLOT),
        ],
    )
}

fn assign(dispatcher: &TestDispatcher, courier_id: CourierId) -> Assignment {
    dispatcher
        .get_or_create_active_batch(courier_id)
        .expect("assignment succeeds")
        .expect("orders are available")
}

#[rstest]
fn assignment_takes_heaviest_fitting_subset(bike_dispatcher: TestDispatcher) {
    let assignment = assign(&bike_dispatcher, 1);
    assert_eq!(assignment.order_ids, vec![11, 12, 14]);
    assert_eq!(assignment.assign_time, at(9, 0));

    let batch = bike_dispatcher
        .store()
        .open_batch(1)
        .expect("load batch")
        .expect("batch exists");
    assert_eq!(batch.expected_reward, 2_500);
    let load: Weight = batch.orders.iter().map(|member| member.weight).sum();
    assert_eq!(load, Weight::from_units(14));
}

#[rstest]
fn assignment_is_idempotent(bike_dispatcher: TestDispatcher) {
    let first = assign(&bike_dispatcher, 1);
    let second = assign(&bike_dispatcher, 1);
    assert_eq!(first, second);
    assert_eq!(bike_dispatcher.store().batch_count(), 1);
}

#[rstest]
fn nothing_eligible_creates_no_batch() {
    let dispatcher = dispatcher_with(
        vec![courier(1, VehicleType::Foot, &[1], HOURS)],
        vec![
            order(1, 1_100, 1, SLOT),
            order(2, 100, 2, SLOT),
            order(3, 100, 1, &["19:00-20:00"]),
        ],
    );
    let assignment = dispatcher.get_or_create_active_batch(1).expect("assign");
    assert!(assignment.is_none());
    assert_eq!(dispatcher.store().batch_count(), 0);
}

#[rstest]
fn unknown_courier_is_reported(bike_dispatcher: TestDispatcher) {
    let err = bike_dispatcher
        .get_or_create_active_batch(99)
        .expect_err("unknown courier");
    assert!(matches!(err, DispatchError::CourierNotFound { courier_id: 99 }));
}

#[rstest]
fn eligible_orders_lists_matching_undelivered_orders(bike_dispatcher: TestDispatcher) {
    let ids: Vec<_> = bike_dispatcher
        .eligible_orders(1)
        .expect("eligible orders")
        .iter()
        .map(|candidate| candidate.id)
        .collect();
    assert_eq!(ids, vec![11, 12, 13, 14]);

    assign(&bike_dispatcher, 1);
    bike_dispatcher.complete(1, 11, at(9, 30)).expect("complete");
    let remaining: Vec<_> = bike_dispatcher
        .eligible_orders(1)
        .expect("eligible orders")
        .iter()
        .map(|candidate| candidate.id)
        .collect();
    assert_eq!(remaining, vec![12, 13, 14]);
}

#[rstest]
fn downgrade_from_car_to_foot_repacks_open_batch() {
    let dispatcher = dispatcher_with(
        vec![courier(1, VehicleType::Car, &[1, 2], HOURS)],
        vec![
            order(1, 2_000, 1, SLOT),
            order(2, 1_500, 2, SLOT),
            order(3, 600, 1, SLOT),
            order(4, 400, 2, SLOT),
            order(5, 300, 1, SLOT),
        ],
    );
    assert_eq!(assign(&dispatcher, 1).order_ids, vec![1, 2, 3, 4, 5]);

    let update = CourierUpdate {
        courier_type: Some("foot".into()),
        ..CourierUpdate::default()
    };
    let outcome = dispatcher.update_courier(1, &update).expect("update");
    assert_eq!(outcome.courier.vehicle, VehicleType::Foot);
    assert_eq!(outcome.reconciliation.kept, vec![3, 4]);
    assert_eq!(outcome.reconciliation.released, vec![1, 2, 5]);

    let batch = dispatcher
        .store()
        .open_batch(1)
        .expect("load batch")
        .expect("batch still open");
    let load: Weight = batch.pending_orders().map(|member| member.weight).sum();
    assert!(load <= VehicleType::Foot.capacity());
    assert_eq!(batch.expected_reward, 4_500, "reward stays fixed at creation");
}

#[rstest]
fn narrowing_regions_releases_orders_to_other_couriers() {
    let dispatcher = dispatcher_with(
        vec![
            courier(1, VehicleType::Bike, &[1, 2], HOURS),
            courier(2, VehicleType::Bike, &[2], HOURS),
        ],
        vec![order(1, 100, 1, SLOT), order(2, 100, 2, SLOT)],
    );
    assign(&dispatcher, 1);
    assert!(
        dispatcher
            .get_or_create_active_batch(2)
            .expect("assign")
            .is_none()
    );

    let update = CourierUpdate {
        regions: Some(vec![1]),
        ..CourierUpdate::default()
    };
    let outcome = dispatcher.update_courier(1, &update).expect("update");
    assert_eq!(outcome.reconciliation.released, vec![2]);
    assert_eq!(assign(&dispatcher, 2).order_ids, vec![2]);
}

#[rstest]
fn reconcile_without_open_batch_is_a_no_op(bike_dispatcher: TestDispatcher) {
    let outcome = bike_dispatcher.reconcile(1).expect("reconcile");
    assert_eq!(outcome, ReconcileOutcome::default());
}

#[rstest]
fn reconcile_removes_batch_left_empty() {
    let dispatcher = dispatcher_with(
        vec![courier(1, VehicleType::Bike, &[1], HOURS)],
        vec![order(1, 100, 1, SLOT)],
    );
    assign(&dispatcher, 1);
    let update = CourierUpdate {
        working_hours: Some(vec!["19:00-21:00".into()]),
        ..CourierUpdate::default()
    };
    dispatcher.update_courier(1, &update).expect("update");
    assert_eq!(dispatcher.store().batch_count(), 0);
}

/// Memory store that records one completion the first time an order is
/// looked up, landing it between reconciliation's read and its detach.
struct CompletingStore {
    inner: MemoryStore,
    pending: Mutex<Option<(BatchId, OrderId, DateTime<Utc>, u64)>>,
}

impl DispatchStore for CompletingStore {
    fn courier(&self, id: CourierId) -> Result<Option<Courier>, StoreError> {
        self.inner.courier(id)
    }

    fn save_couriers(&self, couriers: &[Courier]) -> Result<(), StoreError> {
        self.inner.save_couriers(couriers)
    }

    fn replace_courier(&self, courier: &Courier) -> Result<(), StoreError> {
        self.inner.replace_courier(courier)
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        if let Some((batch_id, order_id, complete_time, delivery_time)) = self.pending.lock().take()
        {
            self.inner
                .record_completion(batch_id, order_id, complete_time, delivery_time)?;
        }
        self.inner.order(id)
    }

    fn save_orders(&self, orders: &[Order]) -> Result<(), StoreError> {
        self.inner.save_orders(orders)
    }

    fn orders_matching(
        &self,
        predicate: &dyn Fn(&Order) -> bool,
    ) -> Result<Vec<Order>, StoreError> {
        self.inner.orders_matching(predicate)
    }

    fn known_regions(&self) -> Result<BTreeSet<Region>, StoreError> {
        self.inner.known_regions()
    }

    fn upsert_regions(&self, regions: &BTreeSet<Region>) -> Result<(), StoreError> {
        self.inner.upsert_regions(regions)
    }

    fn known_time_windows(&self) -> Result<BTreeSet<TimeWindow>, StoreError> {
        self.inner.known_time_windows()
    }

    fn upsert_time_windows(&self, windows: &BTreeSet<TimeWindow>) -> Result<(), StoreError> {
        self.inner.upsert_time_windows(windows)
    }

    fn assigned_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError> {
        self.inner.assigned_order_ids()
    }

    fn completed_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError> {
        self.inner.completed_order_ids()
    }

    fn batches(&self, courier_id: CourierId) -> Result<Vec<Batch>, StoreError> {
        self.inner.batches(courier_id)
    }

    fn create_batch(&self, batch: NewBatch) -> Result<Batch, StoreError> {
        self.inner.create_batch(batch)
    }

    fn detach_orders(
        &self,
        batch_id: BatchId,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderId>, StoreError> {
        self.inner.detach_orders(batch_id, order_ids)
    }

    fn record_completion(
        &self,
        batch_id: BatchId,
        order_id: OrderId,
        complete_time: DateTime<Utc>,
        delivery_time: u64,
    ) -> Result<(), StoreError> {
        self.inner
            .record_completion(batch_id, order_id, complete_time, delivery_time)
    }
}

#[rstest]
fn reconcile_keeps_completion_landing_mid_way() {
    let dispatcher = Dispatcher::with_clock(
        CompletingStore {
            inner: MemoryStore::with_entities(
                vec![courier(1, VehicleType::Bike, &[1, 2], HOURS)],
                vec![order(1, 100, 1, SLOT), order(2, 100, 2, SLOT)],
            ),
            pending: Mutex::new(None),
        },
        ExhaustivePacker,
        FixedClock::new(at(9, 0)),
        DispatchConfig::default(),
    );
    let batch_id = dispatcher
        .get_or_create_active_batch(1)
        .expect("assign")
        .expect("orders are available")
        .batch_id;
    *dispatcher.store().pending.lock() = Some((batch_id, 2, at(9, 20), 1_200));

    let update = CourierUpdate {
        regions: Some(vec![1]),
        ..CourierUpdate::default()
    };
    let outcome = dispatcher.update_courier(1, &update).expect("update");

    assert!(outcome.reconciliation.released.is_empty());
    assert_eq!(outcome.reconciliation.kept, vec![1]);
    assert_eq!(
        dispatcher.store().completed_order_ids().expect("completed"),
        BTreeSet::from([2])
    );
    assert_eq!(dispatcher.earnings(1).expect("earnings"), 2_500);
    assert_eq!(dispatcher.rating(1).expect("rating"), Some(3.33));
}

#[rstest]
fn reconcile_and_completion_do_not_lose_deliveries() {
    let dispatcher = Arc::new(dispatcher_with(
        vec![courier(1, VehicleType::Bike, &[1, 2], HOURS)],
        vec![order(1, 100, 1, SLOT), order(2, 100, 2, SLOT)],
    ));
    assign(&dispatcher, 1);
    let narrow = CourierUpdate {
        regions: Some(vec![1]),
        ..CourierUpdate::default()
    };

    let completion = thread::scope(|scope| {
        let completing = Arc::clone(&dispatcher);
        let handle = scope.spawn(move || completing.complete(1, 2, at(9, 20)));
        let updating = Arc::clone(&dispatcher);
        let _updater = scope.spawn(move || updating.update_courier(1, &narrow).expect("update"));
        handle.join().expect("completion thread")
    });

    let completed = dispatcher.store().completed_order_ids().expect("completed");
    match completion {
        Ok(order_id) => {
            assert_eq!(order_id, 2);
            assert!(completed.contains(&2), "reported delivery was lost");
        }
        Err(DispatchError::AssignmentNotFound { .. }) => assert!(!completed.contains(&2)),
        Err(other) => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn delivery_time_is_measured_from_previous_completion(bike_dispatcher: TestDispatcher) {
    assign(&bike_dispatcher, 1);
    bike_dispatcher.complete(1, 12, at(9, 10)).expect("first");
    bike_dispatcher.complete(1, 11, at(9, 25)).expect("second");

    let batch = bike_dispatcher
        .store()
        .open_batch(1)
        .expect("load batch")
        .expect("batch still open");
    let duration = |id| batch.order(id).and_then(|member| member.delivery_time);
    assert_eq!(duration(12), Some(600));
    assert_eq!(duration(11), Some(900));
}

#[rstest]
fn completion_is_idempotent(bike_dispatcher: TestDispatcher) {
    assign(&bike_dispatcher, 1);
    assert_eq!(bike_dispatcher.complete(1, 11, at(9, 10)).expect("first"), 11);
    assert_eq!(bike_dispatcher.complete(1, 11, at(9, 50)).expect("repeat"), 11);

    let batches = bike_dispatcher.store().batches(1).expect("batches");
    let member = batches
        .first()
        .and_then(|batch| batch.order(11))
        .expect("member");
    assert_eq!(member.complete_time, Some(at(9, 10)));
    assert_eq!(member.delivery_time, Some(600));
}

#[rstest]
fn completion_before_marker_is_rejected(bike_dispatcher: TestDispatcher) {
    assign(&bike_dispatcher, 1);
    let err = bike_dispatcher
        .complete(1, 11, at(8, 59))
        .expect_err("precedes assignment");
    assert!(matches!(err, DispatchError::InvalidTime { order_id: 11, .. }));

    bike_dispatcher.complete(1, 12, at(9, 30)).expect("complete");
    let late = bike_dispatcher
        .complete(1, 11, at(9, 20))
        .expect_err("precedes previous completion");
    assert!(matches!(late, DispatchError::InvalidTime { .. }));
}

#[rstest]
fn completion_requires_own_assignment() {
    let dispatcher = dispatcher_with(
        vec![
            courier(1, VehicleType::Bike, &[1], HOURS),
            courier(2, VehicleType::Bike, &[1], HOURS),
        ],
        vec![order(1, 100, 1, SLOT), order(2, 100, 1, SLOT)],
    );
    assign(&dispatcher, 1);
    let err = dispatcher
        .complete(2, 1, at(9, 30))
        .expect_err("belongs to courier 1");
    assert!(matches!(
        err,
        DispatchError::AssignmentNotFound {
            courier_id: 2,
            order_id: 1
        }
    ));
}

#[rstest]
fn closed_batch_gives_way_to_a_new_one() {
    let dispatcher = dispatcher_with(
        vec![courier(1, VehicleType::Foot, &[1], HOURS)],
        vec![order(1, 600, 1, SLOT), order(2, 600, 1, SLOT)],
    );
    let first = assign(&dispatcher, 1);
    assert_eq!(first.order_ids, vec![1]);
    dispatcher.complete(1, 1, at(9, 30)).expect("complete");

    let second = assign(&dispatcher, 1);
    assert_ne!(second.batch_id, first.batch_id);
    assert_eq!(second.order_ids, vec![2]);
}

#[rstest]
fn rating_is_absent_without_deliveries(bike_dispatcher: TestDispatcher) {
    assign(&bike_dispatcher, 1);
    assert_eq!(bike_dispatcher.rating(1).expect("rating"), None);
    assert_eq!(bike_dispatcher.earnings(1).expect("earnings"), 0);
}

#[rstest]
fn rating_uses_fastest_region_average() {
    let dispatcher = dispatcher_with(
        vec![courier(1, VehicleType::Bike, &[1, 2], HOURS)],
        vec![order(1, 100, 1, SLOT), order(2, 100, 2, SLOT)],
    );
    assign(&dispatcher, 1);
    // Region 1 takes 600s, region 2 takes 200s.
    dispatcher.complete(1, 1, at(9, 10)).expect("complete");
    let second = at(9, 10) + chrono::Duration::seconds(200);
    dispatcher.complete(1, 2, second).expect("complete");

    assert_eq!(dispatcher.rating(1).expect("rating"), Some(4.72));
    assert_eq!(dispatcher.earnings(1).expect("earnings"), 2_500);

    let report = dispatcher.courier_report(1).expect("report");
    assert_eq!(report.rating, Some(4.72));
    assert_eq!(report.earnings, 2_500);
}

#[rstest]
fn registration_is_all_or_nothing() {
    let dispatcher = dispatcher_with(vec![courier(1, VehicleType::Car, &[1], HOURS)], vec![]);
    let drafts = [
        CourierDraft {
            courier_id: 2,
            courier_type: "bike".into(),
            regions: vec![1],
            working_hours: vec!["09:00-12:00".into()],
        },
        CourierDraft {
            courier_id: 1,
            courier_type: "foot".into(),
            regions: vec![1],
            working_hours: vec![],
        },
        CourierDraft {
            courier_id: 3,
            courier_type: "rocket".into(),
            regions: vec![1],
            working_hours: vec![],
        },
    ];
    let err = dispatcher
        .register_couriers(&drafts)
        .expect_err("contains invalid drafts");
    match err {
        DispatchError::Rejected { entity, ids } => {
            assert_eq!(entity, EntityKind::Courier);
            assert_eq!(ids, vec![1, 3]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(dispatcher.store().courier(2).expect("load").is_none());
}

#[rstest]
fn racing_registrations_keep_the_first_courier() {
    let dispatcher = Arc::new(dispatcher_with(vec![], vec![]));
    let drafts: Vec<_> = ["car", "foot", "bike", "car"]
        .into_iter()
        .map(|courier_type| CourierDraft {
            courier_id: 1,
            courier_type: courier_type.into(),
            regions: vec![1],
            working_hours: vec!["09:00-12:00".into()],
        })
        .collect();

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = drafts
            .iter()
            .map(|draft| {
                let shared = Arc::clone(&dispatcher);
                scope.spawn(move || {
                    shared
                        .register_couriers(std::slice::from_ref(draft))
                        .map(|_| draft.courier_type.clone())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("registration thread"))
            .collect()
    });

    let mut winners = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(courier_type) => winners.push(courier_type),
            Err(DispatchError::Rejected { entity, ids }) => {
                assert_eq!((entity, ids), (EntityKind::Courier, vec![1]));
            }
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one registration wins");
    let stored = dispatcher.store().courier(1).expect("load").expect("stored");
    assert_eq!(stored.vehicle.as_str(), winners[0]);
}

#[rstest]
fn registering_stored_order_leaves_it_unchanged() {
    let dispatcher = dispatcher_with(vec![], vec![order(5, 200, 1, SLOT)]);
    let err = dispatcher
        .register_orders(&[OrderDraft {
            order_id: 5,
            weight: 40.0,
            region: 3,
            delivery_hours: vec!["18:00-19:00".into()],
        }])
        .expect_err("order 5 is stored");
    assert!(matches!(
        err,
        DispatchError::Rejected { entity: EntityKind::Order, ref ids } if ids == &[5]
    ));
    assert_eq!(
        dispatcher.store().order(5).expect("load"),
        Some(order(5, 200, 1, SLOT))
    );
}

#[rstest]
fn registration_upserts_references_when_allowed() {
    let dispatcher = dispatcher_with(vec![], vec![]);
    let ids = dispatcher
        .register_orders(&[OrderDraft {
            order_id: 5,
            weight: 1.25,
            region: 7,
            delivery_hours: vec!["10:00-11:00".into()],
        }])
        .expect("register");
    assert_eq!(ids, vec![5]);
    let regions = dispatcher.store().known_regions().expect("regions");
    assert!(regions.contains(&Region::new(7).expect("region")));
}

#[rstest]
fn registration_rejects_unknown_references_when_disallowed() {
    let dispatcher = Dispatcher::with_clock(
        MemoryStore::default(),
        ExhaustivePacker,
        FixedClock::new(at(9, 0)),
        DispatchConfig {
            allow_new_regions_and_windows: false,
            ..DispatchConfig::default()
        },
    );
    let err = dispatcher
        .register_orders(&[OrderDraft {
            order_id: 5,
            weight: 1.0,
            region: 7,
            delivery_hours: vec!["10:00-11:00".into()],
        }])
        .expect_err("unknown region");
    assert!(matches!(err, DispatchError::Rejected { ids, .. } if ids == vec![5]));
}

#[rstest]
fn invalid_update_changes_nothing(bike_dispatcher: TestDispatcher) {
    let update = CourierUpdate {
        courier_type: Some("train".into()),
        ..CourierUpdate::default()
    };
    let err = bike_dispatcher
        .update_courier(1, &update)
        .expect_err("unknown vehicle");
    assert!(matches!(err, DispatchError::InvalidCourierUpdate { courier_id: 1, .. }));
    let stored = bike_dispatcher.store().courier(1).expect("load").expect("exists");
    assert_eq!(stored.vehicle, VehicleType::Bike);
}

#[rstest]
fn concurrent_assignments_never_share_an_order() {
    let couriers = (1..=4)
        .map(|id| courier(id, VehicleType::Car, &[1], HOURS))
        .collect();
    let orders = (1..=12).map(|id| order(id, 900, 1, SLOT)).collect();
    let dispatcher = Arc::new(dispatcher_with(couriers, orders));

    thread::scope(|scope| {
        for courier_id in 1..=4 {
            let shared = Arc::clone(&dispatcher);
            scope.spawn(move || match shared.get_or_create_active_batch(courier_id) {
                Ok(_) | Err(DispatchError::AssignmentConflict { .. }) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            });
        }
    });

    let mut seen = std::collections::BTreeSet::new();
    for courier_id in 1..=4 {
        for batch in dispatcher.store().batches(courier_id).expect("batches") {
            for member in &batch.orders {
                assert!(seen.insert(member.order_id), "order {} shared", member.order_id);
            }
        }
    }
}
