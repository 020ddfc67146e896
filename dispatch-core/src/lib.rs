//! Core domain types and operations for courier dispatch.
//!
//! Couriers carry orders in batches. This crate models the entities, decides
//! which orders a courier may take, keeps at most one open batch per courier,
//! and derives ratings and earnings from completed deliveries. Packing and
//! persistence sit behind the [`Packer`] and [`DispatchStore`] traits so
//! implementations can live in their own crates.

#![forbid(unsafe_code)]

mod batch;
mod clock;
mod config;
mod courier;
mod dispatcher;
pub mod eligibility;
mod error;
mod intake;
mod locks;
pub mod metrics;
mod order;
mod packer;
mod region;
pub mod store;
mod time_window;
mod vehicle;
mod weight;

pub use batch::{Batch, BatchId, BatchOrder, NewBatch};
pub use clock::{Clock, SystemClock};
pub use config::{DEFAULT_BASE_RATE, DispatchConfig};
pub use courier::{Courier, CourierId};
pub use dispatcher::{
    Assignment, CourierReport, CourierUpdateOutcome, Dispatcher, ReconcileOutcome,
};
pub use eligibility::{CompletedOrders, is_eligible};
pub use error::DispatchError;
pub use intake::{CourierDraft, CourierUpdate, EntityKind, FieldError, OrderDraft};
pub use locks::{KeyGuard, LockRegistry};
pub use metrics::{DeliveryRecord, earnings, rating};
pub use order::{MAX_ORDER_WEIGHT, MIN_ORDER_WEIGHT, Order, OrderError, OrderId};
pub use packer::{PackItem, Packer, ensure_valid_selection};
pub use region::{InvalidRegionCode, Region};
pub use store::{DispatchStore, StoreError};
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteStore, SqliteStoreError};
pub use time_window::{TimeWindow, TimeWindowError, parse_bounds};
pub use vehicle::{UnknownVehicleType, VehicleType};
pub use weight::{Weight, WeightError};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
