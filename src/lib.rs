//! Facade crate for the courier dispatch engine.
//!
//! This crate re-exports the core domain types and exposes the optional
//! packer and store implementations behind feature flags.

#![forbid(unsafe_code)]

pub use dispatch_core::{
    Assignment, Batch, Clock, Courier, CourierDraft, CourierId, CourierReport, CourierUpdate, CourierUpdateOutcome,
    DispatchConfig, DispatchError, DispatchStore, Dispatcher, EntityKind, Order, OrderDraft,
    OrderId, PackItem, Packer, ReconcileOutcome, Region, StoreError, SystemClock, TimeWindow,
    VehicleType, Weight,
};

#[cfg(feature = "store-sqlite")]
pub use dispatch_core::{SqliteStore, SqliteStoreError};

#[cfg(feature = "packer-knapsack")]
pub use dispatch_packer::KnapsackPacker;
