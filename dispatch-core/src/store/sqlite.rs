//! SQLite-backed dispatch repository.
//!
//! Every write that touches more than one row runs in a transaction. The
//! connection sits behind a mutex so a single store can be shared between
//! threads; `batch_orders.order_id` is `UNIQUE`, so no order can belong to
//! two batches even across processes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use thiserror::Error;

use super::{DispatchStore, StoreError};
use crate::{
    Batch, BatchId, BatchOrder, Courier, CourierId, NewBatch, Order, OrderId, Region, TimeWindow,
    VehicleType, Weight,
};

/// Version recorded in `dispatch_schema_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &[(&str, &str)] = &[
    (
        "create regions",
        "CREATE TABLE IF NOT EXISTS regions (
            code INTEGER PRIMARY KEY CHECK (code > 0)
        )",
    ),
    (
        "create time_windows",
        "CREATE TABLE IF NOT EXISTS time_windows (
            key TEXT PRIMARY KEY CHECK (length(key) = 11),
            begin_minute INTEGER NOT NULL,
            end_minute INTEGER NOT NULL
        ) WITHOUT ROWID",
    ),
    (
        "create couriers",
        "CREATE TABLE IF NOT EXISTS couriers (
            id INTEGER PRIMARY KEY,
            vehicle TEXT NOT NULL
        )",
    ),
    (
        "create courier_regions",
        "CREATE TABLE IF NOT EXISTS courier_regions (
            courier_id INTEGER NOT NULL,
            region INTEGER NOT NULL,
            PRIMARY KEY (courier_id, region),
            FOREIGN KEY (courier_id) REFERENCES couriers(id) ON DELETE CASCADE
        ) WITHOUT ROWID",
    ),
    (
        "create courier_hours",
        "CREATE TABLE IF NOT EXISTS courier_hours (
            courier_id INTEGER NOT NULL,
            window_key TEXT NOT NULL,
            PRIMARY KEY (courier_id, window_key),
            FOREIGN KEY (courier_id) REFERENCES couriers(id) ON DELETE CASCADE
        ) WITHOUT ROWID",
    ),
    (
        "create orders",
        "CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY,
            weight INTEGER NOT NULL CHECK (weight > 0),
            region INTEGER NOT NULL
        )",
    ),
    (
        "create order_hours",
        "CREATE TABLE IF NOT EXISTS order_hours (
            order_id INTEGER NOT NULL,
            window_key TEXT NOT NULL,
            PRIMARY KEY (order_id, window_key),
            FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
        ) WITHOUT ROWID",
    ),
    (
        "create batches",
        "CREATE TABLE IF NOT EXISTS batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            courier_id INTEGER NOT NULL REFERENCES couriers(id),
            assign_time TEXT NOT NULL,
            expected_reward INTEGER NOT NULL
        )",
    ),
    (
        "create batch_orders",
        "CREATE TABLE IF NOT EXISTS batch_orders (
            batch_id INTEGER NOT NULL,
            order_id INTEGER NOT NULL UNIQUE REFERENCES orders(id),
            weight INTEGER NOT NULL,
            complete_time TEXT,
            delivery_time INTEGER,
            PRIMARY KEY (batch_id, order_id),
            FOREIGN KEY (batch_id) REFERENCES batches(id) ON DELETE CASCADE
        ) WITHOUT ROWID",
    ),
    (
        "index batches by courier",
        "CREATE INDEX IF NOT EXISTS idx_batches_courier ON batches(courier_id, id)",
    ),
    (
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS dispatch_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0)
        ) WITHOUT ROWID",
    ),
];

/// Errors raised while opening a [`SqliteStore`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A schema step failed.
    #[error("failed to execute schema step '{step}'")]
    Schema {
        /// Step that failed.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database was created by an incompatible version.
    #[error("expected dispatch schema version {expected} but found {found}")]
    VersionMismatch {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}

/// Dispatch repository persisted in a SQLite database.
pub struct SqliteStore {
    connection: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open the database at `path`, creating it and its schema if needed.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] when the file cannot be opened or the
    /// schema cannot be created or does not match.
    pub fn open<P>(path: P) -> Result<Self, SqliteStoreError>
    where
        P: AsRef<Path>,
    {
        let location = path.as_ref();
        let connection =
            Connection::open(location).map_err(|source| SqliteStoreError::OpenDatabase {
                path: location.to_path_buf(),
                source,
            })?;
        Self::initialise(connection, Some(location.to_path_buf()))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteStoreError::OpenDatabase {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::initialise(connection, None)
    }

    /// Path of the database file, or `None` for in-memory stores.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn initialise(
        mut connection: Connection,
        location: Option<PathBuf>,
    ) -> Result<Self, SqliteStoreError> {
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(|source| SqliteStoreError::Schema {
                step: "enable foreign keys",
                source,
            })?;
        let transaction = connection
            .transaction()
            .map_err(|source| SqliteStoreError::Schema {
                step: "begin schema transaction",
                source,
            })?;
        for &(step, sql) in SCHEMA {
            transaction
                .execute(sql, [])
                .map_err(|source| SqliteStoreError::Schema { step, source })?;
        }
        ensure_schema_version(&transaction)?;
        transaction
            .commit()
            .map_err(|source| SqliteStoreError::Schema {
                step: "commit schema transaction",
                source,
            })?;
        Ok(Self {
            connection: Mutex::new(connection),
            location,
        })
    }
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SqliteStoreError> {
    let existing: Option<i64> = transaction
        .query_row(
            "SELECT version FROM dispatch_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SqliteStoreError::Schema {
            step: "read schema version",
            source,
        })?;
    match existing {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SqliteStoreError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO dispatch_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SqliteStoreError::Schema {
                step: "record schema version",
                source,
            }),
    }
}

/// Map a `rusqlite` failure onto [`StoreError::Backend`].
fn backend(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::backend(operation, source)
}

fn invalid(entity: &'static str, id: u64, reason: &dyn fmt::Display) -> StoreError {
    StoreError::InvalidRecord {
        entity,
        id,
        reason: reason.to_string(),
    }
}

fn parse_region(entity: &'static str, id: u64, code: u32) -> Result<Region, StoreError> {
    Region::new(code).map_err(|err| invalid(entity, id, &err))
}

fn parse_window(entity: &'static str, id: u64, key: &str) -> Result<TimeWindow, StoreError> {
    TimeWindow::parse(key).map_err(|err| invalid(entity, id, &err))
}

fn load_courier(connection: &Connection, id: CourierId) -> Result<Option<Courier>, StoreError> {
    let stored_vehicle: Option<String> = connection
        .query_row("SELECT vehicle FROM couriers WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()
        .map_err(backend("load courier"))?;
    let Some(vehicle_name) = stored_vehicle else {
        return Ok(None);
    };
    let vehicle: VehicleType = vehicle_name
        .parse()
        .map_err(|err| invalid("courier", id, &err))?;

    let mut regions_query = connection
        .prepare_cached("SELECT region FROM courier_regions WHERE courier_id = ?1")
        .map_err(backend("prepare courier regions"))?;
    let codes = regions_query
        .query_map([id], |row| row.get::<_, u32>(0))
        .and_then(Iterator::collect::<Result<Vec<_>, _>>)
        .map_err(backend("load courier regions"))?;
    let regions = codes
        .into_iter()
        .map(|code| parse_region("courier", id, code))
        .collect::<Result<BTreeSet<_>, _>>()?;

    let mut hours_query = connection
        .prepare_cached("SELECT window_key FROM courier_hours WHERE courier_id = ?1")
        .map_err(backend("prepare courier hours"))?;
    let keys = hours_query
        .query_map([id], |row| row.get::<_, String>(0))
        .and_then(Iterator::collect::<Result<Vec<_>, _>>)
        .map_err(backend("load courier hours"))?;
    let working_hours = keys
        .iter()
        .map(|key| parse_window("courier", id, key))
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(Some(Courier {
        id,
        vehicle,
        regions,
        working_hours,
    }))
}

/// Raw `orders` row: identifier, weight in hundredths, region code.
type OrderRow = (OrderId, u32, u32);

fn build_orders(
    rows: Vec<OrderRow>,
    mut hours: BTreeMap<OrderId, Vec<String>>,
) -> Result<Vec<Order>, StoreError> {
    rows.into_iter()
        .map(|(id, hundredths, code)| {
            let region = parse_region("order", id, code)?;
            let delivery_hours = hours
                .remove(&id)
                .unwrap_or_default()
                .iter()
                .map(|key| parse_window("order", id, key))
                .collect::<Result<BTreeSet<_>, _>>()?;
            Order::new(id, Weight::from_hundredths(hundredths), region, delivery_hours)
                .map_err(|err| invalid("order", id, &err))
        })
        .collect()
}

fn load_order_hours(
    connection: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<BTreeMap<OrderId, Vec<String>>, StoreError> {
    let mut statement = connection
        .prepare_cached(sql)
        .map_err(backend("prepare order hours"))?;
    let rows = statement
        .query_map(params, |row| Ok((row.get::<_, OrderId>(0)?, row.get::<_, String>(1)?)))
        .and_then(Iterator::collect::<Result<Vec<_>, _>>)
        .map_err(backend("load order hours"))?;
    let mut hours: BTreeMap<OrderId, Vec<String>> = BTreeMap::new();
    for (order_id, key) in rows {
        hours.entry(order_id).or_default().push(key);
    }
    Ok(hours)
}

fn load_members(connection: &Connection, batch_id: BatchId) -> Result<Vec<BatchOrder>, StoreError> {
    let mut statement = connection
        .prepare_cached(
            "SELECT order_id, weight, complete_time, delivery_time
             FROM batch_orders WHERE batch_id = ?1
             ORDER BY weight, order_id",
        )
        .map_err(backend("prepare batch members"))?;
    statement
        .query_map([batch_id], |row| {
            Ok(BatchOrder {
                order_id: row.get(0)?,
                weight: Weight::from_hundredths(row.get(1)?),
                complete_time: row.get::<_, Option<DateTime<Utc>>>(2)?,
                delivery_time: row.get(3)?,
            })
        })
        .and_then(Iterator::collect)
        .map_err(backend("load batch members"))
}

fn batch_exists(connection: &Connection, batch_id: BatchId) -> Result<bool, StoreError> {
    connection
        .query_row("SELECT 1 FROM batches WHERE id = ?1", [batch_id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(backend("look up batch"))
}

/// Identifiers among `ids` that are already stored or repeat within `ids`.
fn taken_ids(
    transaction: &Transaction<'_>,
    lookup: &str,
    ids: impl IntoIterator<Item = u64>,
) -> Result<Vec<u64>, StoreError> {
    let mut statement = transaction
        .prepare(lookup)
        .map_err(backend("prepare identifier lookup"))?;
    let mut seen = BTreeSet::new();
    let mut taken = Vec::new();
    for id in ids {
        let stored = statement
            .query_row([id], |_| Ok(()))
            .optional()
            .map_err(backend("look up identifier"))?
            .is_some();
        if !seen.insert(id) || stored {
            taken.push(id);
        }
    }
    Ok(taken)
}

fn insert_courier(transaction: &Transaction<'_>, courier: &Courier) -> Result<(), StoreError> {
    transaction
        .execute(
            "INSERT INTO couriers (id, vehicle) VALUES (?1, ?2)",
            params![courier.id, courier.vehicle.as_str()],
        )
        .map_err(backend("write courier"))?;
    write_courier_attributes(transaction, courier)
}

fn write_courier_attributes(
    transaction: &Transaction<'_>,
    courier: &Courier,
) -> Result<(), StoreError> {
    transaction
        .execute(
            "DELETE FROM courier_regions WHERE courier_id = ?1",
            [courier.id],
        )
        .map_err(backend("clear courier regions"))?;
    transaction
        .execute("DELETE FROM courier_hours WHERE courier_id = ?1", [courier.id])
        .map_err(backend("clear courier hours"))?;
    for region in &courier.regions {
        transaction
            .execute(
                "INSERT INTO courier_regions (courier_id, region) VALUES (?1, ?2)",
                params![courier.id, region.code()],
            )
            .map_err(backend("write courier region"))?;
    }
    for window in &courier.working_hours {
        transaction
            .execute(
                "INSERT INTO courier_hours (courier_id, window_key) VALUES (?1, ?2)",
                params![courier.id, window.key()],
            )
            .map_err(backend("write courier hours"))?;
    }
    Ok(())
}

fn insert_order(transaction: &Transaction<'_>, order: &Order) -> Result<(), StoreError> {
    transaction
        .execute(
            "INSERT INTO orders (id, weight, region) VALUES (?1, ?2, ?3)",
            params![order.id, order.weight.hundredths(), order.region.code()],
        )
        .map_err(backend("write order"))?;
    for window in &order.delivery_hours {
        transaction
            .execute(
                "INSERT INTO order_hours (order_id, window_key) VALUES (?1, ?2)",
                params![order.id, window.key()],
            )
            .map_err(backend("write order hours"))?;
    }
    Ok(())
}

impl SqliteStore {
    /// Run `work` inside a transaction, committing when it succeeds.
    fn in_transaction<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut connection = self.connection.lock();
        let transaction = connection
            .transaction()
            .map_err(backend("begin transaction"))?;
        let value = work(&transaction)?;
        transaction
            .commit()
            .map_err(backend("commit transaction"))?;
        Ok(value)
    }

    fn order_ids(&self, sql: &str, operation: &'static str) -> Result<BTreeSet<OrderId>, StoreError> {
        let connection = self.connection.lock();
        let mut statement = connection.prepare_cached(sql).map_err(backend(operation))?;
        statement
            .query_map([], |row| row.get::<_, OrderId>(0))
            .and_then(Iterator::collect)
            .map_err(backend(operation))
    }
}

impl DispatchStore for SqliteStore {
    fn courier(&self, id: CourierId) -> Result<Option<Courier>, StoreError> {
        load_courier(&self.connection.lock(), id)
    }

    fn save_couriers(&self, couriers: &[Courier]) -> Result<(), StoreError> {
        self.in_transaction(|transaction| {
            let taken = taken_ids(
                transaction,
                "SELECT 1 FROM couriers WHERE id = ?1",
                couriers.iter().map(|courier| courier.id),
            )?;
            if !taken.is_empty() {
                return Err(StoreError::AlreadyStored {
                    entity: "courier",
                    ids: taken,
                });
            }
            couriers
                .iter()
                .try_for_each(|courier| insert_courier(transaction, courier))
        })
    }

    fn replace_courier(&self, courier: &Courier) -> Result<(), StoreError> {
        self.in_transaction(|transaction| {
            let updated = transaction
                .execute(
                    "UPDATE couriers SET vehicle = ?2 WHERE id = ?1",
                    params![courier.id, courier.vehicle.as_str()],
                )
                .map_err(backend("update courier"))?;
            if updated == 0 {
                return Err(StoreError::MissingCourier {
                    courier_id: courier.id,
                });
            }
            write_courier_attributes(transaction, courier)
        })
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let connection = self.connection.lock();
        let row: Option<OrderRow> = connection
            .query_row(
                "SELECT id, weight, region FROM orders WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(backend("load order"))?;
        let Some(found) = row else {
            return Ok(None);
        };
        let hours = load_order_hours(
            &connection,
            "SELECT order_id, window_key FROM order_hours WHERE order_id = ?1",
            [id],
        )?;
        Ok(build_orders(vec![found], hours)?.pop())
    }

    fn save_orders(&self, orders: &[Order]) -> Result<(), StoreError> {
        self.in_transaction(|transaction| {
            let taken = taken_ids(
                transaction,
                "SELECT 1 FROM orders WHERE id = ?1",
                orders.iter().map(|order| order.id),
            )?;
            if !taken.is_empty() {
                return Err(StoreError::AlreadyStored {
                    entity: "order",
                    ids: taken,
                });
            }
            orders
                .iter()
                .try_for_each(|order| insert_order(transaction, order))
        })
    }

    fn orders_matching(
        &self,
        predicate: &dyn Fn(&Order) -> bool,
    ) -> Result<Vec<Order>, StoreError> {
        let connection = self.connection.lock();
        let mut statement = connection
            .prepare_cached("SELECT id, weight, region FROM orders ORDER BY id")
            .map_err(backend("prepare orders"))?;
        let rows: Vec<OrderRow> = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .and_then(Iterator::collect)
            .map_err(backend("load orders"))?;
        let hours = load_order_hours(
            &connection,
            "SELECT order_id, window_key FROM order_hours",
            [],
        )?;
        let mut orders = build_orders(rows, hours)?;
        orders.retain(|order| predicate(order));
        Ok(orders)
    }

    fn known_regions(&self) -> Result<BTreeSet<Region>, StoreError> {
        let connection = self.connection.lock();
        let mut statement = connection
            .prepare_cached("SELECT code FROM regions")
            .map_err(backend("prepare regions"))?;
        let codes: Vec<u32> = statement
            .query_map([], |row| row.get(0))
            .and_then(Iterator::collect)
            .map_err(backend("load regions"))?;
        codes
            .into_iter()
            .map(|code| parse_region("region", u64::from(code), code))
            .collect()
    }

    fn upsert_regions(&self, regions: &BTreeSet<Region>) -> Result<(), StoreError> {
        self.in_transaction(|transaction| {
            for region in regions {
                transaction
                    .execute(
                        "INSERT OR IGNORE INTO regions (code) VALUES (?1)",
                        [region.code()],
                    )
                    .map_err(backend("write region"))?;
            }
            Ok(())
        })
    }

    fn known_time_windows(&self) -> Result<BTreeSet<TimeWindow>, StoreError> {
        let connection = self.connection.lock();
        let mut statement = connection
            .prepare_cached("SELECT key FROM time_windows")
            .map_err(backend("prepare time windows"))?;
        let keys: Vec<String> = statement
            .query_map([], |row| row.get(0))
            .and_then(Iterator::collect)
            .map_err(backend("load time windows"))?;
        keys.iter()
            .map(|key| parse_window("time window", 0, key))
            .collect()
    }

    fn upsert_time_windows(&self, windows: &BTreeSet<TimeWindow>) -> Result<(), StoreError> {
        self.in_transaction(|transaction| {
            for window in windows {
                // Bounds are derived from the key on every write.
                transaction
                    .execute(
                        "INSERT INTO time_windows (key, begin_minute, end_minute)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT(key) DO UPDATE SET
                            begin_minute = excluded.begin_minute,
                            end_minute = excluded.end_minute",
                        params![window.key(), window.begin(), window.end()],
                    )
                    .map_err(backend("write time window"))?;
            }
            Ok(())
        })
    }

    fn assigned_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError> {
        self.order_ids("SELECT order_id FROM batch_orders", "load assigned orders")
    }

    fn completed_order_ids(&self) -> Result<BTreeSet<OrderId>, StoreError> {
        self.order_ids(
            "SELECT order_id FROM batch_orders WHERE complete_time IS NOT NULL",
            "load completed orders",
        )
    }

    fn batches(&self, courier_id: CourierId) -> Result<Vec<Batch>, StoreError> {
        let connection = self.connection.lock();
        let mut statement = connection
            .prepare_cached(
                "SELECT id, assign_time, expected_reward FROM batches
                 WHERE courier_id = ?1 ORDER BY id",
            )
            .map_err(backend("prepare batches"))?;
        let headers: Vec<(BatchId, DateTime<Utc>, u64)> = statement
            .query_map([courier_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .and_then(Iterator::collect)
            .map_err(backend("load batches"))?;
        headers
            .into_iter()
            .map(|(id, assign_time, expected_reward)| {
                Ok(Batch {
                    id,
                    courier_id,
                    assign_time,
                    expected_reward,
                    orders: load_members(&connection, id)?,
                })
            })
            .collect()
    }

    fn create_batch(&self, batch: NewBatch) -> Result<Batch, StoreError> {
        self.in_transaction(|transaction| {
            for member in &batch.orders {
                let order_id = member.order_id;
                let state: Option<bool> = transaction
                    .query_row(
                        "SELECT EXISTS (SELECT 1 FROM batch_orders WHERE order_id = ?1)
                         FROM orders WHERE id = ?1",
                        [order_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(backend("check order membership"))?;
                match state {
                    None => return Err(StoreError::MissingOrder { order_id }),
                    Some(true) => return Err(StoreError::OrderAlreadyAssigned { order_id }),
                    Some(false) => {}
                }
            }
            transaction
                .execute(
                    "INSERT INTO batches (courier_id, assign_time, expected_reward)
                     VALUES (?1, ?2, ?3)",
                    params![batch.courier_id, batch.assign_time, batch.expected_reward],
                )
                .map_err(backend("write batch"))?;
            let id = BatchId::try_from(transaction.last_insert_rowid())
                .map_err(|err| invalid("batch", 0, &err))?;
            for member in &batch.orders {
                transaction
                    .execute(
                        "INSERT INTO batch_orders (batch_id, order_id, weight) VALUES (?1, ?2, ?3)",
                        params![id, member.order_id, member.weight.hundredths()],
                    )
                    .map_err(backend("write batch member"))?;
            }
            Ok(batch.into_batch(id))
        })
    }

    fn detach_orders(
        &self,
        batch_id: BatchId,
        order_ids: &[OrderId],
    ) -> Result<Vec<OrderId>, StoreError> {
        self.in_transaction(|transaction| {
            if !batch_exists(transaction, batch_id)? {
                return Err(StoreError::MissingBatch { batch_id });
            }
            let mut detached = Vec::with_capacity(order_ids.len());
            for order_id in order_ids {
                let removed = transaction
                    .execute(
                        "DELETE FROM batch_orders
                         WHERE batch_id = ?1 AND order_id = ?2 AND complete_time IS NULL",
                        params![batch_id, order_id],
                    )
                    .map_err(backend("detach order"))?;
                if removed > 0 {
                    detached.push(*order_id);
                }
            }
            transaction
                .execute(
                    "DELETE FROM batches WHERE id = ?1
                     AND NOT EXISTS (SELECT 1 FROM batch_orders WHERE batch_id = ?1)",
                    [batch_id],
                )
                .map_err(backend("remove empty batch"))?;
            Ok(detached)
        })
    }

    fn record_completion(
        &self,
        batch_id: BatchId,
        order_id: OrderId,
        complete_time: DateTime<Utc>,
        delivery_time: u64,
    ) -> Result<(), StoreError> {
        self.in_transaction(|transaction| {
            let updated = transaction
                .execute(
                    "UPDATE batch_orders SET complete_time = ?3, delivery_time = ?4
                     WHERE batch_id = ?1 AND order_id = ?2",
                    params![batch_id, order_id, complete_time, delivery_time],
                )
                .map_err(backend("record completion"))?;
            if updated > 0 {
                Ok(())
            } else if batch_exists(transaction, batch_id)? {
                Err(StoreError::MissingBatchOrder { batch_id, order_id })
            } else {
                Err(StoreError::MissingBatch { batch_id })
            }
        })
    }
}
