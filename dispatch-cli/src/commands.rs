//! Command execution over a SQLite-backed dispatcher.

use std::collections::BTreeMap;
use std::io::Write;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use dispatch_core::{
    CourierDraft, CourierUpdate, DispatchConfig, DispatchError, Dispatcher, EntityKind,
    OrderDraft, SqliteStore,
};
use dispatch_packer::KnapsackPacker;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::args::{AssignConfig, CompleteConfig, ImportConfig, ShowConfig, UpdateConfig};
use crate::{ARG_PAYLOAD, CliError};

type CliDispatcher = Dispatcher<SqliteStore, KnapsackPacker>;

/// Intake files wrap their entries in a `data` array.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Payload<T> {
    data: Vec<T>,
}

#[derive(Debug, Serialize)]
struct IdRef {
    id: u64,
}

fn id_refs(ids: &[u64]) -> Vec<IdRef> {
    ids.iter().map(|&id| IdRef { id }).collect()
}

#[derive(Debug, Serialize)]
struct RegisteredCouriers {
    couriers: Vec<IdRef>,
}

#[derive(Debug, Serialize)]
struct RegisteredOrders {
    orders: Vec<IdRef>,
}

#[derive(Debug, Serialize)]
struct AssignmentOutput {
    orders: Vec<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assign_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct CompletionOutput {
    order_id: u64,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    validation_error: BTreeMap<&'static str, Vec<IdRef>>,
}

pub(crate) fn import_couriers(
    config: &ImportConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let payload: Payload<CourierDraft> = load_payload(&config.payload)?;
    let dispatcher = open_dispatcher(&config.database, config.dispatch)?;
    let ids = reject_with_report(dispatcher.register_couriers(&payload.data), writer)?;
    write_json(
        writer,
        &RegisteredCouriers {
            couriers: id_refs(&ids),
        },
    )
}

pub(crate) fn import_orders(config: &ImportConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let payload: Payload<OrderDraft> = load_payload(&config.payload)?;
    let dispatcher = open_dispatcher(&config.database, config.dispatch)?;
    let ids = reject_with_report(dispatcher.register_orders(&payload.data), writer)?;
    write_json(
        writer,
        &RegisteredOrders {
            orders: id_refs(&ids),
        },
    )
}

pub(crate) fn update_courier(config: &UpdateConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let update: CourierUpdate = load_payload(&config.payload)?;
    let dispatcher = open_dispatcher(&config.database, config.dispatch)?;
    let outcome = dispatcher.update_courier(config.courier_id, &update)?;
    if !outcome.reconciliation.released.is_empty() {
        log::info!(
            "courier {} no longer carries orders {:?}",
            config.courier_id,
            outcome.reconciliation.released
        );
    }
    let report = dispatcher.courier_report(config.courier_id)?;
    write_json(writer, &report)
}

pub(crate) fn assign(config: &AssignConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let dispatcher = open_dispatcher(&config.database, config.dispatch)?;
    let output = match dispatcher.get_or_create_active_batch(config.courier_id)? {
        Some(assignment) => AssignmentOutput {
            orders: id_refs(&assignment.order_ids),
            assign_time: Some(assignment.assign_time),
        },
        None => AssignmentOutput {
            orders: Vec::new(),
            assign_time: None,
        },
    };
    write_json(writer, &output)
}

pub(crate) fn complete(config: &CompleteConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let complete_time = parse_complete_time(&config.complete_time)?;
    let dispatcher = open_dispatcher(&config.database, DispatchConfig::default())?;
    let order_id = dispatcher.complete(config.courier_id, config.order_id, complete_time)?;
    write_json(writer, &CompletionOutput { order_id })
}

pub(crate) fn show_courier(config: &ShowConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let dispatcher = open_dispatcher(&config.database, DispatchConfig::default())?;
    let report = dispatcher.courier_report(config.courier_id)?;
    write_json(writer, &report)
}

fn open_dispatcher(database: &Utf8Path, config: DispatchConfig) -> Result<CliDispatcher, CliError> {
    dispatch_fs::ensure_parent_dir(database).map_err(|source| CliError::PrepareDatabase {
        path: database.to_path_buf(),
        source,
    })?;
    let store = SqliteStore::open(database.as_std_path())?;
    Ok(Dispatcher::with_config(store, KnapsackPacker::new(), config))
}

/// Parse an RFC 3339 timestamp and normalise it to UTC.
pub(crate) fn parse_complete_time(value: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| CliError::InvalidTimestamp {
            value: value.to_owned(),
            source,
        })
}

/// Load and decode a JSON payload file.
pub(crate) fn load_payload<T>(path: &Utf8Path) -> Result<T, CliError>
where
    T: DeserializeOwned,
{
    let missing = || CliError::MissingPayload {
        field: ARG_PAYLOAD,
        path: path.to_path_buf(),
    };
    match dispatch_fs::is_file(path) {
        Ok(true) => {}
        Ok(false) => return Err(missing()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
        Err(source) => {
            return Err(CliError::ReadPayload {
                path: path.to_path_buf(),
                source,
            });
        }
    }
    let contents = dispatch_fs::read_payload(path).map_err(|source| CliError::ReadPayload {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CliError::ParsePayload {
        path: path.to_path_buf(),
        source,
    })
}

/// Print the rejected identifiers as a validation report before failing.
fn reject_with_report<T>(
    result: Result<T, DispatchError>,
    writer: &mut dyn Write,
) -> Result<T, CliError> {
    match result {
        Ok(value) => Ok(value),
        Err(DispatchError::Rejected { entity, ids }) => {
            let key = match entity {
                EntityKind::Courier => "couriers",
                EntityKind::Order => "orders",
            };
            let report = ValidationReport {
                validation_error: BTreeMap::from([(key, id_refs(&ids))]),
            };
            write_json(writer, &report)?;
            Err(DispatchError::Rejected { entity, ids }.into())
        }
        Err(other) => Err(other.into()),
    }
}

fn write_json<T>(writer: &mut dyn Write, value: &T) -> Result<(), CliError>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
