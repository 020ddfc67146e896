//! Subcommand arguments and their resolved configurations.
//!
//! Each `*Args` struct is layered by `ortho_config` (defaults, configuration
//! file, `DISPATCH_*` environment variables, then flags) and converted into
//! a `*Config` holding every value the command needs.

use camino::Utf8PathBuf;
use clap::Parser;
use dispatch_core::{CourierId, DispatchConfig, OrderId};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ALLOW_NEW_REGIONS, ARG_BASE_RATE, ARG_COMPLETE_TIME, ARG_COURIER_ID, ARG_DATABASE,
    ARG_ORDER_ID, ARG_PAYLOAD, CliError, DEFAULT_DATABASE, ENV_ASSIGN_COURIER_ID,
    ENV_COMPLETE_COURIER_ID, ENV_COMPLETE_ORDER_ID, ENV_COMPLETE_TIME, ENV_IMPORT_PAYLOAD,
    ENV_SHOW_COURIER_ID, ENV_UPDATE_COURIER_ID, ENV_UPDATE_PAYLOAD,
};

/// Arguments for `import-couriers` and `import-orders`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Register entities from a JSON file shaped as \
                 {\"data\": [...]}. Registration is all or nothing: one \
                 invalid entry rejects the whole file.",
    about = "Register entities from a JSON payload"
)]
#[ortho_config(prefix = "DISPATCH")]
pub(crate) struct ImportArgs {
    /// Path to the JSON payload.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) payload: Option<Utf8PathBuf>,
    /// SQLite database holding dispatch state.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Register unknown regions and time windows instead of rejecting them.
    #[arg(long = ARG_ALLOW_NEW_REGIONS, value_name = "bool")]
    #[serde(default)]
    pub(crate) allow_new_regions: Option<bool>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Resolved `import-*` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportConfig {
    pub(crate) payload: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) dispatch: DispatchConfig,
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let payload = args.payload.ok_or(CliError::MissingArgument {
            field: ARG_PAYLOAD,
            env: ENV_IMPORT_PAYLOAD,
        })?;
        Ok(Self {
            payload,
            database: database_or_default(args.database),
            dispatch: dispatch_config(args.allow_new_regions, None),
        })
    }
}

/// Arguments for `update-courier`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Apply a partial update shaped as {\"courier_type\": ..., \
                 \"regions\": [...], \"working_hours\": [...]} and release \
                 any assigned orders the courier can no longer carry.",
    about = "Change a courier's attributes"
)]
#[ortho_config(prefix = "DISPATCH")]
pub(crate) struct UpdateArgs {
    /// Courier to change.
    #[arg(value_name = "courier-id")]
    #[serde(default)]
    pub(crate) courier_id: Option<CourierId>,
    /// Path to the JSON update.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) payload: Option<Utf8PathBuf>,
    /// SQLite database holding dispatch state.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Register unknown regions and time windows instead of rejecting them.
    #[arg(long = ARG_ALLOW_NEW_REGIONS, value_name = "bool")]
    #[serde(default)]
    pub(crate) allow_new_regions: Option<bool>,
}

impl UpdateArgs {
    pub(crate) fn into_config(self) -> Result<UpdateConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        UpdateConfig::try_from(merged)
    }
}

/// Resolved `update-courier` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpdateConfig {
    pub(crate) courier_id: CourierId,
    pub(crate) payload: Utf8PathBuf,
    pub(crate) database: Utf8PathBuf,
    pub(crate) dispatch: DispatchConfig,
}

impl TryFrom<UpdateArgs> for UpdateConfig {
    type Error = CliError;

    fn try_from(args: UpdateArgs) -> Result<Self, Self::Error> {
        let courier_id = args.courier_id.ok_or(CliError::MissingArgument {
            field: ARG_COURIER_ID,
            env: ENV_UPDATE_COURIER_ID,
        })?;
        let payload = args.payload.ok_or(CliError::MissingArgument {
            field: ARG_PAYLOAD,
            env: ENV_UPDATE_PAYLOAD,
        })?;
        Ok(Self {
            courier_id,
            payload,
            database: database_or_default(args.database),
            dispatch: dispatch_config(args.allow_new_regions, None),
        })
    }
}

/// Arguments for `assign`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Return the courier's open batch unchanged, or pack the \
                 heaviest fitting set of unassigned eligible orders into a \
                 new batch.",
    about = "Assign orders to a courier"
)]
#[ortho_config(prefix = "DISPATCH")]
pub(crate) struct AssignArgs {
    /// Courier requesting work.
    #[arg(value_name = "courier-id")]
    #[serde(default)]
    pub(crate) courier_id: Option<CourierId>,
    /// SQLite database holding dispatch state.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Reward per batch before the vehicle coefficient is applied.
    #[arg(long = ARG_BASE_RATE, value_name = "amount")]
    #[serde(default)]
    pub(crate) base_rate: Option<u64>,
}

impl AssignArgs {
    pub(crate) fn into_config(self) -> Result<AssignConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        AssignConfig::try_from(merged)
    }
}

/// Resolved `assign` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssignConfig {
    pub(crate) courier_id: CourierId,
    pub(crate) database: Utf8PathBuf,
    pub(crate) dispatch: DispatchConfig,
}

impl TryFrom<AssignArgs> for AssignConfig {
    type Error = CliError;

    fn try_from(args: AssignArgs) -> Result<Self, Self::Error> {
        let courier_id = args.courier_id.ok_or(CliError::MissingArgument {
            field: ARG_COURIER_ID,
            env: ENV_ASSIGN_COURIER_ID,
        })?;
        Ok(Self {
            courier_id,
            database: database_or_default(args.database),
            dispatch: dispatch_config(None, args.base_rate),
        })
    }
}

/// Arguments for `complete`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Record that a courier delivered an order")]
#[ortho_config(prefix = "DISPATCH")]
pub(crate) struct CompleteArgs {
    /// Courier who delivered the order.
    #[arg(value_name = "courier-id")]
    #[serde(default)]
    pub(crate) courier_id: Option<CourierId>,
    /// Delivered order.
    #[arg(value_name = "order-id")]
    #[serde(default)]
    pub(crate) order_id: Option<OrderId>,
    /// Delivery instant as an RFC 3339 timestamp.
    #[arg(value_name = "complete-time")]
    #[serde(default)]
    pub(crate) complete_time: Option<String>,
    /// SQLite database holding dispatch state.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl CompleteArgs {
    pub(crate) fn into_config(self) -> Result<CompleteConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        CompleteConfig::try_from(merged)
    }
}

/// Resolved `complete` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompleteConfig {
    pub(crate) courier_id: CourierId,
    pub(crate) order_id: OrderId,
    pub(crate) complete_time: String,
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<CompleteArgs> for CompleteConfig {
    type Error = CliError;

    fn try_from(args: CompleteArgs) -> Result<Self, Self::Error> {
        let courier_id = args.courier_id.ok_or(CliError::MissingArgument {
            field: ARG_COURIER_ID,
            env: ENV_COMPLETE_COURIER_ID,
        })?;
        let order_id = args.order_id.ok_or(CliError::MissingArgument {
            field: ARG_ORDER_ID,
            env: ENV_COMPLETE_ORDER_ID,
        })?;
        let complete_time = args.complete_time.ok_or(CliError::MissingArgument {
            field: ARG_COMPLETE_TIME,
            env: ENV_COMPLETE_TIME,
        })?;
        Ok(Self {
            courier_id,
            order_id,
            complete_time,
            database: database_or_default(args.database),
        })
    }
}

/// Arguments for `show-courier`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Show a courier with their rating and earnings")]
#[ortho_config(prefix = "DISPATCH")]
pub(crate) struct ShowArgs {
    /// Courier to show.
    #[arg(value_name = "courier-id")]
    #[serde(default)]
    pub(crate) courier_id: Option<CourierId>,
    /// SQLite database holding dispatch state.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl ShowArgs {
    pub(crate) fn into_config(self) -> Result<ShowConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ShowConfig::try_from(merged)
    }
}

/// Resolved `show-courier` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShowConfig {
    pub(crate) courier_id: CourierId,
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<ShowArgs> for ShowConfig {
    type Error = CliError;

    fn try_from(args: ShowArgs) -> Result<Self, Self::Error> {
        let courier_id = args.courier_id.ok_or(CliError::MissingArgument {
            field: ARG_COURIER_ID,
            env: ENV_SHOW_COURIER_ID,
        })?;
        Ok(Self {
            courier_id,
            database: database_or_default(args.database),
        })
    }
}

fn database_or_default(database: Option<Utf8PathBuf>) -> Utf8PathBuf {
    database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE))
}

fn dispatch_config(allow_new_regions: Option<bool>, base_rate: Option<u64>) -> DispatchConfig {
    let defaults = DispatchConfig::default();
    DispatchConfig {
        base_rate: base_rate.unwrap_or(defaults.base_rate),
        allow_new_regions_and_windows: allow_new_regions
            .unwrap_or(defaults.allow_new_regions_and_windows),
    }
}

#[cfg(test)]
pub(crate) fn assign_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<AssignConfig, CliError> {
    let merged = AssignArgs::merge_from_layers(layers).map_err(CliError::from)?;
    AssignConfig::try_from(merged)
}
