//! Command-line interface for courier dispatch.
//!
//! Every command opens (or creates) a SQLite database, runs one dispatcher
//! operation, and prints a JSON document on standard output.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};

mod args;
mod commands;
mod error;

use args::{AssignArgs, CompleteArgs, ImportArgs, ShowArgs, UpdateArgs};
pub use error::CliError;

const ARG_DATABASE: &str = "database";
const ARG_ALLOW_NEW_REGIONS: &str = "allow-new-regions";
const ARG_BASE_RATE: &str = "base-rate";
const ARG_PAYLOAD: &str = "payload";
const ARG_COURIER_ID: &str = "courier-id";
const ARG_ORDER_ID: &str = "order-id";
const ARG_COMPLETE_TIME: &str = "complete-time";

const ENV_IMPORT_PAYLOAD: &str = "DISPATCH_CMDS_IMPORT_PAYLOAD";
const ENV_UPDATE_COURIER_ID: &str = "DISPATCH_CMDS_UPDATE_COURIER_ID";
const ENV_UPDATE_PAYLOAD: &str = "DISPATCH_CMDS_UPDATE_PAYLOAD";
const ENV_ASSIGN_COURIER_ID: &str = "DISPATCH_CMDS_ASSIGN_COURIER_ID";
const ENV_COMPLETE_COURIER_ID: &str = "DISPATCH_CMDS_COMPLETE_COURIER_ID";
const ENV_COMPLETE_ORDER_ID: &str = "DISPATCH_CMDS_COMPLETE_ORDER_ID";
const ENV_COMPLETE_TIME: &str = "DISPATCH_CMDS_COMPLETE_COMPLETE_TIME";
const ENV_SHOW_COURIER_ID: &str = "DISPATCH_CMDS_SHOW_COURIER_ID";

/// Database used when no `--database` is configured.
const DEFAULT_DATABASE: &str = "dispatch.db";

/// Run the dispatch CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments or configuration are invalid, the
/// database cannot be opened, or the dispatcher rejects the operation.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::ImportCouriers(args) => commands::import_couriers(&args.into_config()?, writer),
        Command::ImportOrders(args) => commands::import_orders(&args.into_config()?, writer),
        Command::UpdateCourier(args) => commands::update_courier(&args.into_config()?, writer),
        Command::Assign(args) => commands::assign(&args.into_config()?, writer),
        Command::Complete(args) => commands::complete(&args.into_config()?, writer),
        Command::ShowCourier(args) => commands::show_courier(&args.into_config()?, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "dispatch",
    about = "Assign delivery orders to couriers and track their deliveries",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register couriers from a JSON payload.
    ImportCouriers(ImportArgs),
    /// Register orders from a JSON payload.
    ImportOrders(ImportArgs),
    /// Change a courier and release orders they can no longer carry.
    UpdateCourier(UpdateArgs),
    /// Return the courier's open batch, creating one if needed.
    Assign(AssignArgs),
    /// Record the delivery of an order.
    Complete(CompleteArgs),
    /// Show a courier with their rating and earnings.
    ShowCourier(ShowArgs),
}

#[cfg(test)]
mod tests;
