//! Error types emitted by the dispatch CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use dispatch_core::{DispatchError, SqliteStoreError};
use thiserror::Error;

/// Errors emitted by the dispatch CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set <{field}> or {env})")]
    MissingArgument {
        /// Name of the missing argument.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// A payload path does not exist or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingPayload {
        /// Argument naming the path.
        field: &'static str,
        /// The path as given.
        path: Utf8PathBuf,
    },
    /// Reading a payload file failed.
    #[error("failed to read {path:?}: {source}")]
    ReadPayload {
        /// The payload path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A payload file is not valid JSON of the expected shape.
    #[error("failed to parse JSON payload at {path:?}: {source}")]
    ParsePayload {
        /// The payload path.
        path: Utf8PathBuf,
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// A completion timestamp is not RFC 3339.
    #[error("complete time {value:?} is not an RFC 3339 timestamp: {source}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Underlying parse error.
        #[source]
        source: chrono::ParseError,
    },
    /// Creating the database directory failed.
    #[error("failed to prepare database directory for {path:?}: {source}")]
    PrepareDatabase {
        /// The database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error(transparent)]
    OpenStore(#[from] SqliteStoreError),
    /// The dispatcher rejected the operation.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
