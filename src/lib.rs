//! Home Budget is a personal expense and income tracker.
//!
//! This library provides a JSON REST API over expense and income records.
//! The records live in one of two storage backends, a flat JSON file store
//! and a SQLite database. Feature flags decide which backend is
//! authoritative, and whether writes are mirrored to the other backend while
//! data is migrated between them.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod config;
mod db;
mod endpoints;
mod flags;
mod logging;
mod record;
mod routing;
mod service;
mod storage;
mod stores;

pub use app_state::AppState;
pub use config::{DatabaseLocation, Environment, Settings, parse_database_url};
pub use db::{initialize as initialize_db, open_connection};
pub use flags::{
    DUAL_WRITE_ENABLED, ENHANCED_EXPENSE_STATS, EXPENSE_AMOUNT_V2_FORMAT, EnvOverrides, FeatureFlag, FlagResolver, ScopeId, USE_DATABASE_STORAGE,
    delete_flag, get_flag, list_flags, set_flag,
};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use record::{
    Amount, DEFAULT_CURRENCY, Entry, EntryKind, EntryPatch, EntryPayload, Expense, FieldUpdate,
    Income, Record, RecordId,
};
pub use routing::build_router;
pub use service::{ExpenseSummary, RecordService};
pub use storage::{BackfillSummary, DivergenceReport, StorageController, StorageMode};
pub use stores::{Backend, FlatStore, RecordFilter, RecordStore, SqlStore};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A field that is required to create a record was missing or blank.
    #[error("missing required field \"{0}\"")]
    MissingField(&'static str),

    /// The amount could not be parsed as a number with at most two decimal
    /// places.
    #[error("invalid amount \"{0}\", expected a number with at most two decimal places")]
    InvalidAmount(String),

    /// The date could not be parsed as a `YYYY-MM-DD` calendar date.
    #[error("invalid date \"{0}\", expected a date formatted as YYYY-MM-DD")]
    InvalidDate(String),

    /// A field update named a field that does not exist on the record kind.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// A field update had a value of the wrong type for the field.
    #[error("invalid value for field \"{field}\": {reason}")]
    InvalidValue {
        /// The name of the field being updated.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The request body was not valid JSON or did not have the expected
    /// shape.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the ID is
    /// correct and that the record has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A record was inserted with an ID that is already taken in the store.
    #[error("a record with the ID {0} already exists")]
    DuplicateId(RecordId),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The flat store file could not be read or written.
    #[error("could not access the flat store file {path}: {reason}")]
    FlatStoreIo {
        /// The file that was being accessed.
        path: String,
        /// The underlying I/O error.
        reason: String,
    },

    /// The flat store file did not contain a valid collection of records.
    #[error("could not parse the flat store file {path}: {reason}")]
    FlatStoreFormat {
        /// The file that was being parsed.
        path: String,
        /// The underlying parsing error.
        reason: String,
    },

    /// Could not acquire the flat store write lock.
    #[error("could not acquire the flat store lock")]
    FlatStoreLockError,

    /// The database URL does not point to a SQLite database.
    #[error("unsupported database URL \"{0}\", expected sqlite://<path> or :memory:")]
    InvalidDatabaseUrl(String),

    /// The configuration endpoint was requested outside of dev mode.
    #[error("configuration display is only available in dev mode")]
    NotDevMode,
}

impl Error {
    /// Whether the error was caused by the content of the client's request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingField(_)
                | Error::InvalidAmount(_)
                | Error::InvalidDate(_)
                | Error::InvalidField(_)
                | Error::InvalidValue { .. }
                | Error::InvalidBody(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            error if error.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::NotDevMode => StatusCode::FORBIDDEN,
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "detail": "An unexpected error occurred, check the server logs for more details."
                    })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
