//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{
    Error, Settings,
    db::initialize,
    flags::{EnvOverrides, FlagResolver},
    service::RecordService,
    storage::StorageController,
    stores::{FlatStore, SqlStore},
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Validates and stores records.
    pub service: RecordService,

    /// The settings the server was started with.
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// records and feature flags. The flat store keeps its files in
    /// [Settings::data_dir] and feature flags are read from `env` before the
    /// database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, settings: Settings, env: EnvOverrides) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));
        let controller = StorageController::new(
            FlatStore::new(&settings.data_dir),
            SqlStore::new(connection.clone()),
            FlagResolver::new(env, connection),
        );

        Ok(Self {
            service: RecordService::new(controller),
            settings: Arc::new(settings),
        })
    }
}

impl FromRef<AppState> for RecordService {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}
