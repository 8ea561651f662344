//! Feature flags that decide how records are stored.
//!
//! A flag's value is resolved from, in order:
//! 1. an `FF_<FLAG_NAME>` environment variable,
//! 2. a database row for the caller's scope,
//! 3. a global database row,
//! 4. the default supplied by the caller.

mod db;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use rusqlite::Connection;

pub use db::{FeatureFlag, create_feature_flag_table, delete_flag, get_flag, list_flags, set_flag};

/// Makes the relational store the authoritative store when on.
pub const USE_DATABASE_STORAGE: &str = "USE_DATABASE_STORAGE";

/// Mirrors writes to the non-authoritative store when on.
pub const DUAL_WRITE_ENABLED: &str = "DUAL_WRITE_ENABLED";

/// Groups thousands in formatted amounts, e.g. "1,234.50 ₪", when on.
pub const EXPENSE_AMOUNT_V2_FORMAT: &str = "EXPENSE_AMOUNT_V2_FORMAT";

/// Adds the average, smallest and largest amount to expense summaries when on.
pub const ENHANCED_EXPENSE_STATS: &str = "ENHANCED_EXPENSE_STATS";

/// Alias for the integer type used for the identity a flag is scoped to.
pub type ScopeId = i64;

const ENV_PREFIX: &str = "FF_";

const TRUTHY_VALUES: [&str; 4] = ["true", "1", "yes", "on"];

/// A snapshot of the `FF_*` environment variables.
///
/// The snapshot is taken once at startup, so changing an environment
/// override requires a restart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides(HashMap<String, String>);

impl EnvOverrides {
    /// Capture the `FF_*` variables of the current process.
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)))
    }

    /// Build overrides from `(variable, value)` pairs, e.g.
    /// `("FF_DUAL_WRITE_ENABLED", "true")`.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// The override for `flag_name`, if its variable is set to a non-empty
    /// value.
    ///
    /// Values in `{"true", "1", "yes", "on"}` (ignoring case) are true, any
    /// other value is false.
    pub fn get(&self, flag_name: &str) -> Option<bool> {
        let value = self.0.get(&env_key(flag_name))?.trim();

        if value.is_empty() {
            return None;
        }

        Some(
            TRUTHY_VALUES
                .iter()
                .any(|truthy| value.eq_ignore_ascii_case(truthy)),
        )
    }
}

/// `FF_` followed by the flag name in upper snake case.
fn env_key(flag_name: &str) -> String {
    let name: String = flag_name
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    format!("{ENV_PREFIX}{name}")
}

/// Resolves feature flags from environment overrides and the database.
#[derive(Debug, Clone)]
pub struct FlagResolver {
    env: EnvOverrides,
    connection: Option<Arc<Mutex<Connection>>>,
}

impl FlagResolver {
    /// Create a resolver that checks `env` first and then the
    /// `feature_flags` table.
    pub fn new(env: EnvOverrides, connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            env,
            connection: Some(connection),
        }
    }

    /// Create a resolver that only knows about environment overrides.
    #[cfg(test)]
    pub fn env_only(env: EnvOverrides) -> Self {
        Self {
            env,
            connection: None,
        }
    }

    /// Resolve the value of `flag_name` for `scope_id`.
    ///
    /// This never fails. A missing flag, and a database that cannot be
    /// queried, both resolve to `default`.
    pub fn resolve(&self, flag_name: &str, scope_id: Option<ScopeId>, default: bool) -> bool {
        if let Some(enabled) = self.env.get(flag_name) {
            return enabled;
        }

        let Some(connection) = &self.connection else {
            return default;
        };

        let connection = match connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::warn!(flag = flag_name, "could not acquire database lock: {error}");
                return default;
            }
        };

        let scopes = scope_id.map(Some).into_iter().chain([None]);

        for scope in scopes {
            match get_flag(flag_name, scope, &connection) {
                Ok(Some(flag)) => return flag.enabled,
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        flag = flag_name,
                        scope_id = scope,
                        "could not look up feature flag: {error}"
                    );
                }
            }
        }

        default
    }
}
