//! Database operations for feature flags.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::{Error, flags::ScopeId};

/// A feature flag override stored in the database.
///
/// A flag with no `scope_id` applies globally, otherwise it only applies to
/// the identity with that ID.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureFlag {
    /// The ID of the row.
    pub id: i64,
    /// The name of the flag, e.g. "USE_DATABASE_STORAGE".
    pub name: String,
    /// Whether the flag is on.
    pub enabled: bool,
    /// The identity the flag applies to, `None` for a global flag.
    pub scope_id: Option<ScopeId>,
    /// What the flag controls.
    pub description: Option<String>,
}

/// Retrieve the flag named `name` for `scope_id`.
///
/// Passing `None` for `scope_id` retrieves the global flag, it does not
/// match scoped rows.
pub fn get_flag(
    name: &str,
    scope_id: Option<ScopeId>,
    connection: &Connection,
) -> Result<Option<FeatureFlag>, Error> {
    connection
        .prepare(
            "SELECT id, name, enabled, scope_id, description FROM feature_flags
            WHERE name = ?1 AND scope_id IS ?2
            LIMIT 1;",
        )?
        .query_row((name, scope_id), map_row)
        .optional()
        .map_err(|error| error.into())
}

/// Create or update the flag named `name` for `scope_id`.
///
/// The description is only changed when `description` is `Some`.
pub fn set_flag(
    name: &str,
    enabled: bool,
    scope_id: Option<ScopeId>,
    description: Option<&str>,
    connection: &Connection,
) -> Result<FeatureFlag, Error> {
    let rows_affected = connection.execute(
        "UPDATE feature_flags
        SET enabled = ?3, description = COALESCE(?4, description)
        WHERE name = ?1 AND scope_id IS ?2",
        (name, scope_id, enabled, description),
    )?;

    if rows_affected == 0 {
        connection.execute(
            "INSERT INTO feature_flags (name, enabled, scope_id, description)
            VALUES (?1, ?2, ?3, ?4)",
            (name, enabled, scope_id, description),
        )?;
    }

    get_flag(name, scope_id, connection)?.ok_or(Error::NotFound)
}

/// Retrieve all flags ordered by name, global flags before scoped ones.
pub fn list_flags(connection: &Connection) -> Result<Vec<FeatureFlag>, Error> {
    connection
        .prepare(
            "SELECT id, name, enabled, scope_id, description FROM feature_flags
            ORDER BY name ASC, scope_id ASC;",
        )?
        .query_map([], map_row)?
        .map(|maybe_flag| maybe_flag.map_err(|error| error.into()))
        .collect()
}

/// Delete the flag named `name` for `scope_id`, returning whether it existed.
pub fn delete_flag(
    name: &str,
    scope_id: Option<ScopeId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM feature_flags WHERE name = ?1 AND scope_id IS ?2",
        (name, scope_id),
    )?;

    Ok(rows_affected > 0)
}

/// Initialize the feature flag table and indexes.
///
/// SQLite treats NULLs as distinct in unique constraints, so global flags get
/// their own partial index to keep one row per name.
pub fn create_feature_flag_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS feature_flags (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 0,
            scope_id INTEGER,
            description TEXT,
            UNIQUE(name, scope_id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_feature_flags_global
        ON feature_flags(name) WHERE scope_id IS NULL;

        CREATE INDEX IF NOT EXISTS idx_feature_flags_name ON feature_flags(name);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<FeatureFlag, rusqlite::Error> {
    Ok(FeatureFlag {
        id: row.get(0)?,
        name: row.get(1)?,
        enabled: row.get(2)?,
        scope_id: row.get(3)?,
        description: row.get(4)?,
    })
}

#[cfg(test)]
mod feature_flag_query_tests {
    use rusqlite::Connection;

    use super::{create_feature_flag_table, delete_flag, get_flag, list_flags, set_flag};

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_feature_flag_table(&connection).expect("Could not create feature flag table");
        connection
    }

    #[test]
    fn sql_is_valid() {
        let connection = Connection::open_in_memory().unwrap();

        assert_eq!(Ok(()), create_feature_flag_table(&connection));
    }

    #[test]
    fn get_missing_flag_returns_none() {
        let connection = get_test_db_connection();

        let flag = get_flag("USE_DATABASE_STORAGE", None, &connection).unwrap();

        assert_eq!(flag, None);
    }

    #[test]
    fn set_flag_creates_global_flag() {
        let connection = get_test_db_connection();

        let flag = set_flag(
            "USE_DATABASE_STORAGE",
            true,
            None,
            Some("Read from the database"),
            &connection,
        )
        .unwrap();

        assert!(flag.enabled);
        assert_eq!(flag.scope_id, None);
        assert_eq!(
            get_flag("USE_DATABASE_STORAGE", None, &connection).unwrap(),
            Some(flag)
        );
    }

    #[test]
    fn set_flag_twice_updates_global_flag_in_place() {
        let connection = get_test_db_connection();
        let first = set_flag("DUAL_WRITE_ENABLED", true, None, Some("Mirror"), &connection).unwrap();

        let second = set_flag("DUAL_WRITE_ENABLED", false, None, None, &connection).unwrap();

        assert_eq!(second.id, first.id);
        assert!(!second.enabled);
        assert_eq!(second.description.as_deref(), Some("Mirror"));
        assert_eq!(list_flags(&connection).unwrap().len(), 1);
    }

    #[test]
    fn scoped_and_global_flags_are_separate_rows() {
        let connection = get_test_db_connection();
        set_flag("DUAL_WRITE_ENABLED", false, None, None, &connection).unwrap();
        set_flag("DUAL_WRITE_ENABLED", true, Some(7), None, &connection).unwrap();

        let global = get_flag("DUAL_WRITE_ENABLED", None, &connection).unwrap();
        let scoped = get_flag("DUAL_WRITE_ENABLED", Some(7), &connection).unwrap();

        assert!(!global.unwrap().enabled);
        assert!(scoped.unwrap().enabled);
    }

    #[test]
    fn duplicate_global_insert_is_rejected() {
        let connection = get_test_db_connection();
        set_flag("DUAL_WRITE_ENABLED", false, None, None, &connection).unwrap();

        let result = connection.execute(
            "INSERT INTO feature_flags (name, enabled) VALUES ('DUAL_WRITE_ENABLED', 1)",
            [],
        );

        assert!(result.is_err());
    }

    #[test]
    fn list_flags_puts_global_first() {
        let connection = get_test_db_connection();
        set_flag("B", true, Some(2), None, &connection).unwrap();
        set_flag("B", true, None, None, &connection).unwrap();
        set_flag("A", false, None, None, &connection).unwrap();

        let flags: Vec<_> = list_flags(&connection)
            .unwrap()
            .into_iter()
            .map(|flag| (flag.name, flag.scope_id))
            .collect();

        assert_eq!(
            flags,
            vec![
                ("A".to_owned(), None),
                ("B".to_owned(), None),
                ("B".to_owned(), Some(2))
            ]
        );
    }

    #[test]
    fn delete_flag_reports_whether_flag_existed() {
        let connection = get_test_db_connection();
        set_flag("A", true, Some(3), None, &connection).unwrap();

        assert!(!delete_flag("A", None, &connection).unwrap());
        assert!(delete_flag("A", Some(3), &connection).unwrap());
        assert_eq!(get_flag("A", Some(3), &connection).unwrap(), None);
    }
}
