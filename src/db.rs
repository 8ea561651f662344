//! Opening and initializing the application's SQLite database.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    config::{DatabaseLocation, parse_database_url},
    flags::create_feature_flag_table,
    stores::create_record_tables,
};

/// Open the database that `database_url` points to.
///
/// # Errors
/// Returns an [Error::InvalidDatabaseUrl] if the URL is not a SQLite URL, or
/// an [Error::SqlError] if the database cannot be opened.
pub fn open_connection(database_url: &str) -> Result<Connection, Error> {
    let connection = match parse_database_url(database_url)? {
        DatabaseLocation::Memory => Connection::open_in_memory()?,
        DatabaseLocation::File(path) => Connection::open(path)?,
    };

    Ok(connection)
}

/// Create the tables for records and feature flags if they do not exist.
///
/// # Errors
/// Returns an error if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_record_tables(&transaction)?;
    create_feature_flag_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod db_tests {
    use rusqlite::Connection;

    use crate::Error;

    use super::{initialize, open_connection};

    #[test]
    fn initialize_creates_all_tables() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        let mut tables: Vec<String> = connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        tables.sort();

        assert_eq!(tables, vec!["expenses", "feature_flags", "incomes"]);
    }

    #[test]
    fn initialize_twice_succeeds() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(initialize(&connection), Ok(()));
    }

    #[test]
    fn open_connection_opens_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.db");

        let connection = open_connection(&format!("sqlite://{}", path.display())).unwrap();
        initialize(&connection).unwrap();

        assert!(path.is_file());
    }

    #[test]
    fn open_connection_rejects_postgres() {
        let result = open_connection("postgresql://localhost:5432/budget_db");

        assert!(matches!(result, Err(Error::InvalidDatabaseUrl(_))));
    }
}
