//! Implements a SQLite backed record store.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, ToSql, params_from_iter};

use crate::{
    Error,
    record::{Entry, EntryKind, EntryPatch, Record, RecordId},
    stores::{Backend, RecordStore},
};

/// The maximum number of IDs bound to a single `DELETE ... IN (...)` statement.
const BULK_DELETE_CHUNK_SIZE: usize = 500;

/// Restricts which records [SqlStore::list_filtered] returns.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordFilter {
    /// Only include records in this category.
    pub category: Option<String>,
    /// Only include records for this account.
    pub account: Option<String>,
}

/// Stores records in a SQLite database, one table per kind of record.
///
/// Every mutation of a single record runs inside a database transaction that
/// is committed on success and rolled back on any error.
#[derive(Debug, Clone)]
pub struct SqlStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqlStore {
    /// Create a new store for the SQLite `connection`.
    ///
    /// The record tables must already exist, see [create_record_tables].
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    /// Retrieve the records that match `filter`, ordered by ID.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the query fails.
    pub fn list_filtered<E: Entry>(&self, filter: &RecordFilter) -> Result<Vec<Record<E>>, Error> {
        let mut conditions = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();

        if let Some(category) = &filter.category {
            values.push(category);
            conditions.push(format!("category = ?{}", values.len()));
        }
        if let Some(account) = &filter.account {
            values.push(account);
            conditions.push(format!("account = ?{}", values.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let connection = self.lock()?;
        let query = format!(
            "SELECT id, {} FROM {}{where_clause} ORDER BY id ASC",
            E::COLUMNS.join(", "),
            E::KIND.collection()
        );

        connection
            .prepare(&query)?
            .query_map(params_from_iter(values), map_record_row)?
            .map(|maybe_record| maybe_record.map_err(Error::from))
            .collect()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl<E: Entry> RecordStore<E> for SqlStore {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    fn list(&self) -> Result<Vec<Record<E>>, Error> {
        self.list_filtered(&RecordFilter::default())
    }

    fn get(&self, id: RecordId) -> Result<Option<Record<E>>, Error> {
        let connection = self.lock()?;

        select_by_id(id, &connection)
    }

    fn create(&self, entry: E) -> Result<Record<E>, Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;

        let id = transaction
            .prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
                E::KIND.collection(),
                E::COLUMNS.join(", "),
                placeholders(1, E::COLUMNS.len())
            ))?
            .query_row(params_from_iter(entry.sql_values()), |row| row.get(0))?;

        transaction.commit()?;

        Ok(Record { id, entry })
    }

    fn insert(&self, record: &Record<E>) -> Result<(), Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;

        let mut values: Vec<&dyn ToSql> = vec![&record.id];
        values.extend(record.entry.sql_values());

        transaction
            .execute(
                &format!(
                    "INSERT INTO {} (id, {}) VALUES ({})",
                    E::KIND.collection(),
                    E::COLUMNS.join(", "),
                    placeholders(1, E::COLUMNS.len() + 1)
                ),
                params_from_iter(values),
            )
            .map_err(|error| match error {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
                    },
                    _,
                ) => Error::DuplicateId(record.id),
                error => error.into(),
            })?;

        transaction.commit()?;

        Ok(())
    }

    fn update(&self, id: RecordId, patch: &EntryPatch) -> Result<Option<Record<E>>, Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;

        let Some(mut record) = select_by_id::<E>(id, &transaction)? else {
            return Ok(None);
        };

        record.entry.apply(patch);

        let assignments = E::COLUMNS
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let mut values = record.entry.sql_values();
        values.push(&record.id);

        transaction.execute(
            &format!(
                "UPDATE {} SET {assignments} WHERE id = ?{}",
                E::KIND.collection(),
                E::COLUMNS.len() + 1
            ),
            params_from_iter(values),
        )?;

        transaction.commit()?;

        Ok(Some(record))
    }

    fn delete(&self, id: RecordId) -> Result<bool, Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;

        let rows_affected = transaction.execute(
            &format!("DELETE FROM {} WHERE id = ?1", E::KIND.collection()),
            [id],
        )?;

        transaction.commit()?;

        Ok(rows_affected > 0)
    }

    fn bulk_delete(&self, ids: &[RecordId]) -> Result<usize, Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        let mut rows_affected = 0;

        for chunk in ids.chunks(BULK_DELETE_CHUNK_SIZE) {
            rows_affected += transaction.execute(
                &format!(
                    "DELETE FROM {} WHERE id IN ({})",
                    E::KIND.collection(),
                    placeholders(1, chunk.len())
                ),
                params_from_iter(chunk),
            )?;
        }

        transaction.commit()?;

        Ok(rows_affected)
    }
}

/// Create the expense and income tables in the database.
///
/// # Errors
/// Returns an error if the tables cannot be created.
pub fn create_record_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {expenses} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            business TEXT,
            category TEXT NOT NULL,
            amount TEXT NOT NULL,
            account TEXT NOT NULL,
            currency TEXT NOT NULL DEFAULT '₪',
            notes TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_{expenses}_date ON {expenses}(date);

        CREATE TABLE IF NOT EXISTS {incomes} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            amount TEXT NOT NULL,
            account TEXT NOT NULL,
            currency TEXT NOT NULL DEFAULT '₪',
            notes TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_{incomes}_date ON {incomes}(date);",
        expenses = EntryKind::Expense.collection(),
        incomes = EntryKind::Income.collection(),
    ))
}

fn select_by_id<E: Entry>(
    id: RecordId,
    connection: &Connection,
) -> Result<Option<Record<E>>, Error> {
    connection
        .prepare(&format!(
            "SELECT id, {} FROM {} WHERE id = ?1",
            E::COLUMNS.join(", "),
            E::KIND.collection()
        ))?
        .query_row([id], map_record_row)
        .optional()
        .map_err(Error::from)
}

fn map_record_row<E: Entry>(row: &rusqlite::Row) -> Result<Record<E>, rusqlite::Error> {
    Ok(Record {
        id: row.get(0)?,
        entry: E::from_row(row, 1)?,
    })
}

/// `?start, ?start+1, ...` for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}
