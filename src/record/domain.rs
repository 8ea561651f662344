//! Core record domain types.

use std::fmt::{self, Display};

use rusqlite::{Row, ToSql};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    Error,
    record::{EntryPatch, EntryPayload},
};

/// Alias for the integer type used for record IDs in both stores.
pub type RecordId = i64;

/// The currency used when a record is created without one.
pub const DEFAULT_CURRENCY: &str = "₪";

/// The kinds of record the application tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Money spent.
    Expense,
    /// Money earned.
    Income,
}

impl EntryKind {
    /// The name of the collection holding this kind of record.
    ///
    /// This is both the flat store file stem and the database table name.
    pub fn collection(self) -> &'static str {
        match self {
            EntryKind::Expense => "expenses",
            EntryKind::Income => "incomes",
        }
    }

    /// The key used for a single record of this kind in API responses.
    pub fn singular(self) -> &'static str {
        match self {
            EntryKind::Expense => "expense",
            EntryKind::Income => "income",
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.singular())
    }
}

/// A stored expense or income together with the ID assigned by the store
/// that created it.
///
/// The ID is serialized next to the entry fields, e.g.
/// `{"id": 1, "date": "2025-01-01", "category": "Groceries", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<E> {
    /// The ID of the record.
    pub id: RecordId,
    /// The fields of the record.
    #[serde(flatten)]
    pub entry: E,
}

impl<E: Entry> Record<E> {
    /// The JSON body for a response about this record, e.g.
    /// `{"status": "created", "expense": {...}}`.
    pub fn response_body(&self, status: &str) -> Value {
        let key = E::KIND.singular();

        json!({ "status": status, key: self })
    }
}

/// The fields of a kind of record, e.g. [Expense](crate::Expense).
///
/// Both stores are generic over this trait, so adding a kind of record means
/// implementing it once rather than writing a store per kind.
pub trait Entry:
    fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The kind of record.
    const KIND: EntryKind;

    /// The names of the fields, excluding `id`.
    ///
    /// These double as the database column names and are listed in the same
    /// order as the values returned by [Entry::sql_values].
    const COLUMNS: &'static [&'static str];

    /// Validate a create payload and fill in defaults.
    ///
    /// # Errors
    /// Returns a validation error if a required field is missing or malformed.
    fn from_payload(payload: EntryPayload) -> Result<Self, Error>;

    /// Overwrite the fields that are set in `patch`.
    fn apply(&mut self, patch: &EntryPatch);

    /// The values for [Entry::COLUMNS], in order.
    fn sql_values(&self) -> Vec<&dyn ToSql>;

    /// Read the fields from a row, starting at column `offset`.
    fn from_row(row: &Row, offset: usize) -> Result<Self, rusqlite::Error>;
}
