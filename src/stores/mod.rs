//! Contains the store trait shared by both persistence backends and its two
//! implementations.

mod flat;
mod sql;

use std::fmt::{self, Display};

pub use flat::FlatStore;
pub use sql::{RecordFilter, SqlStore, create_record_tables};

use crate::{
    Error,
    record::{Entry, EntryPatch, Record, RecordId},
};

/// The persistence backends a record can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// One JSON file per collection.
    Flat,
    /// One SQLite table per collection.
    Relational,
}

impl Backend {
    /// The other backend.
    pub fn other(self) -> Self {
        match self {
            Backend::Flat => Backend::Relational,
            Backend::Relational => Backend::Flat,
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Flat => write!(f, "flat"),
            Backend::Relational => write!(f, "relational"),
        }
    }
}

/// Handles the creation, retrieval and removal of records of kind `E`.
///
/// Methods that look up a record by ID return `Ok(None)` or `Ok(false)` when
/// the record does not exist, so that callers can tell a missing record apart
/// from a failing store.
pub trait RecordStore<E: Entry> {
    /// Which backend this store persists to.
    fn backend(&self) -> Backend;

    /// Retrieve every record, ordered by ID.
    fn list(&self) -> Result<Vec<Record<E>>, Error>;

    /// Retrieve a record by its ID.
    fn get(&self, id: RecordId) -> Result<Option<Record<E>>, Error>;

    /// Create a record, assigning it a new ID.
    fn create(&self, entry: E) -> Result<Record<E>, Error>;

    /// Store a record under the ID it already has.
    ///
    /// Implementers must return [Error::DuplicateId] if the ID is taken.
    fn insert(&self, record: &Record<E>) -> Result<(), Error>;

    /// Apply `patch` to the record with the given ID and return the result.
    fn update(&self, id: RecordId, patch: &EntryPatch) -> Result<Option<Record<E>>, Error>;

    /// Delete a record, returning whether it existed.
    fn delete(&self, id: RecordId) -> Result<bool, Error>;

    /// Delete every record whose ID is in `ids`, returning how many existed.
    fn bulk_delete(&self, ids: &[RecordId]) -> Result<usize, Error>;
}
