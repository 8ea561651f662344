//! Routes record reads and writes between the flat store and the relational
//! store while data is migrated from one to the other.
//!
//! Two flags select one of four [StorageMode]s. The primary store of a mode
//! serves every read and its writes decide whether an operation succeeded.
//! In the dual-write modes every successful primary write is repeated on the
//! secondary store. Secondary failures are logged and never returned, so the
//! stores may diverge and [StorageController::compare] exists to find out
//! where.

mod reconcile;

use std::fmt::{self, Display};

use serde::Serialize;

pub use reconcile::{BackfillSummary, DivergenceReport};

use crate::{
    Error,
    flags::{DUAL_WRITE_ENABLED, FlagResolver, ScopeId, USE_DATABASE_STORAGE},
    record::{Entry, EntryPatch, Record, RecordId},
    storage::reconcile::SecondaryWrite,
    stores::{Backend, FlatStore, RecordStore, SqlStore},
};

/// Which stores are read from and written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// Read from and write to the flat store only.
    FlatOnly,
    /// Read from the flat store, write to both.
    DualWriteFlatPrimary,
    /// Read from the relational store, write to both.
    DualWriteRelationalPrimary,
    /// Read from and write to the relational store only.
    RelationalOnly,
}

impl StorageMode {
    /// The mode selected by the values of [USE_DATABASE_STORAGE] and
    /// [DUAL_WRITE_ENABLED].
    pub fn from_flags(use_database_storage: bool, dual_write_enabled: bool) -> Self {
        match (use_database_storage, dual_write_enabled) {
            (false, false) => StorageMode::FlatOnly,
            (false, true) => StorageMode::DualWriteFlatPrimary,
            (true, true) => StorageMode::DualWriteRelationalPrimary,
            (true, false) => StorageMode::RelationalOnly,
        }
    }

    /// The authoritative store.
    pub fn primary(self) -> Backend {
        match self {
            StorageMode::FlatOnly | StorageMode::DualWriteFlatPrimary => Backend::Flat,
            StorageMode::DualWriteRelationalPrimary | StorageMode::RelationalOnly => {
                Backend::Relational
            }
        }
    }

    /// The store that receives mirrored writes, if any.
    pub fn secondary(self) -> Option<Backend> {
        match self {
            StorageMode::DualWriteFlatPrimary | StorageMode::DualWriteRelationalPrimary => {
                Some(self.primary().other())
            }
            StorageMode::FlatOnly | StorageMode::RelationalOnly => None,
        }
    }

    /// A short name for logs and API responses, e.g. "dual-write-flat-primary".
    pub fn name(self) -> &'static str {
        match self {
            StorageMode::FlatOnly => "flat-only",
            StorageMode::DualWriteFlatPrimary => "dual-write-flat-primary",
            StorageMode::DualWriteRelationalPrimary => "dual-write-relational-primary",
            StorageMode::RelationalOnly => "relational-only",
        }
    }
}

impl Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decides, per operation, which store is authoritative and mirrors writes
/// to the other store in the dual-write modes.
///
/// The flags are resolved again on every operation, so a flag changed in the
/// database takes effect on the next call.
#[derive(Debug, Clone)]
pub struct StorageController {
    flat: FlatStore,
    relational: SqlStore,
    flags: FlagResolver,
    scope_id: Option<ScopeId>,
}

impl StorageController {
    /// Create a controller over the two stores that resolves flags globally.
    pub fn new(flat: FlatStore, relational: SqlStore, flags: FlagResolver) -> Self {
        Self {
            flat,
            relational,
            flags,
            scope_id: None,
        }
    }

    /// A controller over the same stores that resolves flags for `scope_id`.
    pub fn scoped(&self, scope_id: ScopeId) -> Self {
        Self {
            scope_id: Some(scope_id),
            ..self.clone()
        }
    }

    /// The mode the next operation will run in.
    pub fn mode(&self) -> StorageMode {
        StorageMode::from_flags(
            self.flag_enabled(USE_DATABASE_STORAGE),
            self.flag_enabled(DUAL_WRITE_ENABLED),
        )
    }

    /// Whether `flag_name` is on for this controller's scope. Flags are off
    /// unless set.
    pub fn flag_enabled(&self, flag_name: &str) -> bool {
        self.flags.resolve(flag_name, self.scope_id, false)
    }

    /// Create a record in the primary store and mirror it, with the same ID,
    /// to the secondary store.
    ///
    /// # Errors
    /// Returns an error only if the primary store fails.
    pub fn create<E: Entry>(&self, entry: E) -> Result<Record<E>, Error> {
        let (primary, secondary) = self.route::<E>();

        let record = primary.create(entry)?;

        if let Some(secondary) = secondary {
            SecondaryWrite::new("create", E::KIND, secondary.backend(), Some(record.id))
                .run(|| secondary.insert(&record));
        }

        Ok(record)
    }

    /// Retrieve every record from the primary store, ordered by ID.
    pub fn list<E: Entry>(&self) -> Result<Vec<Record<E>>, Error> {
        let (primary, _) = self.route::<E>();

        primary.list()
    }

    /// Retrieve a record from the primary store.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the primary store does not have the record.
    pub fn get<E: Entry>(&self, id: RecordId) -> Result<Record<E>, Error> {
        let (primary, _) = self.route::<E>();

        primary.get(id)?.ok_or(Error::NotFound)
    }

    /// Apply `patch` to a record in the primary store and then in the
    /// secondary store.
    ///
    /// A secondary store that is missing the record, or that ends up with
    /// different fields, is logged as a divergence.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the primary store does not have the
    /// record, or the primary store's error.
    pub fn update<E: Entry>(&self, id: RecordId, patch: &EntryPatch) -> Result<Record<E>, Error> {
        let (primary, secondary) = self.route::<E>();

        let updated = primary.update(id, patch)?.ok_or(Error::NotFound)?;

        if let Some(secondary) = secondary {
            let write = SecondaryWrite::new("update", E::KIND, secondary.backend(), Some(id));

            match write.run(|| secondary.update(id, patch)).value {
                Some(None) => write.divergence("record is missing from the secondary store"),
                Some(Some(mirrored)) if mirrored.entry != updated.entry => {
                    write.divergence("records differ after the update")
                }
                _ => {}
            }
        }

        Ok(updated)
    }

    /// Delete a record from the primary store and then from the secondary
    /// store.
    ///
    /// # Errors
    /// Returns [Error::NotFound] without touching the secondary store if the
    /// primary store does not have the record.
    pub fn remove<E: Entry>(&self, id: RecordId) -> Result<(), Error> {
        let (primary, secondary) = self.route::<E>();

        if !primary.delete(id)? {
            return Err(Error::NotFound);
        }

        if let Some(secondary) = secondary {
            let write = SecondaryWrite::new("delete", E::KIND, secondary.backend(), Some(id));

            if write.run(|| secondary.delete(id)).value == Some(false) {
                write.divergence("record is missing from the secondary store");
            }
        }

        Ok(())
    }

    /// Delete the records with the given IDs, returning how many the primary
    /// store had.
    ///
    /// IDs that do not exist are skipped, so repeating a call returns 0.
    pub fn bulk_remove<E: Entry>(&self, ids: &[RecordId]) -> Result<usize, Error> {
        let (primary, secondary) = self.route::<E>();

        let count = primary.bulk_delete(ids)?;

        if let Some(secondary) = secondary {
            let write = SecondaryWrite::new("bulk_delete", E::KIND, secondary.backend(), None);

            match write.run(|| secondary.bulk_delete(ids)).value {
                Some(secondary_count) if secondary_count != count => {
                    write.divergence(&format!(
                        "primary store deleted {count} records, secondary store deleted {secondary_count}"
                    ))
                }
                _ => {}
            }
        }

        Ok(count)
    }

    /// Compare the flat and relational copies of the collection for `E`.
    ///
    /// This reads both stores regardless of the mode.
    pub fn compare<E: Entry>(&self) -> Result<DivergenceReport, Error> {
        let flat = RecordStore::<E>::list(&self.flat)?;
        let relational = RecordStore::<E>::list(&self.relational)?;

        Ok(DivergenceReport::between(&flat, &relational))
    }

    /// Copy every record of kind `E` that the other store is missing from
    /// `from` into it, keeping the record IDs.
    ///
    /// Records the target already has are left as they are.
    pub fn backfill<E: Entry>(&self, from: Backend) -> Result<BackfillSummary, Error> {
        let source = self.store::<E>(from);
        let target = self.store::<E>(from.other());
        let mut summary = BackfillSummary::default();

        for record in source.list()? {
            match target.insert(&record) {
                Ok(()) => summary.copied += 1,
                Err(Error::DuplicateId(_)) => summary.already_present += 1,
                Err(error) => return Err(error),
            }
        }

        tracing::info!(
            kind = %E::KIND,
            from = %from,
            to = %from.other(),
            copied = summary.copied,
            already_present = summary.already_present,
            "backfill finished"
        );

        Ok(summary)
    }

    fn store<E: Entry>(&self, backend: Backend) -> &dyn RecordStore<E> {
        match backend {
            Backend::Flat => &self.flat,
            Backend::Relational => &self.relational,
        }
    }

    /// Resolve the mode and return the primary store and the secondary
    /// store, if there is one.
    #[allow(clippy::type_complexity)]
    fn route<E: Entry>(&self) -> (&dyn RecordStore<E>, Option<&dyn RecordStore<E>>) {
        let mode = self.mode();
        tracing::debug!(mode = %mode, kind = %E::KIND, "routing storage operation");

        (
            self.store(mode.primary()),
            mode.secondary().map(|backend| self.store(backend)),
        )
    }
}
