//! Bookkeeping for writes to the secondary store and for comparing the two
//! stores.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    Error,
    record::{Entry, EntryKind, Record, RecordId},
    stores::Backend,
};

/// Describes one write to the secondary store so that its failures can be
/// logged with enough context to reconcile the stores later.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SecondaryWrite {
    operation: &'static str,
    kind: EntryKind,
    backend: Backend,
    record_id: Option<RecordId>,
}

/// The result of a secondary write.
///
/// Only one of the two fields is set. The error has already been logged
/// when the outcome is returned and must not be propagated to the caller.
#[derive(Debug)]
pub(crate) struct SecondaryOutcome<T> {
    pub(crate) value: Option<T>,
    pub(crate) error: Option<Error>,
}

impl SecondaryWrite {
    pub(crate) fn new(
        operation: &'static str,
        kind: EntryKind,
        backend: Backend,
        record_id: Option<RecordId>,
    ) -> Self {
        Self {
            operation,
            kind,
            backend,
            record_id,
        }
    }

    /// Run `write` against the secondary store, logging instead of returning
    /// any error.
    pub(crate) fn run<T>(&self, write: impl FnOnce() -> Result<T, Error>) -> SecondaryOutcome<T> {
        let outcome = match write() {
            Ok(value) => SecondaryOutcome {
                value: Some(value),
                error: None,
            },
            Err(error) => SecondaryOutcome {
                value: None,
                error: Some(error),
            },
        };

        match &outcome.error {
            None => tracing::debug!(
                operation = self.operation,
                kind = %self.kind,
                backend = %self.backend,
                record_id = self.record_id,
                "secondary write succeeded"
            ),
            Some(Error::DuplicateId(id)) => {
                self.divergence(&format!("record {id} already exists in the secondary store"))
            }
            Some(error) => tracing::warn!(
                operation = self.operation,
                kind = %self.kind,
                backend = %self.backend,
                record_id = self.record_id,
                error = %error,
                "secondary write failed, the stores may have diverged"
            ),
        }

        outcome
    }

    /// Log that the secondary store no longer agrees with the primary.
    pub(crate) fn divergence(&self, detail: &str) {
        tracing::warn!(
            operation = self.operation,
            kind = %self.kind,
            backend = %self.backend,
            record_id = self.record_id,
            detail,
            "storage divergence detected"
        );
    }
}

/// The differences between the flat and relational copies of a collection.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DivergenceReport {
    /// IDs of records only the flat store has.
    pub only_in_flat: Vec<RecordId>,
    /// IDs of records only the relational store has.
    pub only_in_relational: Vec<RecordId>,
    /// IDs of records both stores have, but with different fields.
    pub mismatched: Vec<RecordId>,
}

impl DivergenceReport {
    /// Compare the two copies of a collection.
    pub fn between<E: Entry>(flat: &[Record<E>], relational: &[Record<E>]) -> Self {
        let mut relational: BTreeMap<RecordId, &E> = relational
            .iter()
            .map(|record| (record.id, &record.entry))
            .collect();
        let mut report = Self::default();

        for record in flat {
            match relational.remove(&record.id) {
                None => report.only_in_flat.push(record.id),
                Some(entry) if *entry != record.entry => report.mismatched.push(record.id),
                Some(_) => {}
            }
        }

        report.only_in_flat.sort_unstable();
        report.mismatched.sort_unstable();
        report.only_in_relational = relational.into_keys().collect();

        report
    }

    /// Whether both stores hold exactly the same records.
    pub fn is_consistent(&self) -> bool {
        self.only_in_flat.is_empty() && self.only_in_relational.is_empty() && self.mismatched.is_empty()
    }
}

/// What a backfill from one store into the other did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    /// How many records were copied.
    pub copied: usize,
    /// How many records the target store already had.
    pub already_present: usize,
}
