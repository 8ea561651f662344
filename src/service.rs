//! Domain level operations on expenses and incomes.
//!
//! The service validates request payloads and hands the resulting entries and
//! patches to the [StorageController], never to a store directly.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::{
    Error,
    flags::{ENHANCED_EXPENSE_STATS, EXPENSE_AMOUNT_V2_FORMAT},
    record::{
        Amount, Entry, EntryPatch, EntryPayload, Expense, FieldUpdate, Income, Record, RecordId,
    },
    storage::{StorageController, StorageMode},
};

/// Totals over all expenses.
///
/// The average, smallest and largest amount are only filled in when the
/// `ENHANCED_EXPENSE_STATS` flag is on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummary {
    /// The sum of all amounts.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    /// The number of expenses.
    pub count: usize,
    /// The mean amount, rounded to cents.
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average: Option<Decimal>,
    /// The smallest amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Amount>,
    /// The largest amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Amount>,
}

/// Validates and stores expense and income records.
#[derive(Debug, Clone)]
pub struct RecordService {
    controller: Arc<StorageController>,
}

impl RecordService {
    /// Create a service that stores records through `controller`.
    pub fn new(controller: StorageController) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }

    /// The controller the service stores records through.
    pub fn controller(&self) -> &StorageController {
        &self.controller
    }

    /// The storage mode the next operation will run in.
    pub fn storage_mode(&self) -> StorageMode {
        self.controller.mode()
    }

    /// Retrieve every record of kind `E`, ordered by ID.
    pub fn list<E: Entry>(&self) -> Result<Vec<Record<E>>, Error> {
        self.controller.list()
    }

    /// Retrieve a record by its ID.
    pub fn get<E: Entry>(&self, id: RecordId) -> Result<Record<E>, Error> {
        self.controller.get(id)
    }

    /// Validate `payload` and store it as a new record.
    ///
    /// # Errors
    /// Returns a validation error if a required field is missing or
    /// malformed, otherwise the error of the primary store, if any.
    pub fn add<E: Entry>(&self, payload: EntryPayload) -> Result<Record<E>, Error> {
        let entry = E::from_payload(payload)?;
        let record = self.controller.create(entry)?;

        tracing::info!(kind = %E::KIND, id = record.id, "created record");

        Ok(record)
    }

    /// Change the fields present in `payload`, leaving the others as they are.
    ///
    /// # Errors
    /// Returns a validation error for a malformed field or [Error::NotFound]
    /// if the record does not exist.
    pub fn update<E: Entry>(&self, id: RecordId, payload: EntryPayload) -> Result<Record<E>, Error> {
        let patch = EntryPatch::from_payload::<E>(payload)?;

        self.apply(id, patch)
    }

    /// Change a single field of a record.
    ///
    /// # Errors
    /// Returns [Error::InvalidField] if the kind has no such field, a
    /// validation error for a malformed value, or [Error::NotFound] if the
    /// record does not exist.
    pub fn update_field<E: Entry>(&self, id: RecordId, update: FieldUpdate) -> Result<Record<E>, Error> {
        let patch = EntryPatch::from_field::<E>(update)?;

        self.apply(id, patch)
    }

    /// Delete a record.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the record does not exist.
    pub fn remove<E: Entry>(&self, id: RecordId) -> Result<(), Error> {
        self.controller.remove::<E>(id)?;

        tracing::info!(kind = %E::KIND, id, "deleted record");

        Ok(())
    }

    /// Delete the records with the given IDs, returning how many existed.
    pub fn bulk_remove<E: Entry>(&self, ids: &[RecordId]) -> Result<usize, Error> {
        let count = self.controller.bulk_remove::<E>(ids)?;

        tracing::info!(kind = %E::KIND, requested = ids.len(), count, "bulk deleted records");

        Ok(count)
    }

    /// Format `amount` followed by `currency`, e.g. "1234.50 ₪".
    ///
    /// With the `EXPENSE_AMOUNT_V2_FORMAT` flag on, thousands are separated,
    /// e.g. "1,234.50 ₪".
    pub fn format_amount(&self, amount: Amount, currency: &str) -> String {
        if self.controller.flag_enabled(EXPENSE_AMOUNT_V2_FORMAT) {
            format!("{} {currency}", amount.to_grouped_string())
        } else {
            format!("{amount} {currency}")
        }
    }

    /// Summarize the expenses in the authoritative store.
    pub fn expense_summary(&self) -> Result<ExpenseSummary, Error> {
        let amounts: Vec<Amount> = self
            .list::<Expense>()?
            .into_iter()
            .map(|record| record.entry.amount)
            .collect();
        let total: Decimal = amounts.iter().map(Amount::as_decimal).sum();
        let count = amounts.len();

        let mut summary = ExpenseSummary {
            total,
            count,
            average: None,
            min: None,
            max: None,
        };

        if count > 0 && self.controller.flag_enabled(ENHANCED_EXPENSE_STATS) {
            summary.average = Some((total / Decimal::from(count)).round_dp(Amount::SCALE));
            summary.min = amounts.iter().min().copied();
            summary.max = amounts.iter().max().copied();
        }

        Ok(summary)
    }

    /// Store a few sample expenses and incomes, returning how many records
    /// were created.
    ///
    /// Nothing is stored unless both collections are empty.
    pub fn seed(&self) -> Result<usize, Error> {
        if !self.list::<Expense>()?.is_empty() || !self.list::<Income>()?.is_empty() {
            tracing::info!("records already exist, skipping seed");
            return Ok(0);
        }

        let expenses = [
            ("2025-11-01", Some("SuperSal"), "Groceries", "142.50", "Visa 1234"),
            ("2025-11-03", Some("Rav-Kav"), "Transport", "15.00", "Cash"),
            ("2025-11-05", Some("Cafe Aroma"), "Dining", "35.00", "Visa 1234"),
        ];
        let incomes = [
            ("2025-11-01", None, "Salary", "8200.00", "Bank Leumi"),
            ("2025-11-15", None, "Freelance", "1250.00", "PayPal"),
        ];

        for payload in expenses.into_iter().map(sample_payload) {
            self.add::<Expense>(payload)?;
        }
        for payload in incomes.into_iter().map(sample_payload) {
            self.add::<Income>(payload)?;
        }

        Ok(expenses.len() + incomes.len())
    }

    fn apply<E: Entry>(&self, id: RecordId, patch: EntryPatch) -> Result<Record<E>, Error> {
        if patch.is_empty() {
            return self.get(id);
        }

        let record = self.controller.update(id, &patch)?;

        tracing::info!(kind = %E::KIND, id, "updated record");

        Ok(record)
    }
}

fn sample_payload(
    (date, business, category, amount, account): (&str, Option<&str>, &str, &str, &str),
) -> EntryPayload {
    EntryPayload {
        date: Some(date.to_owned()),
        business: business.map(str::to_owned),
        category: Some(category.to_owned()),
        amount: Some(Value::from(amount)),
        account: Some(account.to_owned()),
        ..Default::default()
    }
}
