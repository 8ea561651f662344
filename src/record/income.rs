use rusqlite::{Row, ToSql};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    record::{
        Amount, DEFAULT_CURRENCY, Entry, EntryKind, EntryPatch, EntryPayload,
        payload::common_fields,
    },
};

/// Money earned, e.g. a salary payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    /// When the money was received.
    pub date: Date,
    /// Where the money came from, e.g. "Salary".
    pub category: String,
    /// How much was received.
    pub amount: Amount,
    /// The account the money was paid into.
    pub account: String,
    /// The currency symbol of the amount.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_owned()
}

impl Entry for Income {
    const KIND: EntryKind = EntryKind::Income;

    const COLUMNS: &'static [&'static str] =
        &["date", "category", "amount", "account", "currency", "notes"];

    fn from_payload(mut payload: EntryPayload) -> Result<Self, Error> {
        let common = common_fields(&mut payload)?;

        Ok(Self {
            date: common.date,
            category: common.category,
            amount: common.amount,
            account: common.account,
            currency: common.currency,
            notes: common.notes,
        })
    }

    fn apply(&mut self, patch: &EntryPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(account) = &patch.account {
            self.account = account.clone();
        }
        if let Some(currency) = &patch.currency {
            self.currency = currency.clone();
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
    }

    fn sql_values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.date,
            &self.category,
            &self.amount,
            &self.account,
            &self.currency,
            &self.notes,
        ]
    }

    fn from_row(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            date: row.get(offset)?,
            category: row.get(offset + 1)?,
            amount: row.get(offset + 2)?,
            account: row.get(offset + 3)?,
            currency: row.get(offset + 4)?,
            notes: row.get(offset + 5)?,
        })
    }
}
