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

/// Money spent, e.g. a grocery shop or a bus fare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// When the money was spent.
    pub date: Date,
    /// The business or vendor that was paid.
    #[serde(default)]
    pub business: Option<String>,
    /// What the money was spent on, e.g. "Groceries".
    pub category: String,
    /// How much was spent.
    pub amount: Amount,
    /// The account the money was paid from, e.g. "Visa 1234".
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

impl Entry for Expense {
    const KIND: EntryKind = EntryKind::Expense;

    const COLUMNS: &'static [&'static str] = &[
        "date", "business", "category", "amount", "account", "currency", "notes",
    ];

    fn from_payload(mut payload: EntryPayload) -> Result<Self, Error> {
        let common = common_fields(&mut payload)?;

        Ok(Self {
            date: common.date,
            business: payload.business,
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
        if let Some(business) = &patch.business {
            self.business = business.clone();
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
            &self.business,
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
            business: row.get(offset + 1)?,
            category: row.get(offset + 2)?,
            amount: row.get(offset + 3)?,
            account: row.get(offset + 4)?,
            currency: row.get(offset + 5)?,
            notes: row.get(offset + 6)?,
        })
    }
}
