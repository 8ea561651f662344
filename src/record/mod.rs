//! Expense and income records.
//!
//! This module contains everything related to the records themselves:
//! - The [Record] wrapper and the [Entry] trait shared by [Expense] and [Income]
//! - The validated [Amount] type
//! - Request payloads and the validation that turns them into entries and patches
//! - Route handlers for the record endpoints

mod amount;
mod body;
mod create;
mod delete;
mod domain;
mod edit;
mod expense;
mod income;
mod list;
mod payload;

pub use amount::Amount;
pub use body::JsonBody;
pub use create::create_record_endpoint;
pub use delete::{bulk_delete_records_endpoint, delete_record_endpoint};
pub use domain::{DEFAULT_CURRENCY, Entry, EntryKind, Record, RecordId};
pub use edit::{patch_record_endpoint, update_record_endpoint};
pub use expense::Expense;
pub use income::Income;
pub use list::{get_expense_summary_endpoint, get_record_endpoint, list_records_endpoint};
pub use payload::{EntryPatch, EntryPayload, FieldUpdate};

#[cfg(test)]
pub use payload::{test_expense, test_income};
