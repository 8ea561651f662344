//! Request payloads and their validation.
//!
//! Payloads arrive loosely typed: every field is optional and the amount may
//! be a number or a string. They are validated here, before they reach the
//! storage layer, into either a complete entry or an [EntryPatch].

use serde::Deserialize;
use serde_json::Value;
use time::{Date, macros::format_description};

use crate::{
    Error,
    record::{Amount, DEFAULT_CURRENCY, Entry},
};

/// The fields a client may send when creating or replacing a record.
///
/// Unknown fields, including `id`, are ignored.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct EntryPayload {
    /// The date as `YYYY-MM-DD`.
    pub date: Option<String>,
    /// The business or vendor, only used by expenses.
    pub business: Option<String>,
    /// The category, e.g. "Groceries".
    pub category: Option<String>,
    /// The amount as a JSON number or a numeric string.
    pub amount: Option<Value>,
    /// The account the money moved through.
    pub account: Option<String>,
    /// The currency symbol, defaults to [DEFAULT_CURRENCY].
    pub currency: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// A request to change a single field of a record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldUpdate {
    /// The name of the field to change.
    pub field: String,
    /// The new value for the field, null if omitted.
    #[serde(default)]
    pub value: Value,
}

/// A validated partial update.
///
/// Fields that are `None` are left unchanged. The nullable fields `business`
/// and `notes` use a nested option so that a patch can clear them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntryPatch {
    /// The new date.
    pub date: Option<Date>,
    /// The new business, `Some(None)` clears it.
    pub business: Option<Option<String>>,
    /// The new category.
    pub category: Option<String>,
    /// The new amount.
    pub amount: Option<Amount>,
    /// The new account.
    pub account: Option<String>,
    /// The new currency.
    pub currency: Option<String>,
    /// The new notes, `Some(None)` clears them.
    pub notes: Option<Option<String>>,
}

impl EntryPatch {
    /// Validate the fields present in a PUT payload.
    ///
    /// Absent fields are preserved. `business` is ignored for kinds that do
    /// not have it.
    ///
    /// # Errors
    /// Returns a validation error if a present field is malformed.
    pub fn from_payload<E: Entry>(payload: EntryPayload) -> Result<Self, Error> {
        let business = if E::COLUMNS.contains(&"business") {
            payload.business.map(Some)
        } else {
            None
        };

        Ok(Self {
            date: payload.date.as_deref().map(parse_date).transpose()?,
            business,
            category: payload
                .category
                .map(|category| non_blank("category", category))
                .transpose()?,
            amount: payload.amount.as_ref().map(Amount::from_json).transpose()?,
            account: payload
                .account
                .map(|account| non_blank("account", account))
                .transpose()?,
            currency: payload.currency.map(currency_or_default),
            notes: payload.notes.map(Some),
        })
    }

    /// Validate a single-field update for the record kind `E`.
    ///
    /// A null `currency` resets it to [DEFAULT_CURRENCY], a null `notes` or
    /// `business` clears the field.
    ///
    /// # Errors
    /// Returns an [Error::InvalidField] if `E` has no field with the given
    /// name, or an [Error::InvalidValue] if the value has the wrong type.
    pub fn from_field<E: Entry>(update: FieldUpdate) -> Result<Self, Error> {
        let FieldUpdate { field, value } = update;

        if !E::COLUMNS.contains(&field.as_str()) {
            return Err(Error::InvalidField(field));
        }

        let mut patch = Self::default();

        match field.as_str() {
            "date" => patch.date = Some(parse_date(&required_string(&field, value)?)?),
            "category" => {
                patch.category = Some(non_blank("category", required_string(&field, value)?)?)
            }
            "account" => {
                patch.account = Some(non_blank("account", required_string(&field, value)?)?)
            }
            "amount" => {
                if value.is_null() {
                    return Err(invalid_value(&field, "value cannot be null"));
                }
                patch.amount = Some(Amount::from_json(&value)?);
            }
            "currency" => {
                patch.currency = Some(
                    optional_string(&field, value)?
                        .map(currency_or_default)
                        .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
                )
            }
            "business" => patch.business = Some(optional_string(&field, value)?),
            "notes" => patch.notes = Some(optional_string(&field, value)?),
            _ => return Err(Error::InvalidField(field)),
        }

        Ok(patch)
    }

    /// Whether the patch leaves every field unchanged.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
/// Returns an [Error::InvalidDate] if `text` is not a valid calendar date.
pub fn parse_date(text: &str) -> Result<Date, Error> {
    Date::parse(text.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| Error::InvalidDate(text.to_owned()))
}

/// Take a required string field from a create payload.
pub(crate) fn required(field: &'static str, value: Option<String>) -> Result<String, Error> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::MissingField(field)),
    }
}

/// Take and validate the fields every kind of record shares.
pub(crate) fn common_fields(payload: &mut EntryPayload) -> Result<CommonFields, Error> {
    let date = payload
        .date
        .take()
        .ok_or(Error::MissingField("date"))
        .and_then(|date| parse_date(&date))?;
    let category = required("category", payload.category.take())?;
    let amount = payload
        .amount
        .take()
        .filter(|amount| !amount.is_null())
        .ok_or(Error::MissingField("amount"))
        .and_then(|amount| Amount::from_json(&amount))?;
    let account = required("account", payload.account.take())?;
    let currency = payload
        .currency
        .take()
        .map(currency_or_default)
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned());

    Ok(CommonFields {
        date,
        category,
        amount,
        account,
        currency,
        notes: payload.notes.take(),
    })
}

/// The validated fields shared by expenses and incomes.
pub(crate) struct CommonFields {
    pub date: Date,
    pub category: String,
    pub amount: Amount,
    pub account: String,
    pub currency: String,
    pub notes: Option<String>,
}

fn currency_or_default(currency: String) -> String {
    if currency.trim().is_empty() {
        DEFAULT_CURRENCY.to_owned()
    } else {
        currency
    }
}

fn non_blank(field: &str, value: String) -> Result<String, Error> {
    if value.trim().is_empty() {
        Err(invalid_value(field, "value cannot be blank"))
    } else {
        Ok(value)
    }
}

fn required_string(field: &str, value: Value) -> Result<String, Error> {
    optional_string(field, value)?.ok_or_else(|| invalid_value(field, "value cannot be null"))
}

fn optional_string(field: &str, value: Value) -> Result<Option<String>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        other => Err(invalid_value(field, &format!("expected a string, got {other}"))),
    }
}

fn invalid_value(field: &str, reason: &str) -> Error {
    Error::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
pub fn test_expense(date: Date, category: &str, amount: &str) -> crate::record::Expense {
    crate::record::Expense {
        date,
        business: None,
        category: category.to_owned(),
        amount: amount.parse().expect("invalid test amount"),
        account: "Cash".to_owned(),
        currency: DEFAULT_CURRENCY.to_owned(),
        notes: None,
    }
}

#[cfg(test)]
pub fn test_income(date: Date, category: &str, amount: &str) -> crate::record::Income {
    crate::record::Income {
        date,
        category: category.to_owned(),
        amount: amount.parse().expect("invalid test amount"),
        account: "Bank".to_owned(),
        currency: DEFAULT_CURRENCY.to_owned(),
        notes: None,
    }
}

#[cfg(test)]
mod from_payload_tests {
    use rust_decimal_macros::dec;
    use serde_json::json;
    use time::macros::date;

    use crate::{
        Error,
        record::{DEFAULT_CURRENCY, Entry, EntryPayload, Expense, Income},
    };

    fn groceries_payload() -> EntryPayload {
        serde_json::from_value(json!({
            "date": "2025-01-01",
            "category": "Groceries",
            "amount": 42.50,
            "account": "Cash"
        }))
        .unwrap()
    }

    #[test]
    fn currency_defaults_when_omitted() {
        let expense = Expense::from_payload(groceries_payload()).unwrap();

        assert_eq!(expense.currency, DEFAULT_CURRENCY);
        assert_eq!(expense.date, date!(2025 - 01 - 01));
        assert_eq!(expense.amount.as_decimal(), dec!(42.50));
    }

    #[test]
    fn currency_defaults_when_blank() {
        let payload = EntryPayload {
            currency: Some("  ".to_owned()),
            ..groceries_payload()
        };

        let expense = Expense::from_payload(payload).unwrap();

        assert_eq!(expense.currency, DEFAULT_CURRENCY);
    }

    #[test]
    fn explicit_currency_is_kept() {
        let payload = EntryPayload {
            currency: Some("$".to_owned()),
            ..groceries_payload()
        };

        let income = Income::from_payload(payload).unwrap();

        assert_eq!(income.currency, "$");
    }

    #[test]
    fn missing_required_fields_are_reported() {
        for (field, payload) in [
            (
                "date",
                EntryPayload {
                    date: None,
                    ..groceries_payload()
                },
            ),
            (
                "category",
                EntryPayload {
                    category: Some(" ".to_owned()),
                    ..groceries_payload()
                },
            ),
            (
                "amount",
                EntryPayload {
                    amount: None,
                    ..groceries_payload()
                },
            ),
            (
                "account",
                EntryPayload {
                    account: None,
                    ..groceries_payload()
                },
            ),
        ] {
            assert_eq!(
                Expense::from_payload(payload),
                Err(Error::MissingField(field))
            );
        }
    }

    #[test]
    fn non_numeric_amount_is_rejected() {
        let payload = EntryPayload {
            amount: Some(json!("a lot")),
            ..groceries_payload()
        };

        assert_eq!(
            Expense::from_payload(payload),
            Err(Error::InvalidAmount("a lot".to_owned()))
        );
    }

    #[test]
    fn malformed_date_is_rejected() {
        let payload = EntryPayload {
            date: Some("01/01/2025".to_owned()),
            ..groceries_payload()
        };

        assert_eq!(
            Expense::from_payload(payload),
            Err(Error::InvalidDate("01/01/2025".to_owned()))
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let payload: EntryPayload = serde_json::from_value(json!({
            "id": 99,
            "date": "2025-12-14",
            "category": "Test",
            "amount": "50",
            "account": "1234",
            "created_at": "yesterday"
        }))
        .unwrap();

        assert!(Expense::from_payload(payload).is_ok());
    }
}
