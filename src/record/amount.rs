//! Monetary amounts with a fixed scale of two decimal places.

use std::{
    fmt::{self, Display},
    str::FromStr,
    sync::OnceLock,
};

use numfmt::{Formatter, Precision};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Visitor},
};
use serde_json::Value;

use crate::Error;

/// An amount of money, always held with exactly two decimal places.
///
/// Amounts with more precision than cents are rejected rather than rounded,
/// so a stored amount is always exactly what the client sent. Amounts are
/// also limited to ten digits before the decimal point, which keeps them
/// exact when written to the flat store as JSON numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// The number of decimal places every amount is held at.
    pub const SCALE: u32 = 2;

    /// The largest amount that can be stored, 9,999,999,999.99.
    pub const MAX: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

    /// Create an amount from a decimal value.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidAmount] if `value` has more
    /// than [Amount::SCALE] significant decimal places or if its magnitude is
    /// larger than [Amount::MAX].
    pub fn new(value: Decimal) -> Result<Self, Error> {
        let mut normalized = value.normalize();

        if normalized.scale() > Self::SCALE || normalized.abs() > Self::MAX {
            return Err(Error::InvalidAmount(value.to_string()));
        }

        normalized.rescale(Self::SCALE);

        if normalized.scale() != Self::SCALE {
            return Err(Error::InvalidAmount(value.to_string()));
        }

        Ok(Self(normalized))
    }

    /// Parse an amount from a JSON number or a numeric string.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidAmount] if `value` is not
    /// a number or a string containing a number.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Number(number) => number.to_string().parse(),
            Value::String(text) => text.parse(),
            other => Err(Error::InvalidAmount(other.to_string())),
        }
    }

    /// The amount as a decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// The amount with thousands separated by commas, e.g. "-1,234.50".
    pub fn to_grouped_string(&self) -> String {
        static WHOLE_FMT: OnceLock<Formatter> = OnceLock::new();

        let whole_fmt = WHOLE_FMT.get_or_init(|| {
            Formatter::currency("")
                .expect("an empty prefix is valid")
                .precision(Precision::Decimals(0))
        });

        let magnitude = self.0.abs();
        let whole = magnitude.trunc();
        // The whole part has at most ten digits, which an f64 holds exactly.
        let whole_text = match whole.to_string().parse::<f64>() {
            // Zero is hardcoded as "0" by numfmt.
            Ok(value) if value > 0.0 => whole_fmt.fmt_string(value),
            _ => "0".to_owned(),
        };
        let text = magnitude.to_string();
        let cents = &text[text.len() - 3..];
        let sign = if self.0.is_sign_negative() && !self.0.is_zero() {
            "-"
        } else {
            ""
        };

        format!("{sign}{whole_text}{cents}")
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();

        let value = Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map_err(|_| Error::InvalidAmount(s.to_owned()))?;

        Amount::new(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Amounts are at most twelve significant digits, so the nearest f64
        // prints back as the same decimal.
        let value: f64 = self
            .0
            .to_string()
            .parse()
            .map_err(|_| serde::ser::Error::custom(format!("{} is not a valid f64", self.0)))?;

        serializer.serialize_f64(value)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number with at most two decimal places")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Amount::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Amount::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        // The shortest round-trip representation, e.g. "42.5" rather than the
        // exact binary expansion of the float.
        v.to_string().parse().map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let parsed = match value {
            ValueRef::Text(text) => std::str::from_utf8(text)
                .map_err(|error| FromSqlError::Other(Box::new(error)))?
                .parse(),
            ValueRef::Integer(integer) => Amount::new(Decimal::from(integer)),
            ValueRef::Real(real) => real.to_string().parse(),
            _ => return Err(FromSqlError::InvalidType),
        };

        parsed.map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::{Error, record::Amount};

    #[test]
    fn new_pads_to_two_decimal_places() {
        let amount = Amount::new(dec!(42.5)).unwrap();

        assert_eq!(amount.to_string(), "42.50");
    }

    #[test]
    fn new_accepts_trailing_zeros_beyond_scale() {
        let amount = Amount::new(dec!(10.5000)).unwrap();

        assert_eq!(amount.as_decimal(), dec!(10.50));
    }

    #[test]
    fn new_rejects_sub_cent_precision() {
        let amount = Amount::new(dec!(1.005));

        assert_eq!(amount, Err(Error::InvalidAmount("1.005".to_owned())));
    }

    #[test]
    fn max_is_largest_two_place_amount_with_ten_digits() {
        assert_eq!(Amount::MAX, dec!(9999999999.99));
    }

    #[test]
    fn new_accepts_amounts_up_to_max() {
        assert_eq!(
            Amount::new(dec!(9999999999.99)).unwrap().to_string(),
            "9999999999.99"
        );
        assert_eq!(
            Amount::new(dec!(-9999999999.99)).unwrap().to_string(),
            "-9999999999.99"
        );
    }

    #[test]
    fn new_rejects_amounts_beyond_max() {
        for text in [
            "10000000000",
            "-10000000000.00",
            "12345678901234567.89",
            "79228162514264337593543950335",
        ] {
            assert_eq!(
                text.parse::<Amount>(),
                Err(Error::InvalidAmount(text.to_owned())),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn max_amount_survives_json_round_trip() {
        let amount: Amount = "9999999999.99".parse().unwrap();

        let json = serde_json::to_string(&amount).unwrap();
        let parsed: Amount = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, amount);
    }

    #[test]
    fn large_json_number_is_rejected() {
        let amount = Amount::from_json(&json!(12345678901234567.89));

        assert!(matches!(amount, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn grouped_string_separates_thousands() {
        for (amount, want) in [
            ("0", "0.00"),
            ("142.5", "142.50"),
            ("1234.5", "1,234.50"),
            ("-1234567.01", "-1,234,567.01"),
        ] {
            let amount: Amount = amount.parse().unwrap();

            assert_eq!(amount.to_grouped_string(), want);
        }
    }

    #[test]
    fn parses_json_number() {
        let amount = Amount::from_json(&json!(42.50)).unwrap();

        assert_eq!(amount.as_decimal(), dec!(42.50));
    }

    #[test]
    fn parses_json_integer() {
        let amount = Amount::from_json(&json!(100)).unwrap();

        assert_eq!(amount.to_string(), "100.00");
    }

    #[test]
    fn parses_numeric_string() {
        let amount = Amount::from_json(&json!(" 15.00 ")).unwrap();

        assert_eq!(amount.as_decimal(), dec!(15));
    }

    #[test]
    fn rejects_non_numeric_string() {
        let amount = Amount::from_json(&json!("twelve"));

        assert_eq!(amount, Err(Error::InvalidAmount("twelve".to_owned())));
    }

    #[test]
    fn rejects_other_json_types() {
        assert!(Amount::from_json(&json!(true)).is_err());
        assert!(Amount::from_json(&json!({"value": 1})).is_err());
    }

    #[test]
    fn serializes_as_number() {
        let amount: Amount = "142.50".parse().unwrap();

        assert_eq!(serde_json::to_value(amount).unwrap(), json!(142.5));
    }

    #[test]
    fn deserializes_from_number_and_string() {
        let from_number: Amount = serde_json::from_value(json!(8200.0)).unwrap();
        let from_string: Amount = serde_json::from_value(json!("8200")).unwrap();

        assert_eq!(from_number, from_string);
    }

    #[test]
    fn negative_amounts_are_allowed() {
        let amount: Amount = "-20.1".parse().unwrap();

        assert_eq!(amount.to_string(), "-20.10");
    }
}
