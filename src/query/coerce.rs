use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rusqlite::types::{FromSqlResult, Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

use crate::error::SocietyError;

use super::columns::{ColType, ColumnRef};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const CURRENCY_SCALE: u32 = 2;

/// Convert one JSON scalar into the SQL value stored for `column`.
pub fn coerce_scalar(column: &ColumnRef, value: &Value) -> Result<SqlValue, SocietyError> {
    let field = column.display_name();
    let col_type = column.col_type();
    let mismatch = || SocietyError::type_mismatch(&field, expected_name(col_type), value);

    match col_type {
        ColType::Id | ColType::Int => match value {
            Value::Number(n) => n.as_i64().map(SqlValue::Integer).ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Integer)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ColType::Float => match value {
            Value::Number(n) => n.as_f64().map(SqlValue::Real).ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(SqlValue::Real)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ColType::Decimal => {
            let decimal = match value {
                Value::Number(n) => decimal_from_number(n),
                Value::String(s) => parse_decimal(s.trim()),
                _ => None,
            }
            .ok_or_else(mismatch)?;
            decimal_to_minor_units(decimal)
                .map(SqlValue::Integer)
                .ok_or_else(mismatch)
        }
        ColType::String => match value {
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            _ => Err(mismatch()),
        },
        ColType::Bool => match value {
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(SqlValue::Integer(1)),
                "false" => Ok(SqlValue::Integer(0)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ColType::Date => match value {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(|date| SqlValue::Text(date.format(DATE_FORMAT).to_string()))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ColType::DateTime => match value {
            Value::Number(n) => n.as_i64().map(SqlValue::Integer).ok_or_else(mismatch),
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| SqlValue::Integer(dt.timestamp()))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ColType::Enum(allowed) => match value {
            Value::String(s) if allowed.contains(&s.as_str()) => Ok(SqlValue::Text(s.clone())),
            _ => Err(SocietyError::type_mismatch(
                &field,
                format!("one of [{}]", allowed.join(", ")),
                value,
            )),
        },
    }
}

/// Order two values produced by `coerce_scalar` for the same column.
pub fn compare_sql_values(a: &SqlValue, b: &SqlValue) -> Option<Ordering> {
    match (a, b) {
        (SqlValue::Integer(a), SqlValue::Integer(b)) => Some(a.cmp(b)),
        (SqlValue::Real(a), SqlValue::Real(b)) => a.partial_cmp(b),
        (SqlValue::Text(a), SqlValue::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Decode a stored value into its JSON form.
pub fn decode_value(col_type: ColType, value: ValueRef<'_>) -> FromSqlResult<Value> {
    if let ValueRef::Null = value {
        return Ok(Value::Null);
    }

    let json = match col_type {
        ColType::Id | ColType::Int => Value::from(value.as_i64()?),
        ColType::Float => Number::from_f64(value.as_f64()?)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColType::Decimal => {
            Value::String(Decimal::new(value.as_i64()?, CURRENCY_SCALE).to_string())
        }
        ColType::Bool => Value::Bool(value.as_i64()? != 0),
        ColType::DateTime => {
            let secs = value.as_i64()?;
            match DateTime::<Utc>::from_timestamp(secs, 0) {
                Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
                None => Value::from(secs),
            }
        }
        ColType::String | ColType::Date | ColType::Enum(_) => {
            Value::String(value.as_str()?.to_owned())
        }
    };

    Ok(json)
}

fn expected_name(col_type: ColType) -> &'static str {
    match col_type {
        ColType::Id | ColType::Int => "integer",
        ColType::Float => "number",
        ColType::Decimal => "decimal with at most 2 places",
        ColType::String => "string",
        ColType::Bool => "boolean",
        ColType::Date => "date (YYYY-MM-DD)",
        ColType::DateTime => "RFC 3339 datetime or unix seconds",
        ColType::Enum(_) => "enum value",
    }
}

fn decimal_from_number(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    parse_decimal(&n.to_string())
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn decimal_to_minor_units(decimal: Decimal) -> Option<i64> {
    let scaled = decimal.checked_mul(Decimal::ONE_HUNDRED)?;
    if !scaled.fract().is_zero() {
        return None;
    }
    scaled.to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{FLATS, PAYMENTS, RESIDENTS};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn col(table: &'static crate::query::TableDescriptor, field: &str) -> ColumnRef {
        table.column(field).unwrap()
    }

    #[test]
    fn test_currency_to_minor_units() {
        let amount = col(&PAYMENTS, "amount");
        assert_eq!(coerce_scalar(&amount, &json!(1500)).unwrap(), SqlValue::Integer(150000));
        assert_eq!(coerce_scalar(&amount, &json!(99.5)).unwrap(), SqlValue::Integer(9950));
        assert_eq!(coerce_scalar(&amount, &json!("12.34")).unwrap(), SqlValue::Integer(1234));
        assert!(matches!(
            coerce_scalar(&amount, &json!("12.345")),
            Err(SocietyError::TypeMismatch { .. })
        ));
        assert!(matches!(
            coerce_scalar(&amount, &json!(true)),
            Err(SocietyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_integer_columns() {
        let floor = col(&FLATS, "floor");
        assert_eq!(coerce_scalar(&floor, &json!(3)).unwrap(), SqlValue::Integer(3));
        assert_eq!(coerce_scalar(&floor, &json!("7")).unwrap(), SqlValue::Integer(7));
        assert!(coerce_scalar(&floor, &json!(2.5)).is_err());
        assert!(coerce_scalar(&floor, &json!("three")).is_err());
        assert!(coerce_scalar(&floor, &Value::Null).is_err());
    }

    #[test]
    fn test_dates_and_datetimes() {
        let move_in = col(&RESIDENTS, "moveInDate");
        assert_eq!(
            coerce_scalar(&move_in, &json!("2024-03-01")).unwrap(),
            SqlValue::Text("2024-03-01".into())
        );
        assert!(coerce_scalar(&move_in, &json!("2024-02-30")).is_err());
        assert!(coerce_scalar(&move_in, &json!(20240301)).is_err());

        let created = col(&RESIDENTS, "createdAt");
        assert_eq!(
            coerce_scalar(&created, &json!("1970-01-02T00:00:00Z")).unwrap(),
            SqlValue::Integer(86_400)
        );
        assert_eq!(coerce_scalar(&created, &json!(60)).unwrap(), SqlValue::Integer(60));
    }

    #[test]
    fn test_enum_and_bool() {
        let method = col(&PAYMENTS, "method");
        assert_eq!(
            coerce_scalar(&method, &json!("upi")).unwrap(),
            SqlValue::Text("upi".into())
        );
        match coerce_scalar(&method, &json!("bitcoin")) {
            Err(SocietyError::TypeMismatch { field, expected, .. }) => {
                assert_eq!(field, "method");
                assert_eq!(expected, "one of [cash, cheque, upi, bank_transfer]");
            }
            other => panic!("unexpected {other:?}"),
        }

        let owner = col(&RESIDENTS, "isOwner");
        assert_eq!(coerce_scalar(&owner, &json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(coerce_scalar(&owner, &json!("false")).unwrap(), SqlValue::Integer(0));
        assert!(coerce_scalar(&owner, &json!(1)).is_err());
    }

    #[test]
    fn test_decode_values() {
        assert_eq!(
            decode_value(ColType::Decimal, ValueRef::Integer(150050)).unwrap(),
            json!("1500.50")
        );
        assert_eq!(
            decode_value(ColType::DateTime, ValueRef::Integer(86_400)).unwrap(),
            json!("1970-01-02T00:00:00Z")
        );
        assert_eq!(decode_value(ColType::Bool, ValueRef::Integer(0)).unwrap(), json!(false));
        assert_eq!(decode_value(ColType::String, ValueRef::Null).unwrap(), Value::Null);
        assert_eq!(
            decode_value(ColType::Date, ValueRef::Text(b"2024-01-31")).unwrap(),
            json!("2024-01-31")
        );
    }

    #[test]
    fn test_compare_sql_values() {
        assert_eq!(
            compare_sql_values(&SqlValue::Integer(100), &SqlValue::Integer(50)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_sql_values(&SqlValue::Text("2024-01-01".into()), &SqlValue::Text("2024-02-01".into())),
            Some(Ordering::Less)
        );
        assert_eq!(compare_sql_values(&SqlValue::Integer(1), &SqlValue::Null), None);
    }
}
