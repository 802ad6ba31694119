// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{error::Error, fmt::Display, str::FromStr};

use bytes::BytesMut;
use pg_bigdecimal::{BigDecimal, PgNumeric};
use serde_json::Value;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};

type BindResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// A value bound to a statement placeholder.
///
/// Query-string values arrive untyped and JSON bodies carry only JSON types, while the binary
/// protocol requires each parameter to be encoded in the exact type Postgres inferred for its
/// placeholder. A `BoundValue` therefore converts itself at bind time to whatever type the
/// server asks for (`"population" > $1` binds `Text("1000")` as an `int4`, for example).
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Null,
    Text(String),
    Integer(i64),
    Json(Value),
}

impl Display for BoundValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundValue::Null => f.write_str("NULL"),
            BoundValue::Text(text) => write!(f, "'{text}'"),
            BoundValue::Integer(i) => write!(f, "{i}"),
            BoundValue::Json(value) => write!(f, "{value}"),
        }
    }
}

impl BoundValue {
    /// Whether a value can be encoded for a parameter of type `ty`. Parameters of other types
    /// must be cast through `text` in the statement (see [`crate::prepare_bindable`]).
    pub fn binds_natively(ty: &Type) -> bool {
        match *ty {
            Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::NUMERIC
            | Type::TEXT
            | Type::VARCHAR
            | Type::BPCHAR
            | Type::NAME
            | Type::UNKNOWN
            | Type::JSON
            | Type::JSONB
            | Type::UUID
            | Type::DATE
            | Type::TIME
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ => true,
            _ => match ty.kind() {
                Kind::Enum(_) => true,
                Kind::Domain(base) => Self::binds_natively(base),
                Kind::Array(element) => Self::binds_natively(element),
                _ => false,
            },
        }
    }
}

impl ToSql for BoundValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> BindResult {
        match self {
            BoundValue::Null => Ok(IsNull::Yes),
            BoundValue::Text(text) => text_to_sql(text, ty, out),
            BoundValue::Integer(i) => match *ty {
                Type::INT8 => i.to_sql(ty, out),
                _ => text_to_sql(&i.to_string(), ty, out),
            },
            BoundValue::Json(value) => json_to_sql(value, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn text_to_sql(text: &str, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::BOOL => parse_bool(text)?.to_sql(ty, out),
        Type::INT2 => text.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => text.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => text.trim().parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => text.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => text.trim().parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => PgNumeric::new(Some(BigDecimal::from_str(text.trim())?)).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            text.to_sql(ty, out)
        }
        Type::JSON | Type::JSONB => {
            // Query-string values such as `eq.5` or `eq.{"a":1}` are JSON already; anything else
            // is taken as a JSON string
            let value = serde_json::from_str::<Value>(text)
                .unwrap_or_else(|_| Value::String(text.to_string()));
            value.to_sql(ty, out)
        }
        Type::UUID => uuid::Uuid::parse_str(text.trim())?.to_sql(ty, out),
        Type::DATE => chrono::NaiveDate::from_str(text.trim())?.to_sql(ty, out),
        Type::TIME => chrono::NaiveTime::from_str(text.trim())?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(text.trim())?.to_sql(ty, out),
        Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(text.trim())
            .or_else(|_| chrono::DateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S%.f%#z"))?
            .with_timezone(&chrono::Utc)
            .to_sql(ty, out),
        _ => match ty.kind() {
            // Enum values are sent as their label
            Kind::Enum(_) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            Kind::Domain(base) => text_to_sql(text, base, out),
            _ => Err(format!("Cannot bind '{text}' to a parameter of type {ty}").into()),
        },
    }
}

fn json_to_sql(value: &Value, ty: &Type, out: &mut BytesMut) -> BindResult {
    if matches!(*ty, Type::JSON | Type::JSONB) {
        return value.to_sql(ty, out);
    }

    match value {
        Value::Null => Ok(IsNull::Yes),
        Value::String(text) => text_to_sql(text, ty, out),
        Value::Number(number) => text_to_sql(&number.to_string(), ty, out),
        Value::Bool(b) => text_to_sql(if *b { "true" } else { "false" }, ty, out),
        Value::Array(elements) => match ty.kind() {
            Kind::Array(_) => elements
                .iter()
                .map(|element| BoundValue::Json(element.clone()))
                .collect::<Vec<_>>()
                .to_sql(ty, out),
            Kind::Domain(base) => json_to_sql(value, base, out),
            _ => text_to_sql(&value.to_string(), ty, out),
        },
        Value::Object(_) => match ty.kind() {
            Kind::Domain(base) => json_to_sql(value, base, out),
            _ => text_to_sql(&value.to_string(), ty, out),
        },
    }
}

fn parse_bool(text: &str) -> Result<bool, Box<dyn Error + Sync + Send>> {
    match text.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        _ => Err(format!("Invalid boolean value '{text}'").into()),
    }
}

fn parse_timestamp(text: &str) -> Result<chrono::NaiveDateTime, chrono::ParseError> {
    chrono::NaiveDateTime::from_str(text)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(value: BoundValue, ty: Type) -> Result<(IsNull, Vec<u8>), String> {
        let mut out = BytesMut::new();
        value
            .to_sql(&ty, &mut out)
            .map(|is_null| (is_null, out.to_vec()))
            .map_err(|e| e.to_string())
    }

    fn expected<T: ToSql>(value: T, ty: Type) -> Vec<u8> {
        let mut out = BytesMut::new();
        value.to_sql(&ty, &mut out).unwrap();
        out.to_vec()
    }

    #[test]
    fn text_adapts_to_numeric_types() {
        let (_, bytes) = bind(BoundValue::Text("42".into()), Type::INT4).unwrap();
        assert_eq!(bytes, expected(42i32, Type::INT4));

        let (_, bytes) = bind(BoundValue::Text("42".into()), Type::INT8).unwrap();
        assert_eq!(bytes, expected(42i64, Type::INT8));

        let (_, bytes) = bind(BoundValue::Text("1.5".into()), Type::FLOAT8).unwrap();
        assert_eq!(bytes, expected(1.5f64, Type::FLOAT8));
    }

    #[test]
    fn text_that_does_not_parse_is_a_bind_error() {
        assert!(bind(BoundValue::Text("abc".into()), Type::INT4).is_err());
        assert!(bind(BoundValue::Text("maybe".into()), Type::BOOL).is_err());
    }

    #[test]
    fn integer_binds_to_text_and_int() {
        let (_, bytes) = bind(BoundValue::Integer(7), Type::TEXT).unwrap();
        assert_eq!(bytes, b"7".to_vec());

        let (_, bytes) = bind(BoundValue::Integer(7), Type::INT2).unwrap();
        assert_eq!(bytes, expected(7i16, Type::INT2));
    }

    #[test]
    fn json_values() {
        let (is_null, _) = bind(BoundValue::Json(Value::Null), Type::INT4).unwrap();
        assert!(matches!(is_null, IsNull::Yes));

        let (_, bytes) = bind(BoundValue::Json(serde_json::json!(true)), Type::BOOL).unwrap();
        assert_eq!(bytes, expected(true, Type::BOOL));

        let object = serde_json::json!({"a": 1});
        let (_, bytes) = bind(BoundValue::Json(object.clone()), Type::JSONB).unwrap();
        assert_eq!(bytes, expected(object, Type::JSONB));
    }

    #[test]
    fn text_into_json_column() {
        let (_, bytes) = bind(BoundValue::Text("plain".into()), Type::JSONB).unwrap();
        assert_eq!(bytes, expected(Value::String("plain".into()), Type::JSONB));

        let (_, bytes) = bind(BoundValue::Text("5".into()), Type::JSON).unwrap();
        assert_eq!(bytes, expected(serde_json::json!(5), Type::JSON));
    }

    #[test]
    fn natively_bound_types() {
        assert!(BoundValue::binds_natively(&Type::INT4));
        assert!(BoundValue::binds_natively(&Type::TIMESTAMPTZ));
        assert!(BoundValue::binds_natively(&Type::TEXT_ARRAY));

        assert!(!BoundValue::binds_natively(&Type::INTERVAL));
        assert!(!BoundValue::binds_natively(&Type::INET));
        assert!(!BoundValue::binds_natively(&Type::BYTEA));
        assert!(!BoundValue::binds_natively(&Type::INET_ARRAY));
    }

    #[test]
    fn null_is_null_for_any_type() {
        let (is_null, bytes) = bind(BoundValue::Null, Type::UUID).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(bytes.is_empty());
    }
}
