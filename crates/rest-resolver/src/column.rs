// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Column references, optionally followed by a JSON path (`data->address->>city`).
//!
//! An all-digit path key (`tags->0`) is an array index. To use such a key as an object key, quote
//! it: `data->'2024'`.

use pgrest_sql::{ExpressionBuilder, Identifier, SQLBuilder, SQLParamContainer};

use crate::error::RestError;

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub key: String,
    /// Set when the key is an array index
    pub index: Option<i32>,
    /// `->>` (extract as text) rather than `->`
    pub as_text: bool,
}

impl PathSegment {
    fn parse(raw: &str, as_text: bool) -> Option<Self> {
        let quoted = raw
            .strip_prefix('\'')
            .and_then(|key| key.strip_suffix('\''));

        let (key, index) = match quoted {
            Some(key) => (key, None),
            None if raw.bytes().all(|b| b.is_ascii_digit()) => (raw, raw.parse::<i32>().ok()),
            None => (raw, None),
        };

        (!key.is_empty()).then(|| PathSegment {
            key: key.to_string(),
            index,
            as_text,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub column: Identifier,
    pub path: Vec<PathSegment>,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: Identifier::new(column),
            path: vec![],
        }
    }

    pub fn parse(raw: &str) -> Result<Self, RestError> {
        let raw = raw.trim();
        let (column, mut rest) = match raw.find("->") {
            Some(index) => (&raw[..index], &raw[index..]),
            None => (raw, ""),
        };

        if column.is_empty() {
            return Err(RestError::invalid_request(format!(
                "Missing column name in '{raw}'"
            )));
        }

        let mut path = vec![];
        while !rest.is_empty() {
            let (as_text, after_arrow) = match rest.strip_prefix("->>") {
                Some(after) => (true, after),
                None => (false, &rest[2..]),
            };
            let key_end = after_arrow.find("->").unwrap_or(after_arrow.len());

            let segment = PathSegment::parse(&after_arrow[..key_end], as_text).ok_or_else(|| {
                RestError::invalid_request(format!("Empty JSON path segment in '{raw}'"))
            })?;
            path.push(segment);
            rest = &after_arrow[key_end..];
        }

        Ok(Self {
            column: Identifier::new(column),
            path,
        })
    }

    pub fn is_json_path(&self) -> bool {
        !self.path.is_empty()
    }

    /// The key under which the value appears in the output: the last JSON key, or the column name
    pub fn output_name(&self) -> &str {
        self.path
            .last()
            .map(|segment| segment.key.as_str())
            .unwrap_or(self.column.raw())
    }

    pub fn qualified<'a>(&'a self, table: &'a Identifier) -> QualifiedColumn<'a> {
        QualifiedColumn {
            table,
            column: self,
        }
    }
}

/// `"table"."column"`, followed by the JSON path operators. Path keys and indexes are bound values.
pub struct QualifiedColumn<'a> {
    table: &'a Identifier,
    column: &'a ColumnRef,
}

impl ExpressionBuilder for QualifiedColumn<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_column(self.table, &self.column.column);

        for segment in &self.column.path {
            builder.push_str(if segment.as_text { "->>" } else { "->" });

            match segment.index {
                Some(index) => {
                    builder.push_cast_param(SQLParamContainer::integer(index as i64), "integer")
                }
                None => builder.push_cast_param(SQLParamContainer::text(&segment.key), "text"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_column() {
        let column = ColumnRef::parse("population").unwrap();
        assert_eq!(column, ColumnRef::new("population"));
        assert_eq!(column.output_name(), "population");
        assert!(!column.is_json_path());
    }

    #[test]
    fn json_path() {
        let column = ColumnRef::parse("data->address->>city").unwrap();

        assert_eq!(column.column, Identifier::new("data"));
        assert_eq!(
            column.path,
            vec![
                PathSegment {
                    key: "address".into(),
                    index: None,
                    as_text: false
                },
                PathSegment {
                    key: "city".into(),
                    index: None,
                    as_text: true
                }
            ]
        );
        assert_eq!(column.output_name(), "city");

        let table = Identifier::new("people");
        assert_eq!(
            column.qualified(&table).to_sql(),
            (
                r#""people"."data"->$1::text->>$2::text"#.to_string(),
                vec![
                    SQLParamContainer::text("address"),
                    SQLParamContainer::text("city")
                ]
            )
        );
    }

    #[test]
    fn array_index() {
        let column = ColumnRef::parse("tags->0").unwrap();
        let table = Identifier::new("posts");

        assert_eq!(
            column.qualified(&table).to_sql(),
            (
                r#""posts"."tags"->$1::integer"#.to_string(),
                vec![SQLParamContainer::integer(0)]
            )
        );
    }

    #[test]
    fn quoted_digits_are_an_object_key() {
        let column = ColumnRef::parse("stats->'2024'->>total").unwrap();
        let table = Identifier::new("teams");

        assert_eq!(column.path[0].key, "2024");
        assert_eq!(column.path[0].index, None);
        assert_eq!(column.output_name(), "total");
        assert_eq!(
            column.qualified(&table).to_sql(),
            (
                r#""teams"."stats"->$1::text->>$2::text"#.to_string(),
                vec![
                    SQLParamContainer::text("2024"),
                    SQLParamContainer::text("total")
                ]
            )
        );
    }

    #[test]
    fn invalid() {
        assert!(ColumnRef::parse("").is_err());
        assert!(ColumnRef::parse("->a").is_err());
        assert!(ColumnRef::parse("data->").is_err());
        assert!(ColumnRef::parse("data->>").is_err());
        assert!(ColumnRef::parse("data->''").is_err());
    }
}
