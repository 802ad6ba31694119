// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Filters (`column=op.value`) and the WHERE clause built from them.

use pgrest_sql::{ExpressionBuilder, Identifier, SQLBuilder, SQLParamContainer};

use crate::{column::ColumnRef, error::RestError, request::QueryParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Is,
}

impl FilterOp {
    fn from_prefix(prefix: &str) -> Option<Self> {
        Some(match prefix {
            "eq" => FilterOp::Eq,
            "neq" => FilterOp::Neq,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "like" => FilterOp::Like,
            "ilike" => FilterOp::Ilike,
            "in" => FilterOp::In,
            "is" => FilterOp::Is,
            _ => return None,
        })
    }

    fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => " = ",
            FilterOp::Neq => " <> ",
            FilterOp::Gt => " > ",
            FilterOp::Gte => " >= ",
            FilterOp::Lt => " < ",
            FilterOp::Lte => " <= ",
            FilterOp::Like => " LIKE ",
            FilterOp::Ilike => " ILIKE ",
            FilterOp::In => " IN ",
            FilterOp::Is => " IS ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsValue {
    Null,
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(String),
    /// `in` elements, all integers
    Integers(Vec<i64>),
    /// `in` elements, at least one of which isn't an integer
    Texts(Vec<String>),
    Is(IsValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: ColumnRef,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    /// Parse `key=value`, where `value` is `<op>.<operand>`. A value without a known operator
    /// prefix is an equality against the whole value.
    pub fn parse(key: &str, value: &str) -> Result<Self, RestError> {
        let column = ColumnRef::parse(key)?;

        let (op, operand) = match value.split_once('.') {
            Some((prefix, operand)) => match FilterOp::from_prefix(prefix) {
                Some(op) => (op, operand),
                None => (FilterOp::Eq, value),
            },
            None => (FilterOp::Eq, value),
        };

        let value = match op {
            FilterOp::Like | FilterOp::Ilike => FilterValue::Single(operand.replace('*', "%")),
            FilterOp::In => parse_list(operand),
            FilterOp::Is => FilterValue::Is(match operand.to_lowercase().as_str() {
                "null" => IsValue::Null,
                "true" => IsValue::True,
                "false" => IsValue::False,
                "unknown" => IsValue::Unknown,
                _ => {
                    return Err(RestError::invalid_request(format!(
                        "Invalid 'is' value '{operand}' for '{key}': expected null, true, false or unknown"
                    )));
                }
            }),
            _ => FilterValue::Single(operand.to_string()),
        };

        Ok(Self { column, op, value })
    }
}

/// `(v1,v2,v3)`. Query values are untyped, so the element type is inferred: integers only if
/// every element parses as one; otherwise everything is text.
fn parse_list(operand: &str) -> FilterValue {
    let inner = operand
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(operand);

    let elements: Vec<&str> = if inner.is_empty() {
        vec![]
    } else {
        inner.split(',').collect()
    };

    let integers: Option<Vec<i64>> = elements
        .iter()
        .map(|element| element.trim().parse::<i64>().ok())
        .collect();

    match integers {
        Some(integers) => FilterValue::Integers(integers),
        None => FilterValue::Texts(elements.iter().map(|e| e.to_string()).collect()),
    }
}

/// All filters of `params` in request order
pub fn parse_filters(params: &QueryParams) -> Result<Vec<Filter>, RestError> {
    params
        .filters()
        .map(|(key, value)| Filter::parse(key, value))
        .collect()
}

/// The filters joined by `AND`, columns qualified by `table`
pub struct Conjunction<'a> {
    pub table: &'a Identifier,
    pub filters: &'a [Filter],
}

impl ExpressionBuilder for Conjunction<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_iter(self.filters.iter(), " AND ", |builder, filter| {
            build_filter(self.table, filter, builder)
        });
    }
}

fn build_filter(table: &Identifier, filter: &Filter, builder: &mut SQLBuilder) {
    filter.column.qualified(table).build(builder);
    builder.push_str(filter.op.sql());

    match &filter.value {
        FilterValue::Single(value) => builder.push_param(SQLParamContainer::text(value)),
        FilterValue::Integers(values) if values.is_empty() => builder.push_str("(NULL)"),
        FilterValue::Integers(values) => {
            builder.push('(');
            builder.push_iter(values.iter(), ", ", |builder, value| {
                builder.push_cast_param(SQLParamContainer::integer(*value), "bigint")
            });
            builder.push(')');
        }
        FilterValue::Texts(values) => {
            builder.push('(');
            builder.push_iter(values.iter(), ", ", |builder, value| {
                builder.push_cast_param(SQLParamContainer::text(value), "text")
            });
            builder.push(')');
        }
        FilterValue::Is(value) => builder.push_str(match value {
            IsValue::Null => "NULL",
            IsValue::True => "TRUE",
            IsValue::False => "FALSE",
            IsValue::Unknown => "UNKNOWN",
        }),
    }
}

/// Compile the filters of `params` into a predicate (without the `WHERE` keyword; empty if there
/// are no filters) and its bound values. Placeholders start after `start_index` parameters bound
/// elsewhere in the statement (for example, by an UPDATE's SET clause).
pub fn build_where_clause(
    table: &Identifier,
    params: &QueryParams,
    start_index: usize,
) -> Result<(String, Vec<SQLParamContainer>), RestError> {
    let filters = parse_filters(params)?;

    let mut builder = SQLBuilder::starting_at(start_index);
    Conjunction {
        table,
        filters: &filters,
    }
    .build(&mut builder);

    Ok(builder.into_sql())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn where_clause(
        pairs: &[(&str, &str)],
        start_index: usize,
    ) -> (String, Vec<SQLParamContainer>) {
        build_where_clause(&Identifier::new("cities"), &params(pairs), start_index).unwrap()
    }

    #[test]
    fn operators() {
        assert_eq!(
            where_clause(
                &[
                    ("population", "gt.1000"),
                    ("name", "neq.Paris"),
                    ("code", "FR"),
                    ("id", "lte.9")
                ],
                0
            ),
            (
                r#""cities"."population" > $1 AND "cities"."name" <> $2 AND "cities"."code" = $3 AND "cities"."id" <= $4"#.to_string(),
                vec![
                    SQLParamContainer::text("1000"),
                    SQLParamContainer::text("Paris"),
                    SQLParamContainer::text("FR"),
                    SQLParamContainer::text("9"),
                ]
            )
        );
    }

    #[test]
    fn unknown_operator_compares_the_whole_value() {
        assert_eq!(
            where_clause(&[("version", "v1.2")], 0),
            (
                r#""cities"."version" = $1"#.to_string(),
                vec![SQLParamContainer::text("v1.2")]
            )
        );
    }

    #[test]
    fn numbering_starts_after_the_offset() {
        let (sql, params) = where_clause(&[("id", "eq.1"), ("name", "like.Pa*")], 2);

        assert_eq!(sql, r#""cities"."id" = $3 AND "cities"."name" LIKE $4"#);
        assert_eq!(
            params,
            vec![SQLParamContainer::text("1"), SQLParamContainer::text("Pa%")]
        );
    }

    #[test]
    fn in_with_integers() {
        assert_eq!(
            where_clause(&[("id", "in.(1, 2,3)")], 0),
            (
                r#""cities"."id" IN ($1::bigint, $2::bigint, $3::bigint)"#.to_string(),
                vec![
                    SQLParamContainer::integer(1),
                    SQLParamContainer::integer(2),
                    SQLParamContainer::integer(3),
                ]
            )
        );
    }

    #[test]
    fn in_with_mixed_values_is_all_text() {
        assert_eq!(
            where_clause(&[("code", "in.(1,b)")], 0),
            (
                r#""cities"."code" IN ($1::text, $2::text)"#.to_string(),
                vec![SQLParamContainer::text("1"), SQLParamContainer::text("b")]
            )
        );
    }

    #[test]
    fn empty_in_matches_nothing() {
        assert_eq!(
            where_clause(&[("id", "in.()")], 0),
            (r#""cities"."id" IN (NULL)"#.to_string(), vec![])
        );
    }

    #[test]
    fn is_needs_no_bound_value() {
        assert_eq!(
            where_clause(&[("country_id", "is.null"), ("capital", "is.TRUE")], 0),
            (
                r#""cities"."country_id" IS NULL AND "cities"."capital" IS TRUE"#.to_string(),
                vec![]
            )
        );

        assert!(Filter::parse("country_id", "is.nothing").is_err());
    }

    #[test]
    fn json_path_filter() {
        assert_eq!(
            where_clause(&[("data->>lang", "eq.fr")], 0),
            (
                r#""cities"."data"->>$1::text = $2"#.to_string(),
                vec![SQLParamContainer::text("lang"), SQLParamContainer::text("fr")]
            )
        );
    }

    #[test]
    fn reserved_and_embedded_keys_are_not_filters() {
        assert_eq!(
            where_clause(
                &[
                    ("select", "name,districts(name)"),
                    ("districts.name", "eq.Marais"),
                    ("limit", "1")
                ],
                0
            ),
            (String::new(), vec![])
        );
    }

    #[test]
    fn identifiers_are_quoted() {
        let (sql, params) = where_clause(&[(r#"na"me"#, "eq.x")], 0);

        assert_eq!(sql, r#""cities"."na""me" = $1"#);
        assert_eq!(params, vec![SQLParamContainer::text("x")]);
    }
}
