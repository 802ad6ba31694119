// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use pgrest_sql::{ExpressionBuilder, Identifier, SQLBuilder, SQLParamContainer};

use crate::{column::ColumnRef, error::RestError, request::QueryParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: ColumnRef,
    pub direction: Option<Direction>,
    pub nulls: Option<Nulls>,
}

/// `order=col1.desc.nullslast,col2`
pub fn parse_order(raw: Option<&str>) -> Result<Vec<OrderTerm>, RestError> {
    let Some(raw) = raw else {
        return Ok(vec![]);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(parse_term)
        .collect()
}

fn parse_term(term: &str) -> Result<OrderTerm, RestError> {
    // Modifiers follow the last JSON key, which may itself contain a '.'
    let path_start = term.rfind("->").map(|index| index + 2).unwrap_or(0);
    let (column, modifiers) = match term[path_start..].find('.') {
        Some(index) => (
            &term[..path_start + index],
            Some(&term[path_start + index + 1..]),
        ),
        None => (term, None),
    };

    let mut order_term = OrderTerm {
        column: ColumnRef::parse(column)?,
        direction: None,
        nulls: None,
    };

    for modifier in modifiers.into_iter().flat_map(|m| m.split('.')) {
        match modifier {
            "asc" if order_term.direction.is_none() => order_term.direction = Some(Direction::Asc),
            "desc" if order_term.direction.is_none() => {
                order_term.direction = Some(Direction::Desc)
            }
            "nullsfirst" if order_term.nulls.is_none() => order_term.nulls = Some(Nulls::First),
            "nullslast" if order_term.nulls.is_none() => order_term.nulls = Some(Nulls::Last),
            _ => {
                return Err(RestError::invalid_request(format!(
                    "Invalid order '{term}': expected <column>[.asc|.desc][.nullsfirst|.nullslast]"
                )));
            }
        }
    }

    Ok(order_term)
}

/// `LIMIT` / `OFFSET`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn parse(params: &QueryParams) -> Result<Self, RestError> {
        Ok(Self {
            limit: parse_non_negative(params, "limit")?,
            offset: parse_non_negative(params, "offset")?,
        })
    }

    pub fn offset_or_zero(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}

fn parse_non_negative(params: &QueryParams, key: &str) -> Result<Option<i64>, RestError> {
    params
        .get(key)
        .map(|value| match value.trim().parse::<i64>() {
            Ok(n) if n >= 0 => Ok(n),
            _ => Err(RestError::invalid_request(format!(
                "Invalid {key} '{value}': expected a non-negative integer"
            ))),
        })
        .transpose()
}

/// `ORDER BY ...` (nothing if there are no terms)
pub struct OrderBy<'a> {
    pub table: &'a Identifier,
    pub terms: &'a [OrderTerm],
}

impl ExpressionBuilder for OrderBy<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        if self.terms.is_empty() {
            return;
        }

        builder.push_str(" ORDER BY ");
        builder.push_iter(self.terms.iter(), ", ", |builder, term| {
            term.column.qualified(self.table).build(builder);
            match term.direction {
                Some(Direction::Asc) => builder.push_str(" ASC"),
                Some(Direction::Desc) => builder.push_str(" DESC"),
                None => {}
            }
            match term.nulls {
                Some(Nulls::First) => builder.push_str(" NULLS FIRST"),
                Some(Nulls::Last) => builder.push_str(" NULLS LAST"),
                None => {}
            }
        });
    }
}

impl ExpressionBuilder for Pagination {
    fn build(&self, builder: &mut SQLBuilder) {
        if let Some(limit) = self.limit {
            builder.push_str(" LIMIT ");
            builder.push_param(SQLParamContainer::integer(limit));
        }
        if let Some(offset) = self.offset {
            builder.push_str(" OFFSET ");
            builder.push_param(SQLParamContainer::integer(offset));
        }
    }
}
