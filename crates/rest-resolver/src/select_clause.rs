// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Parser for the `select=` query parameter.
//!
//! ```text
//! select    = item ("," item)*
//! item      = "*" | [alias ":"] column | [alias ":"] table ("!" hint)* "(" select ")"
//! column    = name ("->" key | "->>" key)*
//! ```
//!
//! A `!` segment after the table name is either the literal `inner` or a foreign-key hint.

use crate::{column::ColumnRef, error::RestError};

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Star,
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
}

impl SelectColumn {
    /// The key under which this column appears in a result row (`None` for `*`)
    pub fn output_name(&self) -> Option<&str> {
        match self {
            SelectColumn::Star => None,
            SelectColumn::Column { column, alias } => {
                Some(alias.as_deref().unwrap_or(column.output_name()))
            }
        }
    }
}

/// One embedded resource: `alias:table!hint!inner(sub-select)`
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedSpec {
    /// Key of the embedded value in each parent row (defaults to the table name)
    pub alias: String,
    pub table: String,
    /// Explicit foreign-key column
    pub fk_hint: Option<String>,
    /// Drop parent rows without a related row
    pub inner: bool,
    pub select: SelectClause,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    /// Never empty: `[Star]` when no plain column was requested
    pub columns: Vec<SelectColumn>,
    pub embeds: Vec<EmbedSpec>,
}

impl Default for SelectClause {
    fn default() -> Self {
        Self {
            columns: vec![SelectColumn::Star],
            embeds: vec![],
        }
    }
}

impl SelectClause {
    pub fn parse(raw: Option<&str>) -> Result<Self, RestError> {
        let raw = match raw.map(str::trim) {
            None | Some("") | Some("*") => return Ok(Self::default()),
            Some(raw) => raw,
        };

        let mut columns = vec![];
        let mut embeds = vec![];

        for token in split_top_level(raw)? {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            match token.find('(') {
                Some(open) if token.ends_with(')') => {
                    embeds.push(parse_embed(&token[..open], &token[open + 1..token.len() - 1])?)
                }
                Some(_) => {
                    return Err(RestError::invalid_request(format!(
                        "Unexpected text after ')' in select item '{token}'"
                    )));
                }
                None => columns.push(parse_column(token)?),
            }
        }

        if columns.is_empty() {
            columns.push(SelectColumn::Star);
        }

        Ok(Self { columns, embeds })
    }

    pub fn is_star(&self) -> bool {
        self.columns.contains(&SelectColumn::Star)
    }
}

/// Split on commas that are not inside parentheses
fn split_top_level(raw: &str) -> Result<Vec<&str>, RestError> {
    let mut tokens = vec![];
    let mut depth = 0usize;
    let mut start = 0;

    for (index, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    RestError::invalid_request(format!("Unbalanced ')' in select '{raw}'"))
                })?;
            }
            ',' if depth == 0 => {
                tokens.push(&raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(RestError::invalid_request(format!(
            "Unbalanced '(' in select '{raw}'"
        )));
    }

    tokens.push(&raw[start..]);
    Ok(tokens)
}

fn parse_column(token: &str) -> Result<SelectColumn, RestError> {
    if token == "*" {
        return Ok(SelectColumn::Star);
    }

    let (alias, column) = split_alias(token);
    Ok(SelectColumn::Column {
        column: ColumnRef::parse(column)?,
        alias,
    })
}

fn parse_embed(head: &str, inner: &str) -> Result<EmbedSpec, RestError> {
    let (alias, target) = split_alias(head.trim());

    let mut segments = target.split('!').map(str::trim);
    let table = segments.next().unwrap_or_default();
    if table.is_empty() {
        return Err(RestError::invalid_request(format!(
            "Missing table name in embedded resource '{head}'"
        )));
    }

    let mut fk_hint = None;
    let mut is_inner = false;
    for segment in segments {
        match segment {
            "inner" => is_inner = true,
            "" => {
                return Err(RestError::invalid_request(format!(
                    "Empty '!' segment in embedded resource '{head}'"
                )));
            }
            hint => fk_hint = Some(hint.to_string()),
        }
    }

    Ok(EmbedSpec {
        alias: alias.unwrap_or_else(|| table.to_string()),
        table: table.to_string(),
        fk_hint,
        inner: is_inner,
        select: SelectClause::parse(Some(inner))?,
    })
}

/// `alias:rest` (a `:` that is part of `::` is not an alias separator)
fn split_alias(token: &str) -> (Option<String>, &str) {
    match token.find(':') {
        Some(index) if !token[index + 1..].starts_with(':') && index > 0 => (
            Some(token[..index].trim().to_string()),
            token[index + 1..].trim(),
        ),
        _ => (None, token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> SelectColumn {
        SelectColumn::Column {
            column: ColumnRef::new(name),
            alias: None,
        }
    }

    #[test]
    fn absent_or_star() {
        assert_eq!(SelectClause::parse(None).unwrap(), SelectClause::default());
        assert_eq!(SelectClause::parse(Some("*")).unwrap(), SelectClause::default());
        assert_eq!(SelectClause::parse(Some(" ")).unwrap(), SelectClause::default());
    }

    #[test]
    fn plain_columns() {
        let clause = SelectClause::parse(Some("id, name,label:code,city:data->>city")).unwrap();

        assert_eq!(clause.embeds, vec![]);
        assert_eq!(clause.columns[0], column("id"));
        assert_eq!(clause.columns[1], column("name"));
        assert_eq!(
            clause.columns[2],
            SelectColumn::Column {
                column: ColumnRef::new("code"),
                alias: Some("label".into())
            }
        );
        assert_eq!(clause.columns[3].output_name(), Some("city"));
        assert_eq!(clause.columns.len(), 4);
    }

    #[test]
    fn embed_with_hint_and_inner() {
        let clause =
            SelectClause::parse(Some("name,home:cities!capital_id!inner(name,population)"))
                .unwrap();

        assert_eq!(clause.columns, vec![column("name")]);
        assert_eq!(
            clause.embeds,
            vec![EmbedSpec {
                alias: "home".into(),
                table: "cities".into(),
                fk_hint: Some("capital_id".into()),
                inner: true,
                select: SelectClause {
                    columns: vec![column("name"), column("population")],
                    embeds: vec![],
                },
            }]
        );
    }

    #[test]
    fn embed_only_selects_all_columns() {
        let clause = SelectClause::parse(Some("cities()")).unwrap();

        assert!(clause.is_star());
        assert_eq!(clause.embeds[0].alias, "cities");
        assert_eq!(clause.embeds[0].select, SelectClause::default());
    }

    #[test]
    fn nested_embeds() {
        let clause =
            SelectClause::parse(Some("name,cities(name,districts!inner(name)),teams(*)")).unwrap();

        assert_eq!(clause.embeds.len(), 2);
        let cities = &clause.embeds[0];
        assert_eq!(cities.select.columns, vec![column("name")]);
        assert_eq!(cities.select.embeds[0].table, "districts");
        assert!(cities.select.embeds[0].inner);
        assert_eq!(clause.embeds[1].select, SelectClause::default());
    }

    #[test]
    fn malformed() {
        assert!(SelectClause::parse(Some("name,cities(name")).is_err());
        assert!(SelectClause::parse(Some("name)")).is_err());
        assert!(SelectClause::parse(Some("cities(name)x")).is_err());
        assert!(SelectClause::parse(Some("(name)")).is_err());
        assert!(SelectClause::parse(Some("cities!!inner(name)")).is_err());
    }
}
