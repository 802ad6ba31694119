// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Resource embedding.
//!
//! A request is first turned into a [`SelectPlan`]: its own filters, ordering and pagination plus,
//! for each embedded resource, the resolved relationship and the child plan (built from the
//! query parameters scoped to the embed). The main statement selects each relationship's parent
//! column under a helper alias; after the main rows are fetched, each embed is fetched with one
//! query per parent row, recursing into its own embeds. Helper keys are removed from the final
//! rows.

use async_recursion::async_recursion;
use pgrest_sql::{Identifier, JsonAgg, SQLParamContainer};
use serde_json::Value;
use tokio_postgres::Transaction;
use tracing::debug;

use crate::{
    error::RestError,
    filter::{Filter, parse_filters},
    order::{OrderTerm, Pagination, parse_order},
    relationship::{Relationship, resolve_relationship},
    request::QueryParams,
    row::{ResultRow, query_rows},
    select_clause::{SelectClause, SelectColumn},
    statement::{Anchor, JunctionJoin, Projection, SelectStatement},
};

const HELPER_PREFIX: &str = "pgrest_embed_";

#[derive(Debug)]
pub struct SelectPlan {
    pub table: Identifier,
    pub columns: Vec<SelectColumn>,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderTerm>,
    pub pagination: Pagination,
    pub embeds: Vec<EmbedPlan>,
}

#[derive(Debug)]
pub struct EmbedPlan {
    pub alias: String,
    pub inner: bool,
    pub relationship: Relationship,
    /// Key under which the parent column is selected in the parent row
    pub helper: Identifier,
    pub child: SelectPlan,
}

impl SelectPlan {
    /// Plan `select` over `table`, taking filters, ordering and pagination from `params` and
    /// resolving each embedded resource's relationship.
    #[async_recursion]
    pub async fn build<'a>(
        client: &'a Transaction<'a>,
        schema: &'a str,
        table: &'a str,
        select: SelectClause,
        params: &'a QueryParams,
    ) -> Result<SelectPlan, RestError> {
        let filters = parse_filters(params)?;
        let order = parse_order(params.get("order"))?;
        let pagination = Pagination::parse(params)?;

        let mut embeds = Vec::with_capacity(select.embeds.len());
        for (index, spec) in select.embeds.into_iter().enumerate() {
            let relationship = resolve_relationship(
                client,
                schema,
                table,
                &spec.table,
                spec.fk_hint.as_deref(),
            )
            .await?;
            debug!(alias = %spec.alias, ?relationship, "Resolved embed");

            let child_params = params.scoped(&[spec.alias.as_str(), spec.table.as_str()]);
            let child =
                SelectPlan::build(client, schema, &spec.table, spec.select, &child_params).await?;

            embeds.push(EmbedPlan {
                alias: spec.alias,
                inner: spec.inner,
                relationship,
                helper: Identifier::new(format!("{HELPER_PREFIX}{index}")),
                child,
            });
        }

        Ok(SelectPlan {
            table: Identifier::new(table),
            columns: select.columns,
            filters,
            order,
            pagination,
            embeds,
        })
    }

    /// The requested columns, plus the parent column of each embed under its helper alias
    pub fn projection(&self) -> Projection<'_> {
        Projection {
            table: &self.table,
            columns: &self.columns,
            helpers: self
                .embeds
                .iter()
                .map(|embed| {
                    (
                        Identifier::new(embed.relationship.parent_column()),
                        &embed.helper,
                    )
                })
                .collect(),
        }
    }

    /// The top-level select: filters, ordering and pagination, no anchors
    pub fn select_statement(&self) -> SelectStatement<'_> {
        SelectStatement {
            table: &self.table,
            projection: self.projection(),
            junction: None,
            anchors: vec![],
            filters: &self.filters,
            order: &self.order,
            pagination: self.pagination,
        }
    }
}

impl EmbedPlan {
    /// Parent rows without a related row are dropped for `!inner` embeds and for embeds whose own
    /// filters narrow the related rows.
    fn removes_unmatched(&self) -> bool {
        self.inner || !self.child.filters.is_empty()
    }

    fn is_to_one(&self) -> bool {
        matches!(self.relationship, Relationship::Direct { .. })
    }

    fn empty_value(&self) -> Value {
        if self.is_to_one() {
            Value::Null
        } else {
            Value::Array(vec![])
        }
    }

    /// The rows related to the parent row whose parent column holds `key`
    async fn fetch<'a>(
        &'a self,
        client: &'a Transaction<'a>,
        key: Value,
    ) -> Result<Value, RestError> {
        if key.is_null() {
            return Ok(self.empty_value());
        }

        let child = &self.child;
        let value = SQLParamContainer::json(key);

        let (junction, anchor, pagination) = match &self.relationship {
            Relationship::Direct {
                referenced_column, ..
            } => (
                None,
                Anchor {
                    table: child.table.clone(),
                    column: Identifier::new(referenced_column.as_str()),
                    value,
                },
                Pagination {
                    limit: Some(1),
                    offset: None,
                },
            ),
            Relationship::Reverse { column, .. } => (
                None,
                Anchor {
                    table: child.table.clone(),
                    column: Identifier::new(column.as_str()),
                    value,
                },
                child.pagination,
            ),
            Relationship::ManyToMany {
                junction_table,
                junction_main_fk,
                junction_foreign_fk,
                target_column,
                ..
            } => {
                let junction = Identifier::new(junction_table.as_str());
                (
                    Some(JunctionJoin {
                        junction: junction.clone(),
                        junction_column: Identifier::new(junction_foreign_fk.as_str()),
                        target_column: Identifier::new(target_column.as_str()),
                    }),
                    Anchor {
                        table: junction,
                        column: Identifier::new(junction_main_fk.as_str()),
                        value,
                    },
                    child.pagination,
                )
            }
        };

        let statement = SelectStatement {
            table: &child.table,
            projection: child.projection(),
            junction,
            anchors: vec![anchor],
            filters: &child.filters,
            order: &child.order,
            pagination,
        };

        let mut rows = query_rows(client, JsonAgg::SubSelect(statement)).await?;
        fetch_embeds(client, child, &mut rows).await?;

        Ok(if self.is_to_one() {
            rows.into_iter()
                .next()
                .map(Value::Object)
                .unwrap_or(Value::Null)
        } else {
            Value::Array(rows.into_iter().map(Value::Object).collect())
        })
    }
}

/// Attach the embeds of `plan` to `rows` (fetched with `plan.projection()`), strip the helper keys
/// and drop the rows that an `!inner` or filtered embed leaves without a match.
#[async_recursion]
pub async fn fetch_embeds<'a>(
    client: &'a Transaction<'a>,
    plan: &'a SelectPlan,
    rows: &'a mut Vec<ResultRow>,
) -> Result<(), RestError> {
    if plan.embeds.is_empty() {
        return Ok(());
    }

    for embed in &plan.embeds {
        for row in rows.iter_mut() {
            let key = row
                .get(embed.helper.raw())
                .cloned()
                .unwrap_or(Value::Null);
            let value = embed.fetch(client, key).await?;
            row.insert(embed.alias.clone(), value);
        }
    }

    for row in rows.iter_mut() {
        for embed in &plan.embeds {
            row.shift_remove(embed.helper.raw());
        }
    }

    rows.retain(|row| {
        plan.embeds
            .iter()
            .filter(|embed| embed.removes_unmatched())
            .all(|embed| has_match(row.get(&embed.alias)))
    });

    Ok(())
}

fn has_match(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(rows)) => !rows.is_empty(),
        Some(_) => true,
    }
}
