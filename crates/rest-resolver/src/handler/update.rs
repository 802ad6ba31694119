// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use http::StatusCode;
use pgrest_sql::{Identifier, JsonAgg, SQLParamContainer};
use serde_json::Value;
use tokio_postgres::Transaction;
use tracing::instrument;

use super::{RestResponse, parse_body};
use crate::{
    embed::{SelectPlan, fetch_embeds},
    error::RestError,
    request::RestRequest,
    row::query_rows,
    select_clause::SelectClause,
    statement::UpdateStatement,
};

#[instrument(skip_all, fields(table = %request.table))]
pub(super) async fn update(
    tx: &Transaction<'_>,
    schema: &str,
    request: &RestRequest,
) -> Result<RestResponse, RestError> {
    let changes = match parse_body(&request.body)? {
        Value::Object(changes) if !changes.is_empty() => changes,
        _ => {
            return Err(RestError::InvalidBody(
                "Expected a non-empty object".to_string(),
            ));
        }
    };

    if !request.params.has_filters() {
        return Err(RestError::MissingFilter("UPDATE"));
    }

    let select = SelectClause::parse(request.params.get("select"))?;
    let plan = SelectPlan::build(tx, schema, &request.table, select, &request.params).await?;

    let statement = UpdateStatement {
        table: &plan.table,
        assignments: changes
            .into_iter()
            .map(|(column, value)| (Identifier::new(column), SQLParamContainer::json(value)))
            .collect(),
        filters: &plan.filters,
        returning: plan.projection(),
    };
    let mut rows = query_rows(tx, JsonAgg::Cte(statement)).await?;
    fetch_embeds(tx, &plan, &mut rows).await?;

    Ok(RestResponse::new(StatusCode::OK, rows))
}
