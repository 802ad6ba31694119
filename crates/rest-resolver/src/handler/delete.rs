// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use http::StatusCode;
use pgrest_sql::JsonAgg;
use tokio_postgres::Transaction;
use tracing::instrument;

use super::RestResponse;
use crate::{
    embed::{SelectPlan, fetch_embeds},
    error::RestError,
    request::RestRequest,
    row::query_rows,
    select_clause::SelectClause,
    statement::DeleteStatement,
};

#[instrument(skip_all, fields(table = %request.table))]
pub(super) async fn delete(
    tx: &Transaction<'_>,
    schema: &str,
    request: &RestRequest,
) -> Result<RestResponse, RestError> {
    if !request.params.has_filters() {
        return Err(RestError::MissingFilter("DELETE"));
    }

    let select = SelectClause::parse(request.params.get("select"))?;
    let plan = SelectPlan::build(tx, schema, &request.table, select, &request.params).await?;

    let statement = DeleteStatement {
        table: &plan.table,
        filters: &plan.filters,
        returning: plan.projection(),
    };
    let mut rows = query_rows(tx, JsonAgg::Cte(statement)).await?;
    fetch_embeds(tx, &plan, &mut rows).await?;

    Ok(RestResponse::new(StatusCode::OK, rows))
}
