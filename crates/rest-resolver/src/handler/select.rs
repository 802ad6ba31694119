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
    row::{count_rows, query_rows},
    select_clause::SelectClause,
    statement::CountStatement,
};

#[instrument(skip_all, fields(table = %request.table))]
pub(super) async fn select(
    tx: &Transaction<'_>,
    schema: &str,
    request: &RestRequest,
) -> Result<RestResponse, RestError> {
    let select = SelectClause::parse(request.params.get("select"))?;
    let plan = SelectPlan::build(tx, schema, &request.table, select, &request.params).await?;

    let rows = query_rows(tx, JsonAgg::SubSelect(plan.select_statement()));

    let (mut rows, total) = if request.prefer.count_exact {
        // Embed filters don't narrow the count
        let count = count_rows(
            tx,
            CountStatement {
                table: &plan.table,
                filters: &plan.filters,
            },
        );
        let (rows, total) = futures::try_join!(rows, count)?;
        (rows, Some(total))
    } else {
        (rows.await?, None)
    };

    fetch_embeds(tx, &plan, &mut rows).await?;

    let content_range =
        total.map(|total| content_range(plan.pagination.offset_or_zero(), rows.len(), total));

    Ok(RestResponse {
        status: StatusCode::OK,
        rows,
        content_range,
    })
}

/// `<first>-<last>/<total>`, or `*/<total>` when no row was returned
fn content_range(offset: i64, returned: usize, total: i64) -> String {
    if returned == 0 {
        format!("*/{total}")
    } else {
        format!("{}-{}/{}", offset, offset + returned as i64 - 1, total)
    }
}
