// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use pgrest_sql::{ExpressionBuilder, JsonAgg, prepare_bindable};
use serde_json::{Map, Value};
use tokio_postgres::{GenericClient, types::ToSql};
use tracing::debug;

use crate::{error::RestError, statement::CountStatement};

/// A result row, with keys in select-list order
pub type ResultRow = Map<String, Value>;

/// Run `statement` and return the rows it produces (or, for a mutation, the rows it returns)
pub async fn query_rows<T: ExpressionBuilder>(
    client: &(impl GenericClient + Sync),
    statement: JsonAgg<T>,
) -> Result<Vec<ResultRow>, RestError> {
    let (sql, params) = statement.to_sql();
    debug!(%sql, ?params, "Executing query");

    let params: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|param| param as &(dyn ToSql + Sync))
        .collect();
    let prepared = prepare_bindable(client, &sql).await?;
    let row = client.query_one(&prepared, &params).await?;

    let text: String = row
        .try_get(0)
        .map_err(|e| RestError::Decode(e.to_string()))?;
    parse_rows(&text)
}

pub async fn count_rows(
    client: &(impl GenericClient + Sync),
    statement: CountStatement<'_>,
) -> Result<i64, RestError> {
    let (sql, params) = statement.to_sql();
    debug!(%sql, ?params, "Executing count");

    let params: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|param| param as &(dyn ToSql + Sync))
        .collect();
    let prepared = prepare_bindable(client, &sql).await?;
    let row = client.query_one(&prepared, &params).await?;

    row.try_get(0).map_err(|e| RestError::Decode(e.to_string()))
}

fn parse_rows(text: &str) -> Result<Vec<ResultRow>, RestError> {
    serde_json::from_str(text).map_err(|e| RestError::Decode(e.to_string()))
}
