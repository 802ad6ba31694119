// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! One handler per operation. Every handler runs inside the transaction opened by [`execute`].

mod delete;
mod insert;
mod select;
mod update;

use bytes::Bytes;
use http::{Method, StatusCode};
use pgrest_sql::DatabaseClient;
use serde_json::Value;
use tokio_postgres::Transaction;

use crate::{error::RestError, request::RestRequest, row::ResultRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// `None` for methods without an operation
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD => Some(Operation::Select),
            Method::POST => Some(Operation::Insert),
            Method::PATCH => Some(Operation::Update),
            Method::DELETE => Some(Operation::Delete),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct RestResponse {
    pub status: StatusCode,
    pub rows: Vec<ResultRow>,
    /// Set when an exact count was requested
    pub content_range: Option<String>,
}

impl RestResponse {
    fn new(status: StatusCode, rows: Vec<ResultRow>) -> Self {
        Self {
            status,
            rows,
            content_range: None,
        }
    }
}

/// Run `operation` in a transaction, committing it only if the operation succeeds
pub async fn execute(
    client: &mut DatabaseClient,
    schema: &str,
    operation: Operation,
    request: &RestRequest,
) -> Result<RestResponse, RestError> {
    let tx = client.transaction().await?;
    let response = handle(&tx, schema, operation, request).await?;
    tx.commit().await?;

    Ok(response)
}

pub async fn handle(
    tx: &Transaction<'_>,
    schema: &str,
    operation: Operation,
    request: &RestRequest,
) -> Result<RestResponse, RestError> {
    match operation {
        Operation::Select => select::select(tx, schema, request).await,
        Operation::Insert => insert::insert(tx, schema, request).await,
        Operation::Update => update::update(tx, schema, request).await,
        Operation::Delete => delete::delete(tx, schema, request).await,
    }
}

fn parse_body(body: &Bytes) -> Result<Value, RestError> {
    serde_json::from_slice(body).map_err(|e| RestError::InvalidBody(e.to_string()))
}
