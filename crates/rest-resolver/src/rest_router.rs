// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::{
    env_const::{get_db_schema, get_request_timeout, get_rest_http_path},
    http::{Headers, RequestPayload, ResponseBody, ResponsePayload},
    router::Router,
};
use http::StatusCode;
use pgrest_env::{EnvError, Environment};
use pgrest_sql::DatabasePool;
use tracing::{instrument, warn};

use crate::{
    error::RestError,
    handler::{self, Operation, RestResponse},
    request::{Prefer, QueryParams, RestRequest},
};

const ALLOWED_METHODS: &str = "GET, HEAD, POST, PATCH, DELETE";

/// Serves `<base path>/<table>` for every table of the configured schema
pub struct RestRouter {
    pool: Arc<DatabasePool>,
    base_path: String,
    schema: String,
    timeout: Duration,
}

impl RestRouter {
    pub fn new(pool: Arc<DatabasePool>, env: Arc<dyn Environment>) -> Result<Self, EnvError> {
        let env = env.as_ref();

        Ok(Self {
            pool,
            base_path: get_rest_http_path(env),
            schema: get_db_schema(env),
            timeout: get_request_timeout(env)?,
        })
    }

    /// Run `operation` on a pooled connection. If the deadline passes first, the in-flight query
    /// is cancelled on the server.
    #[instrument(skip(self, request), fields(table = %request.table))]
    pub async fn resolve(
        &self,
        operation: Operation,
        request: &RestRequest,
    ) -> Result<RestResponse, RestError> {
        let mut client = self.pool.get_client().await?;
        let cancel_token = client.cancel_token();

        let execution = handler::execute(&mut client, &self.schema, operation, request);
        match tokio::time::timeout(self.timeout, execution).await {
            Ok(response) => response,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Request timed out, cancelling its query");
                if let Err(e) = self.pool.cancel_query(&cancel_token).await {
                    warn!("Failed to cancel the query: {e}");
                }
                Err(RestError::Timeout)
            }
        }
    }
}

#[async_trait]
impl Router for RestRouter {
    #[instrument(name = "RestRouter::route", skip_all)]
    async fn route(&self, request: &mut (dyn RequestPayload + Send)) -> Option<ResponsePayload> {
        let head = request.get_head();
        let path = head.get_path();
        let table = table_segment(&self.base_path, &path)?;

        let method = head.get_method();
        let Some(operation) = Operation::from_method(&method) else {
            let mut headers = Headers::new();
            headers.insert("allow".into(), ALLOWED_METHODS.into());
            return Some(ResponsePayload {
                body: ResponseBody::None,
                headers,
                status_code: StatusCode::METHOD_NOT_ALLOWED,
            });
        };

        let table = match urlencoding::decode(table) {
            Ok(table) => table.into_owned(),
            Err(e) => {
                return Some(error_payload(RestError::invalid_request(format!(
                    "Invalid table name: {e}"
                ))));
            }
        };
        let prefer = Prefer::parse(&head.get_headers("prefer"));
        let params = QueryParams::new(head.get_query());
        let include_body = method != http::Method::HEAD;

        let request = RestRequest {
            method,
            table,
            params,
            body: request.take_body(),
            prefer,
        };

        Some(match self.resolve(operation, &request).await {
            Ok(response) => response_payload(response, include_body),
            Err(e) => error_payload(e),
        })
    }
}

/// The table named by the single path segment following the base path
fn table_segment<'p>(base_path: &str, path: &'p str) -> Option<&'p str> {
    let rest = path
        .strip_prefix(base_path.trim_end_matches('/'))?
        .strip_prefix('/')?;

    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

fn json_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("content-type".into(), "application/json".into());
    headers
}

fn response_payload(response: RestResponse, include_body: bool) -> ResponsePayload {
    let body = match serde_json::to_vec(&response.rows) {
        Ok(body) => body,
        Err(e) => return error_payload(RestError::Decode(e.to_string())),
    };

    let mut headers = json_headers();
    if let Some(content_range) = response.content_range {
        headers.insert("content-range".into(), content_range);
    }

    ResponsePayload {
        body: if include_body {
            ResponseBody::Bytes(body)
        } else {
            ResponseBody::None
        },
        headers,
        status_code: response.status,
    }
}

fn error_payload(error: RestError) -> ResponsePayload {
    error.log();

    ResponsePayload {
        body: ResponseBody::Bytes(error.to_json().to_string().into_bytes()),
        headers: json_headers(),
        status_code: error.status_code(),
    }
}
