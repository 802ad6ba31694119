// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use http::StatusCode;
use pgrest_sql::database_error::DatabaseError;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum RestError {
    /// The body isn't valid JSON, or isn't of the expected shape
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// A query parameter doesn't follow the grammar
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} requires at least one filter")]
    MissingFilter(&'static str),

    #[error("Could not find a relationship between '{main}' and '{target}'")]
    UnresolvedRelationship { main: String, target: String },

    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Unable to read the database response: {0}")]
    Decode(String),

    #[error("The request timed out")]
    Timeout,
}

impl RestError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        RestError::InvalidRequest(message.into())
    }

    fn postgres_error(&self) -> Option<&tokio_postgres::Error> {
        match self {
            RestError::Postgres(e) => Some(e),
            RestError::Database(e) => e.as_delegate(),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::InvalidBody(_)
            | RestError::InvalidRequest(_)
            | RestError::MissingFilter(_)
            | RestError::UnresolvedRelationship { .. } => StatusCode::BAD_REQUEST,
            RestError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RestError::Postgres(e) => postgres_status(e),
            RestError::Database(e) => match e.as_delegate() {
                Some(e) => postgres_status(e),
                None => match e {
                    DatabaseError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
        }
    }

    /// `{"message", "code", "details", "hint"}`; the last three only when the database reported them
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();

        match self.postgres_error().and_then(|e| e.as_db_error()) {
            Some(db_error) => {
                body.insert("message".into(), db_error.message().into());
                body.insert("code".into(), db_error.code().code().into());
                if let Some(detail) = db_error.detail() {
                    body.insert("details".into(), detail.into());
                }
                if let Some(hint) = db_error.hint() {
                    body.insert("hint".into(), hint.into());
                }
            }
            None => {
                let message = self.to_string();
                let details = source_details(self, &message);
                body.insert("message".into(), message.into());
                if let Some(details) = details {
                    body.insert("details".into(), details.into());
                }
            }
        }

        Value::Object(body)
    }

    /// Log according to who is at fault
    pub fn log(&self) {
        if self.status_code().is_server_error() {
            error!("Request failed: {self:?}");
        } else {
            warn!("Request rejected: {self}");
        }
    }
}

/// The messages of `error`'s sources (such as the reason a value could not be bound), skipping
/// the ones that merely repeat the message before them
fn source_details(error: &dyn std::error::Error, message: &str) -> Option<String> {
    let mut previous = message.to_string();
    let mut details = vec![];

    let mut source = error.source();
    while let Some(current) = source {
        let text = current.to_string();
        if text != previous {
            details.push(text.clone());
        }
        previous = text;
        source = current.source();
    }

    (!details.is_empty()).then(|| details.join(": "))
}

fn postgres_status(error: &tokio_postgres::Error) -> StatusCode {
    match error.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => StatusCode::CONFLICT,
        Some(code) if *code == SqlState::UNDEFINED_TABLE => StatusCode::NOT_FOUND,
        Some(code) if *code == SqlState::INSUFFICIENT_PRIVILEGE => StatusCode::FORBIDDEN,
        // Any other error reported by the server stems from the statement we compiled from the
        // request (unknown column, type mismatch, constraint violation, ...)
        Some(_) => StatusCode::BAD_REQUEST,
        None if error.is_closed() => StatusCode::SERVICE_UNAVAILABLE,
        // Client-side failures: a request value that could not be converted to the parameter type
        None => StatusCode::BAD_REQUEST,
    }
}
