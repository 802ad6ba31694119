// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Translates REST requests (query-string filters, embedding and upserts) into parameterized SQL
//! and runs them against Postgres.

mod column;
mod embed;
mod error;
mod filter;
mod handler;
mod order;
mod relationship;
mod request;
mod rest_router;
mod row;
mod select_clause;
mod statement;

pub use error::RestError;
pub use filter::build_where_clause;
pub use handler::{Operation, RestResponse, execute};
pub use relationship::{Relationship, resolve_relationship};
pub use request::{Prefer, QueryParams, Resolution, RestRequest};
pub use rest_router::RestRouter;
pub use row::ResultRow;
pub use select_clause::{EmbedSpec, SelectClause, SelectColumn};
