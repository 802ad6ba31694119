// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! SQL primitives shared by the REST engine.
//!
//! The central invariant of this crate is the separation between the two kinds of fragments
//! that end up in an SQL statement: [Identifier]s (table and column names, always quoted, never
//! bound) and [BoundValue]s (always passed as parameters, never concatenated). [SQLBuilder] only
//! accepts SQL text as `&'static str`, so a runtime string can reach the statement text only by
//! going through [Identifier].
//!
//! The crate also provides the connection pool ([DatabasePool]), the client abstraction
//! ([DatabaseClient]) and the schema-catalog queries ([ForeignKey]) used for relationship
//! discovery.
#[macro_use]
mod sql;
mod connect;
pub mod schema;

#[cfg(any(feature = "test-support", test))]
pub mod testing;

pub mod database_error;

pub use connect::{
    database_client::{DatabaseClient, TransactionWrapper},
    database_pool::{
        DatabasePool, PGREST_CHECK_CONNECTION_ON_STARTUP, PGREST_CONNECTION_POOL_SIZE,
        PGREST_POSTGRES_PASSWORD, PGREST_POSTGRES_URL, PGREST_POSTGRES_USER,
    },
};
pub use schema::foreign_key::ForeignKey;
pub use sql::{
    SQLParam, SQLParamContainer,
    bound_value::BoundValue,
    expression_builder::ExpressionBuilder,
    identifier::{Identifier, quote_identifier},
    json_agg::{JsonAgg, ROW_ALIAS},
    prepare::prepare_bindable,
    sql_builder::SQLBuilder,
};
