// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! # Tracing configuration setup.
//!
//! The server code is instrumented with Rust's `tracing` framework.
//!
//! Calling the `init` function will initialize a global tracing subscriber based on the values of
//! the `PGREST_LOG` environment variable which follows the same conventions as `RUST_LOG`
//! (for example, `PGREST_LOG=rest_resolver=debug` logs every generated SQL statement).

use tracing_subscriber::{EnvFilter, filter::LevelFilter, prelude::*};

use crate::env_const::PGREST_LOG;

/// Initialize the tracing subscriber with a compact `fmt` layer, filtered by `PGREST_LOG`
/// (default: `warn`).
pub fn init() {
    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(PGREST_LOG)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
