// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Ephemeral Postgres databases for tests.
//!
//! A server is launched once per test binary (from a local Postgres installation if available,
//! otherwise through Docker) and each test gets its own freshly created database. Setting
//! `PGREST_TEST_DATABASE_URL` uses an already running server instead.

pub mod db;
pub mod docker;
pub mod error;
pub mod external;
pub mod local;
pub mod test_support;
