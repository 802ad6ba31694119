// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(test)]

//! Test assertion to check SQL statements and parameters.

/// Assert that the built statement and its parameters match the expected ones.
///
/// # Usage:
/// ```no_run
/// assert_binding!(builder.into_sql(), "\"a\" = $1", SQLParamContainer::integer(1));
/// ```
macro_rules! assert_binding {
    ($actual:expr, $expected_stmt:expr) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        assert!(actual_params.is_empty(), "Extra actual parameters");
    };
    ($actual:expr, $expected_stmt:expr, $($rest:expr),*) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        let expected_params: Vec<$crate::SQLParamContainer> = vec![$($rest),*];
        assert_eq!(actual_params, expected_params, "Parameter mismatch");
    };
}
