// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder};

/// Alias given to the rows being aggregated
pub const ROW_ALIAS: &str = "pgrest_row";

/// Aggregates every row produced by a statement into one JSON array, returned as text.
///
/// `json_agg` keeps each row's columns in their select-list order, so parsing the text with an
/// order-preserving map yields rows whose key order matches the database column order. The
/// `::text` cast lets us read the value as a plain string instead of decoding it as `json`.
#[derive(Debug)]
pub enum JsonAgg<T: ExpressionBuilder> {
    /// `SELECT ... FROM (<statement>) AS "pgrest_row"`, for queries
    SubSelect(T),
    /// `WITH "pgrest_row" AS (<statement>) SELECT ... FROM "pgrest_row"`, for data-modifying
    /// statements with a `RETURNING` clause (which cannot appear in a `FROM` sub-select)
    Cte(T),
}

impl<T: ExpressionBuilder> ExpressionBuilder for JsonAgg<T> {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            JsonAgg::SubSelect(statement) => {
                builder.push_str(r#"SELECT COALESCE(json_agg("pgrest_row"), '[]'::json)::text FROM ("#);
                statement.build(builder);
                builder.push_str(r#") AS "pgrest_row""#);
            }
            JsonAgg::Cte(statement) => {
                builder.push_str(r#"WITH "pgrest_row" AS ("#);
                statement.build(builder);
                builder.push_str(
                    r#") SELECT COALESCE(json_agg("pgrest_row"), '[]'::json)::text FROM "pgrest_row""#,
                );
            }
        }
    }
}
