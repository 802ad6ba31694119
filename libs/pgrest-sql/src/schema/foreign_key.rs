// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tokio_postgres::GenericClient;
use tracing::debug;

use crate::database_error::{DatabaseError, WithContext};

/// A single-column foreign key: `table.column` references `foreign_table.foreign_column`.
///
/// Composite keys appear as one entry per column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

// Constraints are matched through the owning table's oid (`conrelid`), since constraint names
// are only unique per table. `conkey` and `confkey` list the column pairs in order.
const FOREIGN_KEY_SELECT: &str = "
SELECT
    self_table.relname::text AS table_name,
    self_column.attname::text AS column_name,
    foreign_table.relname::text AS foreign_table_name,
    foreign_column.attname::text AS foreign_column_name
FROM
    pg_constraint
    JOIN pg_class AS self_table ON pg_constraint.conrelid = self_table.oid
    JOIN pg_namespace AS self_schema ON self_table.relnamespace = self_schema.oid
    JOIN pg_class AS foreign_table ON pg_constraint.confrelid = foreign_table.oid
    JOIN pg_namespace AS foreign_schema ON foreign_table.relnamespace = foreign_schema.oid
    CROSS JOIN LATERAL unnest(pg_constraint.conkey, pg_constraint.confkey)
        AS column_pair(self_attnum, foreign_attnum)
    JOIN pg_attribute AS self_column
        ON self_column.attrelid = self_table.oid
        AND self_column.attnum = column_pair.self_attnum
    JOIN pg_attribute AS foreign_column
        ON foreign_column.attrelid = foreign_table.oid
        AND foreign_column.attnum = column_pair.foreign_attnum
WHERE
    pg_constraint.contype = 'f'
    AND pg_constraint.conparentid = 0
";

fn declared_on_query() -> String {
    format!(
        "{FOREIGN_KEY_SELECT}
    AND self_schema.nspname = $1::text AND self_table.relname = $2::text
ORDER BY column_name, foreign_table_name"
    )
}

fn referencing_query() -> String {
    format!(
        "{FOREIGN_KEY_SELECT}
    AND foreign_schema.nspname = $1::text AND foreign_table.relname = $2::text
    AND self_schema.nspname = $1::text
ORDER BY table_name, column_name"
    )
}

impl ForeignKey {
    /// Foreign keys declared on `table` (`table` holds the referencing column)
    pub async fn declared_on(
        client: &(impl GenericClient + Sync),
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKey>, DatabaseError> {
        Self::load(client, &declared_on_query(), schema, table)
            .await
            .with_context(format!("Failed to read foreign keys of table '{table}'"))
    }

    /// Foreign keys (on any table of the schema) that reference `table`
    pub async fn referencing(
        client: &(impl GenericClient + Sync),
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKey>, DatabaseError> {
        Self::load(client, &referencing_query(), schema, table)
            .await
            .with_context(format!("Failed to read foreign keys referencing '{table}'"))
    }

    async fn load(
        client: &(impl GenericClient + Sync),
        query: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKey>, DatabaseError> {
        let rows = client.query(query, &[&schema, &table]).await?;

        let foreign_keys: Vec<ForeignKey> = rows
            .iter()
            .map(|row| {
                Ok(ForeignKey {
                    table: row.try_get("table_name")?,
                    column: row.try_get("column_name")?,
                    foreign_table: row.try_get("foreign_table_name")?,
                    foreign_column: row.try_get("foreign_column_name")?,
                })
            })
            .collect::<Result<_, tokio_postgres::Error>>()?;

        debug!(schema, table, count = foreign_keys.len(), "Loaded foreign keys");

        Ok(foreign_keys)
    }
}
