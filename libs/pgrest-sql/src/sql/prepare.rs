// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tokio_postgres::{GenericClient, Statement, types::Type};
use tracing::debug;

use super::{bound_value::BoundValue, identifier::quote_identifier};

/// Prepare `sql` so that every parameter can be bound from a [`BoundValue`].
///
/// Parameters whose inferred type has no binary encoding in [`BoundValue`] (`interval`, `inet`,
/// `bytea`, extension types, ...) are re-prepared as `$n::text::<type>`, leaving the conversion
/// to the type's own text input function.
pub async fn prepare_bindable(
    client: &(impl GenericClient + Sync),
    sql: &str,
) -> Result<Statement, tokio_postgres::Error> {
    let statement = client.prepare(sql).await?;

    let casts: Vec<(usize, Type)> = statement
        .params()
        .iter()
        .enumerate()
        .filter(|(_, ty)| !BoundValue::binds_natively(ty))
        .map(|(index, ty)| (index + 1, ty.clone()))
        .collect();

    if casts.is_empty() {
        return Ok(statement);
    }

    let sql = cast_placeholders(sql, &casts);
    debug!(%sql, "Casting parameters through text");
    client.prepare(&sql).await
}

/// Rewrite `$n` to `$n::text::"<schema>"."<type>"` for each `(n, type)` in `casts`. Quoted
/// identifiers and literals are copied verbatim.
fn cast_placeholders(sql: &str, casts: &[(usize, Type)]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote = None;

    while let Some(c) = chars.next() {
        out.push(c);

        match quote {
            // A doubled quote closes and reopens the quoted section, which copies it unchanged
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '$' => {
                let mut digits = String::new();
                while let Some(digit) = chars.next_if(char::is_ascii_digit) {
                    digits.push(digit);
                }
                out.push_str(&digits);

                let cast = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| casts.iter().find(|(i, _)| *i == index));
                if let Some((_, ty)) = cast {
                    out.push_str("::text::");
                    out.push_str(&quote_identifier(ty.schema()));
                    out.push('.');
                    out.push_str(&quote_identifier(ty.name()));
                }
            }
            None => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_only_listed_placeholders() {
        let sql = r#"SELECT "t"."a" FROM "t" WHERE "t"."d" = $1 AND "t"."n" > $2 LIMIT $10"#;
        assert_eq!(
            cast_placeholders(sql, &[(1, Type::INTERVAL)]),
            r#"SELECT "t"."a" FROM "t" WHERE "t"."d" = $1::text::"pg_catalog"."interval" AND "t"."n" > $2 LIMIT $10"#
        );
        assert_eq!(
            cast_placeholders(sql, &[(10, Type::INET)]),
            r#"SELECT "t"."a" FROM "t" WHERE "t"."d" = $1 AND "t"."n" > $2 LIMIT $10::text::"pg_catalog"."inet""#
        );
    }

    #[test]
    fn quoted_sections_are_left_alone() {
        let sql = r#"SELECT "odd ""$1"" name" FROM "t" WHERE "t"."x" = $1 AND "t"."y" = '$1'"#;
        assert_eq!(
            cast_placeholders(sql, &[(1, Type::BYTEA)]),
            r#"SELECT "odd ""$1"" name" FROM "t" WHERE "t"."x" = $1::text::"pg_catalog"."bytea" AND "t"."y" = '$1'"#
        );
    }
}
