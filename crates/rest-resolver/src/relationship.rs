// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Discovery of the relationship between two tables from the foreign keys in the live catalog.
//!
//! Nothing is cached: every call queries the catalog again, so schema changes are picked up by
//! the next request.

use std::collections::BTreeSet;

use pgrest_sql::ForeignKey;
use tokio_postgres::GenericClient;
use tracing::{debug, instrument};

use crate::error::RestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relationship {
    /// The main table holds the foreign key: `main.column` references
    /// `referenced_table.referenced_column` (the target)
    Direct {
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    /// The target table holds the foreign key: `target.column` references
    /// `referenced_table.referenced_column` (the main table)
    Reverse {
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    /// A junction table holds a foreign key to each side:
    /// `junction.junction_main_fk` references `main.main_column` and
    /// `junction.junction_foreign_fk` references `target.target_column`
    ManyToMany {
        junction_table: String,
        junction_main_fk: String,
        junction_foreign_fk: String,
        main_column: String,
        target_column: String,
    },
}

impl Relationship {
    pub fn is_reverse(&self) -> bool {
        matches!(self, Relationship::Reverse { .. })
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self, Relationship::ManyToMany { .. })
    }

    /// The column of the main (parent) table whose value identifies the related rows
    pub fn parent_column(&self) -> &str {
        match self {
            Relationship::Direct { column, .. } => column,
            Relationship::Reverse {
                referenced_column, ..
            } => referenced_column,
            Relationship::ManyToMany { main_column, .. } => main_column,
        }
    }
}

/// Find how rows of `target` relate to rows of `main`, trying in turn a foreign key on `main`, a
/// foreign key on `target`, and a junction table. `hint` names the foreign-key column to use for
/// the first two steps, or the junction table for the last one.
#[instrument(skip(client))]
pub async fn resolve_relationship(
    client: &(impl GenericClient + Sync),
    schema: &str,
    main: &str,
    target: &str,
    hint: Option<&str>,
) -> Result<Relationship, RestError> {
    let matches_hint = |column: &str| hint.is_none_or(|hint| hint == column);

    let direct = ForeignKey::declared_on(client, schema, main)
        .await?
        .into_iter()
        .find(|fk| fk.foreign_table == target && matches_hint(&fk.column));
    if let Some(fk) = direct {
        debug!(column = %fk.column, "Direct relationship");
        return Ok(Relationship::Direct {
            column: fk.column,
            referenced_table: fk.foreign_table,
            referenced_column: fk.foreign_column,
        });
    }

    let reverse = ForeignKey::declared_on(client, schema, target)
        .await?
        .into_iter()
        .find(|fk| fk.foreign_table == main && matches_hint(&fk.column));
    if let Some(fk) = reverse {
        debug!(column = %fk.column, "Reverse relationship");
        return Ok(Relationship::Reverse {
            column: fk.column,
            referenced_table: fk.foreign_table,
            referenced_column: fk.foreign_column,
        });
    }

    let to_main = ForeignKey::referencing(client, schema, main).await?;
    let to_target = ForeignKey::referencing(client, schema, target).await?;

    if let Some(relationship) = find_junction(main, target, hint, &to_main, &to_target) {
        debug!(?relationship, "Many-to-many relationship");
        return Ok(relationship);
    }

    Err(RestError::UnresolvedRelationship {
        main: main.to_string(),
        target: target.to_string(),
    })
}

/// The first junction table (alphabetically) among the tables holding a foreign key to each side
fn find_junction(
    main: &str,
    target: &str,
    hint: Option<&str>,
    to_main: &[ForeignKey],
    to_target: &[ForeignKey],
) -> Option<Relationship> {
    let candidates = |fks: &[ForeignKey]| -> BTreeSet<String> {
        fks.iter()
            .map(|fk| fk.table.clone())
            .filter(|table| table != main && table != target)
            .filter(|table| hint.is_none_or(|hint| hint == table.as_str()))
            .collect()
    };

    let main_side = candidates(to_main);
    let target_side = candidates(to_target);

    main_side.intersection(&target_side).find_map(|junction| {
        let main_fk = to_main.iter().find(|fk| &fk.table == junction)?;
        // With a self-referencing junction (main == target), the two sides must use different
        // columns
        let target_fk = to_target
            .iter()
            .find(|fk| &fk.table == junction && fk.column != main_fk.column)?;

        Some(Relationship::ManyToMany {
            junction_table: junction.clone(),
            junction_main_fk: main_fk.column.clone(),
            junction_foreign_fk: target_fk.column.clone(),
            main_column: main_fk.foreign_column.clone(),
            target_column: target_fk.foreign_column.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk(table: &str, column: &str, foreign_table: &str, foreign_column: &str) -> ForeignKey {
        ForeignKey {
            table: table.into(),
            column: column.into(),
            foreign_table: foreign_table.into(),
            foreign_column: foreign_column.into(),
        }
    }

    #[test]
    fn junction_is_the_common_referencing_table() {
        let to_users = vec![
            fk("posts", "author_id", "users", "id"),
            fk("user_teams", "user_id", "users", "id"),
        ];
        let to_teams = vec![
            fk("projects", "team_id", "teams", "id"),
            fk("user_teams", "team_id", "teams", "id"),
        ];

        assert_eq!(
            find_junction("users", "teams", None, &to_users, &to_teams),
            Some(Relationship::ManyToMany {
                junction_table: "user_teams".into(),
                junction_main_fk: "user_id".into(),
                junction_foreign_fk: "team_id".into(),
                main_column: "id".into(),
                target_column: "id".into(),
            })
        );
    }

    #[test]
    fn junction_is_chosen_alphabetically_and_by_hint() {
        let to_users = vec![
            fk("b_memberships", "user_id", "users", "id"),
            fk("a_memberships", "user_id", "users", "id"),
        ];
        let to_teams = vec![
            fk("a_memberships", "team_id", "teams", "id"),
            fk("b_memberships", "team_id", "teams", "id"),
        ];

        let junction = |hint| match find_junction("users", "teams", hint, &to_users, &to_teams) {
            Some(Relationship::ManyToMany { junction_table, .. }) => Some(junction_table),
            _ => None,
        };

        assert_eq!(junction(None).as_deref(), Some("a_memberships"));
        assert_eq!(junction(Some("b_memberships")).as_deref(), Some("b_memberships"));
        assert_eq!(junction(Some("team_id")), None);
    }

    #[test]
    fn endpoints_are_not_junctions() {
        // teams references users directly; that is not a junction
        let to_users = vec![fk("teams", "owner_id", "users", "id")];
        let to_teams = vec![fk("teams", "parent_id", "teams", "id")];

        assert_eq!(find_junction("users", "teams", None, &to_users, &to_teams), None);
    }

    #[test]
    fn self_referencing_junction() {
        let to_users = vec![
            fk("friendships", "user_id", "users", "id"),
            fk("friendships", "friend_id", "users", "id"),
        ];

        assert_eq!(
            find_junction("users", "users", None, &to_users, &to_users),
            Some(Relationship::ManyToMany {
                junction_table: "friendships".into(),
                junction_main_fk: "user_id".into(),
                junction_foreign_fk: "friend_id".into(),
                main_column: "id".into(),
                target_column: "id".into(),
            })
        );
    }

    #[test]
    fn parent_columns() {
        let direct = Relationship::Direct {
            column: "country_id".into(),
            referenced_table: "countries".into(),
            referenced_column: "id".into(),
        };
        assert_eq!(direct.parent_column(), "country_id");
        assert!(!direct.is_reverse() && !direct.is_many_to_many());

        let reverse = Relationship::Reverse {
            column: "section_id".into(),
            referenced_table: "orchestral_sections".into(),
            referenced_column: "id".into(),
        };
        assert_eq!(reverse.parent_column(), "id");
        assert!(reverse.is_reverse());
    }
}
