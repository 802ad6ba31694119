// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The statements issued by the handlers.

use pgrest_sql::{ExpressionBuilder, Identifier, SQLBuilder, SQLParamContainer};

use crate::{
    filter::{Conjunction, Filter},
    order::{OrderBy, OrderTerm, Pagination},
    select_clause::SelectColumn,
};

/// The select list (or `RETURNING` list) of a statement
pub struct Projection<'a> {
    pub table: &'a Identifier,
    pub columns: &'a [SelectColumn],
    /// `(column, alias)`: parent columns selected only so that embedded rows can be matched
    pub helpers: Vec<(Identifier, &'a Identifier)>,
}

impl ExpressionBuilder for Projection<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        let mut first = true;
        let mut separator = |builder: &mut SQLBuilder| {
            if !first {
                builder.push_str(", ");
            }
            first = false;
        };

        for column in self.columns {
            separator(builder);
            match column {
                SelectColumn::Star => {
                    builder.push_identifier(self.table);
                    builder.push_str(".*");
                }
                SelectColumn::Column {
                    column: column_ref,
                    alias,
                } => {
                    column_ref.qualified(self.table).build(builder);
                    if alias.is_some() || column_ref.is_json_path() {
                        builder.push_str(" AS ");
                        builder.push_identifier(&Identifier::new(
                            column.output_name().unwrap_or(column_ref.output_name()),
                        ));
                    }
                }
            }
        }

        for (column, alias) in &self.helpers {
            separator(builder);
            builder.push_column(self.table, column);
            builder.push_str(" AS ");
            builder.push_identifier(alias);
        }
    }
}

/// `"<table>"."<column>" = <value>`
pub struct Anchor {
    pub table: Identifier,
    pub column: Identifier,
    pub value: SQLParamContainer,
}

/// `JOIN "<junction>" ON "<junction>"."<junction_column>" = "<target>"."<target_column>"`
pub struct JunctionJoin {
    pub junction: Identifier,
    pub junction_column: Identifier,
    pub target_column: Identifier,
}

pub struct SelectStatement<'a> {
    pub table: &'a Identifier,
    pub projection: Projection<'a>,
    pub junction: Option<JunctionJoin>,
    pub anchors: Vec<Anchor>,
    pub filters: &'a [Filter],
    pub order: &'a [OrderTerm],
    pub pagination: Pagination,
}

impl ExpressionBuilder for SelectStatement<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("SELECT ");
        self.projection.build(builder);
        builder.push_str(" FROM ");
        builder.push_identifier(self.table);

        if let Some(join) = &self.junction {
            builder.push_str(" JOIN ");
            builder.push_identifier(&join.junction);
            builder.push_str(" ON ");
            builder.push_column(&join.junction, &join.junction_column);
            builder.push_str(" = ");
            builder.push_column(self.table, &join.target_column);
        }

        build_where(builder, self.table, &self.anchors, self.filters);

        OrderBy {
            table: self.table,
            terms: self.order,
        }
        .build(builder);
        self.pagination.build(builder);
    }
}

fn build_where(
    builder: &mut SQLBuilder,
    table: &Identifier,
    anchors: &[Anchor],
    filters: &[Filter],
) {
    if anchors.is_empty() && filters.is_empty() {
        return;
    }

    builder.push_str(" WHERE ");
    builder.push_iter(anchors.iter(), " AND ", |builder, anchor| {
        builder.push_column(&anchor.table, &anchor.column);
        builder.push_str(" = ");
        builder.push_param(anchor.value.clone());
    });

    if !anchors.is_empty() && !filters.is_empty() {
        builder.push_str(" AND ");
    }
    Conjunction { table, filters }.build(builder);
}

/// `SELECT COUNT(*)` over the rows matching the filters, ignoring pagination
pub struct CountStatement<'a> {
    pub table: &'a Identifier,
    pub filters: &'a [Filter],
}

impl ExpressionBuilder for CountStatement<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("SELECT COUNT(*) FROM ");
        builder.push_identifier(self.table);
        build_where(builder, self.table, &[], self.filters);
    }
}

pub enum ConflictAction {
    /// `DO UPDATE SET "<column>" = EXCLUDED."<column>"` for each column
    Update(Vec<Identifier>),
    Nothing,
}

pub struct OnConflict {
    pub target: Vec<Identifier>,
    pub action: ConflictAction,
}

pub struct InsertStatement<'a> {
    pub table: &'a Identifier,
    pub columns: &'a [Identifier],
    /// One entry per column for each row; `None` inserts the column default
    pub rows: Vec<Vec<Option<SQLParamContainer>>>,
    pub on_conflict: Option<OnConflict>,
    pub returning: Projection<'a>,
}

impl ExpressionBuilder for InsertStatement<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("INSERT INTO ");
        builder.push_identifier(self.table);

        if self.columns.is_empty() {
            builder.push_str(" DEFAULT VALUES");
        } else {
            builder.push_str(" (");
            builder.push_iter(self.columns.iter(), ", ", |builder, column| {
                builder.push_identifier(column)
            });
            builder.push_str(") VALUES ");
            builder.push_iter(self.rows.iter(), ", ", |builder, row| {
                builder.push('(');
                builder.push_iter(row.iter(), ", ", |builder, value| match value {
                    Some(value) => builder.push_param(value.clone()),
                    None => builder.push_str("DEFAULT"),
                });
                builder.push(')');
            });
        }

        if let Some(on_conflict) = &self.on_conflict {
            builder.push_str(" ON CONFLICT (");
            builder.push_iter(on_conflict.target.iter(), ", ", |builder, column| {
                builder.push_identifier(column)
            });
            builder.push(')');

            match &on_conflict.action {
                ConflictAction::Update(columns) => {
                    builder.push_str(" DO UPDATE SET ");
                    builder.push_iter(columns.iter(), ", ", |builder, column| {
                        builder.push_identifier(column);
                        builder.push_str(" = EXCLUDED.");
                        builder.push_identifier(column);
                    });
                }
                ConflictAction::Nothing => builder.push_str(" DO NOTHING"),
            }
        }

        builder.push_str(" RETURNING ");
        self.returning.build(builder);
    }
}

pub struct UpdateStatement<'a> {
    pub table: &'a Identifier,
    pub assignments: Vec<(Identifier, SQLParamContainer)>,
    pub filters: &'a [Filter],
    pub returning: Projection<'a>,
}

impl ExpressionBuilder for UpdateStatement<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("UPDATE ");
        builder.push_identifier(self.table);
        builder.push_str(" SET ");
        builder.push_iter(self.assignments.iter(), ", ", |builder, (column, value)| {
            builder.push_identifier(column);
            builder.push_str(" = ");
            builder.push_param(value.clone());
        });

        // Continues the placeholder numbering after the SET values
        build_where(builder, self.table, &[], self.filters);

        builder.push_str(" RETURNING ");
        self.returning.build(builder);
    }
}

pub struct DeleteStatement<'a> {
    pub table: &'a Identifier,
    pub filters: &'a [Filter],
    pub returning: Projection<'a>,
}

impl ExpressionBuilder for DeleteStatement<'_> {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("DELETE FROM ");
        builder.push_identifier(self.table);
        build_where(builder, self.table, &[], self.filters);
        builder.push_str(" RETURNING ");
        self.returning.build(builder);
    }
}
