// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLParamContainer, identifier::Identifier};

/// Accumulates SQL text and the parameters bound to it.
///
/// Statement text can only be extended with `&'static str` fragments (keywords, operators,
/// punctuation), with [`Identifier`]s, or with parameter placeholders. There is deliberately no
/// way to push a runtime `String` as SQL text.
pub struct SQLBuilder {
    /// The SQL being built with placeholders for each parameter
    sql: String,
    /// The list of parameters
    params: Vec<SQLParamContainer>,
    /// Number of parameters bound before this builder's first placeholder (the first
    /// placeholder is `$<param_offset + 1>`)
    param_offset: usize,
}

impl Default for SQLBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SQLBuilder {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// A builder whose first placeholder is `$<param_offset + 1>`. Useful when the resulting
    /// fragment is appended after `param_offset` parameters bound elsewhere.
    pub fn starting_at(param_offset: usize) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            param_offset,
        }
    }

    /// Push a fixed piece of SQL (keyword, operator, punctuation)
    pub fn push_str(&mut self, s: &'static str) {
        self.sql.push_str(s);
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Push a space. This is a common operation, so it is provided as a separate method.
    pub fn push_space(&mut self) {
        self.sql.push(' ');
    }

    /// Push an identifier, quoted and escaped
    pub fn push_identifier(&mut self, identifier: &Identifier) {
        self.sql.push_str(&identifier.quoted());
    }

    /// Push `"<table>"."<column>"`
    pub fn push_column(&mut self, table: &Identifier, column: &Identifier) {
        self.push_identifier(table);
        self.push('.');
        self.push_identifier(column);
    }

    /// Push a parameter, which will be replaced with a placeholder in the SQL string
    /// and the parameter will be added to the list of parameters.
    pub fn push_param(&mut self, param: SQLParamContainer) {
        self.params.push(param);
        self.push('$');
        self.sql.push_str(&self.param_count().to_string());
    }

    /// Push a parameter with an explicit cast (`$<n>::<cast>`), for the places where the
    /// parameter type cannot be inferred from context
    pub fn push_cast_param(&mut self, param: SQLParamContainer, cast: &'static str) {
        self.push_param(param);
        self.push_str("::");
        self.push_str(cast);
    }

    /// Push elements of an iterator, separated by `sep`. The `push_elem` function provides
    /// the flexibility to map the elements (compared to [`SQLBuilder::push_elems`], which assumes that
    /// the elements implement [`ExpressionBuilder`] and [`build`](ExpressionBuilder::build) is all you need to call).
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &'static str,
        push_elem: impl Fn(&mut Self, T),
    ) {
        let len = iter.len();
        for (i, item) in iter.enumerate() {
            push_elem(self, item);

            if i < len - 1 {
                self.sql.push_str(sep);
            }
        }
    }

    /// Push elements of a slice, separated by `sep`. The elements must themselves implement
    /// `ExpressionBuilder`.
    pub fn push_elems<T: ExpressionBuilder>(&mut self, elems: &[T], sep: &'static str) {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(builder);
        });
    }

    /// Index of the last placeholder pushed so far (counting the offset)
    pub fn param_count(&self) -> usize {
        self.param_offset + self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Get the SQL string and the list of parameters. Calling this method should be the final step
    /// in building an SQL expression, and thus this builder consumes the `self`.
    pub fn into_sql(self) -> (String, Vec<SQLParamContainer>) {
        (self.sql, self.params)
    }
}
