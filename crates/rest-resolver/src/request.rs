// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytes::Bytes;
use http::Method;

/// Query parameters that are not filters
pub const RESERVED_KEYS: [&str; 6] = [
    "select",
    "order",
    "limit",
    "offset",
    "on_conflict",
    "columns",
];

/// Query parameters in request order. A key may appear several times (`age=gt.1&age=lt.9`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self(params)
    }

    /// The first value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameters that compile into this table's WHERE clause: neither reserved nor addressed to an
    /// embedded resource (`cities.name=...`, where the `.` appears before any JSON arrow)
    pub fn filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(key, _)| {
            !RESERVED_KEYS.contains(key) && !column_base(key).contains('.')
        })
    }

    pub fn has_filters(&self) -> bool {
        self.filters().next().is_some()
    }

    /// Parameters addressed to an embedded resource known by any of `prefixes` (its alias and its
    /// table name), with the `<prefix>.` removed
    pub fn scoped(&self, prefixes: &[&str]) -> QueryParams {
        let params = self
            .0
            .iter()
            .filter_map(|(key, value)| {
                prefixes.iter().find_map(|prefix| {
                    key.strip_prefix(prefix)
                        .and_then(|rest| rest.strip_prefix('.'))
                        .filter(|rest| !rest.is_empty())
                        .map(|rest| (rest.to_string(), value.clone()))
                })
            })
            .collect();

        QueryParams(params)
    }
}

/// The part of a filter key before any JSON arrow
fn column_base(key: &str) -> &str {
    key.find("->").map(|index| &key[..index]).unwrap_or(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    MergeDuplicates,
    IgnoreDuplicates,
}

/// The recognized tokens of the `Prefer` request header(s)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefer {
    pub resolution: Option<Resolution>,
    pub count_exact: bool,
}

impl Prefer {
    /// Parse all `Prefer` header values; tokens are comma separated and unknown ones are ignored
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Self {
        let mut prefer = Prefer::default();

        for token in values
            .iter()
            .flat_map(|value| value.as_ref().split(','))
            .map(str::trim)
        {
            match token {
                "resolution=merge-duplicates" => {
                    prefer.resolution = Some(Resolution::MergeDuplicates)
                }
                "resolution=ignore-duplicates" => {
                    prefer.resolution = Some(Resolution::IgnoreDuplicates)
                }
                "count=exact" => prefer.count_exact = true,
                _ => {}
            }
        }

        prefer
    }
}

/// Everything the handlers need to know about one request
#[derive(Debug)]
pub struct RestRequest {
    pub method: Method,
    pub table: String,
    pub params: QueryParams,
    pub body: Bytes,
    pub prefer: Prefer,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn filters_skip_reserved_and_embedded_keys() {
        let params = params(&[
            ("select", "name,cities(name)"),
            ("age", "gt.1"),
            ("cities.name", "eq.Paris"),
            ("order", "name"),
            ("data->a.b", "eq.1"),
            ("age", "lt.9"),
            ("limit", "5"),
        ]);

        let filters: Vec<_> = params.filters().collect();
        assert_eq!(
            filters,
            vec![("age", "gt.1"), ("data->a.b", "eq.1"), ("age", "lt.9")]
        );
    }

    #[test]
    fn scoped_params_strip_the_prefix() {
        let params = params(&[
            ("cities.name", "eq.Paris"),
            ("c.order", "name.desc"),
            ("cities.districts.name", "eq.Marais"),
            ("citizens.name", "eq.x"),
            ("name", "eq.France"),
        ]);

        assert_eq!(
            params.scoped(&["c", "cities"]),
            QueryParams::new(vec![
                ("name".into(), "eq.Paris".into()),
                ("order".into(), "name.desc".into()),
                ("districts.name".into(), "eq.Marais".into()),
            ])
        );
    }

    #[test]
    fn prefer_tokens() {
        assert_eq!(
            Prefer::parse(&["resolution=merge-duplicates, count=exact"]),
            Prefer {
                resolution: Some(Resolution::MergeDuplicates),
                count_exact: true
            }
        );

        assert_eq!(
            Prefer::parse(&["return=representation", "resolution=ignore-duplicates"]),
            Prefer {
                resolution: Some(Resolution::IgnoreDuplicates),
                count_exact: false
            }
        );

        assert_eq!(Prefer::parse::<&str>(&[]), Prefer::default());
    }
}
