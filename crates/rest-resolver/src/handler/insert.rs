// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use http::StatusCode;
use pgrest_sql::{Identifier, JsonAgg, SQLParamContainer};
use serde_json::{Map, Value};
use tokio_postgres::Transaction;
use tracing::{debug, instrument};

use super::{RestResponse, parse_body};
use crate::{
    embed::{SelectPlan, fetch_embeds},
    error::RestError,
    order::Pagination,
    request::{RestRequest, Resolution},
    row::query_rows,
    select_clause::SelectClause,
    statement::{Anchor, ConflictAction, InsertStatement, OnConflict, SelectStatement},
};

#[instrument(skip_all, fields(table = %request.table))]
pub(super) async fn insert(
    tx: &Transaction<'_>,
    schema: &str,
    request: &RestRequest,
) -> Result<RestResponse, RestError> {
    let objects = parse_objects(parse_body(&request.body)?)?;
    if objects.is_empty() {
        return Ok(RestResponse::new(StatusCode::CREATED, vec![]));
    }

    let columns = column_union(&objects);
    if columns.is_empty() && objects.len() > 1 {
        return Err(RestError::InvalidBody(
            "Cannot insert several rows without any column".to_string(),
        ));
    }

    let conflict = conflict_clause(request, &columns)?;

    let select = SelectClause::parse(request.params.get("select"))?;
    let plan = SelectPlan::build(tx, schema, &request.table, select, &request.params).await?;

    let column_identifiers: Vec<Identifier> = columns.iter().map(Identifier::new).collect();
    let values = objects
        .iter()
        .map(|object| {
            columns
                .iter()
                .map(|column| object.get(column).cloned().map(SQLParamContainer::json))
                .collect()
        })
        .collect();

    let ignores_duplicates = matches!(
        conflict,
        Some(Conflict {
            action: ConflictKind::Nothing,
            ..
        })
    );
    let conflict_target = conflict.as_ref().map(|c| c.target.clone());

    let statement = InsertStatement {
        table: &plan.table,
        columns: &column_identifiers,
        rows: values,
        on_conflict: conflict.map(|conflict| conflict.into_clause()),
        returning: plan.projection(),
    };
    let mut rows = query_rows(tx, JsonAgg::Cte(statement)).await?;

    if rows.is_empty() && ignores_duplicates && objects.len() == 1 {
        if let Some(anchors) = conflict_target
            .as_deref()
            .and_then(|target| existing_row_anchors(&plan.table, target, &objects[0]))
        {
            debug!("Duplicate ignored, returning the existing row");
            let statement = SelectStatement {
                table: &plan.table,
                projection: plan.projection(),
                junction: None,
                anchors,
                filters: &[],
                order: &[],
                pagination: Pagination::default(),
            };
            rows = query_rows(tx, JsonAgg::SubSelect(statement)).await?;
        }
    }

    fetch_embeds(tx, &plan, &mut rows).await?;

    Ok(RestResponse::new(StatusCode::CREATED, rows))
}

/// A single object or an array of objects
fn parse_objects(body: Value) -> Result<Vec<Map<String, Value>>, RestError> {
    match body {
        Value::Object(object) => Ok(vec![object]),
        Value::Array(elements) => elements
            .into_iter()
            .map(|element| match element {
                Value::Object(object) => Ok(object),
                _ => Err(RestError::InvalidBody(
                    "Expected an array of objects".to_string(),
                )),
            })
            .collect(),
        _ => Err(RestError::InvalidBody(
            "Expected an object or an array of objects".to_string(),
        )),
    }
}

/// Every key of every object, in first-seen order
fn column_union(objects: &[Map<String, Value>]) -> Vec<String> {
    let mut columns: Vec<String> = vec![];
    for key in objects.iter().flat_map(|object| object.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

#[derive(Debug, PartialEq)]
enum ConflictKind {
    /// Update every non-target column
    Update(Vec<String>),
    Nothing,
}

#[derive(Debug, PartialEq)]
struct Conflict {
    target: Vec<String>,
    action: ConflictKind,
}

impl Conflict {
    fn into_clause(self) -> OnConflict {
        OnConflict {
            target: self.target.into_iter().map(Identifier::new).collect(),
            action: match self.action {
                ConflictKind::Update(columns) => {
                    ConflictAction::Update(columns.into_iter().map(Identifier::new).collect())
                }
                ConflictKind::Nothing => ConflictAction::Nothing,
            },
        }
    }
}

/// `on_conflict` alone means merge; a resolution alone infers the target from the columns
fn conflict_clause(
    request: &RestRequest,
    columns: &[String],
) -> Result<Option<Conflict>, RestError> {
    let explicit_target: Option<Vec<String>> = request.params.get("on_conflict").map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .map(str::to_string)
            .collect()
    });

    if explicit_target.is_none() && request.prefer.resolution.is_none() {
        return Ok(None);
    }

    let target = match explicit_target {
        Some(target) if !target.is_empty() => target,
        _ => infer_conflict_target(&request.table, columns)
            .map(|column| vec![column.to_string()])
            .ok_or_else(|| {
                RestError::invalid_request("Cannot infer a conflict target without columns")
            })?,
    };

    let action = match request.prefer.resolution {
        Some(Resolution::IgnoreDuplicates) => ConflictKind::Nothing,
        Some(Resolution::MergeDuplicates) | None => {
            let updated: Vec<String> = columns
                .iter()
                .filter(|column| !target.contains(column))
                .cloned()
                .collect();
            if updated.is_empty() {
                ConflictKind::Nothing
            } else {
                ConflictKind::Update(updated)
            }
        }
    };

    Ok(Some(Conflict { target, action }))
}

fn infer_conflict_target<'a>(table: &str, columns: &'a [String]) -> Option<&'a str> {
    let table_id = format!("{table}_id");

    ["id", "uuid", table_id.as_str()]
        .iter()
        .find_map(|candidate| columns.iter().find(|column| column.as_str() == *candidate))
        .or_else(|| columns.first())
        .map(String::as_str)
}

/// Equality on each conflict-target column, using the submitted values. `None` if the object
/// doesn't supply every target column (the existing row can't be identified then).
fn existing_row_anchors(
    table: &Identifier,
    target: &[String],
    object: &Map<String, Value>,
) -> Option<Vec<Anchor>> {
    target
        .iter()
        .map(|column| {
            object.get(column).map(|value| Anchor {
                table: table.clone(),
                column: Identifier::from(column.as_str()),
                value: SQLParamContainer::json(value.clone()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::Method;
    use serde_json::json;

    use super::*;
    use crate::request::{Prefer, QueryParams};

    fn request(on_conflict: Option<&str>, resolution: Option<Resolution>) -> RestRequest {
        RestRequest {
            method: Method::POST,
            table: "people".to_string(),
            params: QueryParams::new(
                on_conflict
                    .map(|value| vec![("on_conflict".to_string(), value.to_string())])
                    .unwrap_or_default(),
            ),
            body: Bytes::new(),
            prefer: Prefer {
                resolution,
                count_exact: false,
            },
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn single_object_or_array() {
        assert_eq!(parse_objects(json!({"a": 1})).unwrap().len(), 1);
        assert_eq!(parse_objects(json!([{"a": 1}, {"b": 2}])).unwrap().len(), 2);
        assert!(parse_objects(json!([])).unwrap().is_empty());
        assert!(parse_objects(json!([1])).is_err());
        assert!(parse_objects(json!("text")).is_err());
    }

    #[test]
    fn columns_in_first_seen_order() {
        let objects = parse_objects(json!([{"b": 1, "a": 2}, {"c": 3, "a": 4}])).unwrap();
        assert_eq!(column_union(&objects), columns(&["b", "a", "c"]));
    }

    #[test]
    fn no_conflict_clause_by_default() {
        assert_eq!(
            conflict_clause(&request(None, None), &columns(&["id", "name"])).unwrap(),
            None
        );
    }

    #[test]
    fn explicit_target_merges() {
        assert_eq!(
            conflict_clause(&request(Some("email"), None), &columns(&["email", "name"])).unwrap(),
            Some(Conflict {
                target: columns(&["email"]),
                action: ConflictKind::Update(columns(&["name"])),
            })
        );
    }

    #[test]
    fn composite_target() {
        assert_eq!(
            conflict_clause(
                &request(Some("a, b"), Some(Resolution::MergeDuplicates)),
                &columns(&["a", "b", "c"])
            )
            .unwrap(),
            Some(Conflict {
                target: columns(&["a", "b"]),
                action: ConflictKind::Update(columns(&["c"])),
            })
        );
    }

    #[test]
    fn inferred_target() {
        assert_eq!(
            infer_conflict_target("people", &columns(&["name", "people_id"])),
            Some("people_id")
        );
        assert_eq!(
            infer_conflict_target("people", &columns(&["uuid", "id"])),
            Some("id")
        );
        assert_eq!(
            infer_conflict_target("people", &columns(&["name", "email"])),
            Some("name")
        );
        assert_eq!(infer_conflict_target("people", &[]), None);
    }

    #[test]
    fn ignore_duplicates() {
        assert_eq!(
            conflict_clause(
                &request(None, Some(Resolution::IgnoreDuplicates)),
                &columns(&["id", "name"])
            )
            .unwrap(),
            Some(Conflict {
                target: columns(&["id"]),
                action: ConflictKind::Nothing,
            })
        );
    }

    #[test]
    fn merge_without_other_columns_does_nothing() {
        assert_eq!(
            conflict_clause(
                &request(None, Some(Resolution::MergeDuplicates)),
                &columns(&["id"])
            )
            .unwrap(),
            Some(Conflict {
                target: columns(&["id"]),
                action: ConflictKind::Nothing,
            })
        );
    }

    #[test]
    fn missing_target_value_skips_lookup() {
        let object = parse_objects(json!({"name": "Ann"})).unwrap().remove(0);
        assert!(
            existing_row_anchors(&Identifier::new("people"), &columns(&["id"]), &object).is_none()
        );
    }
}
