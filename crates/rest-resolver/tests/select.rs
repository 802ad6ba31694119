// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod common;

use common::{GEOGRAPHY, get, run};
use http::{Method, StatusCode};
use pgrest_sql::testing::test_support::with_init_script;
use rest_resolver::RestError;
use serde_json::json;
use test_log::test;

#[test(tokio::test)]
async fn columns_keep_select_order() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let response = run(
            &mut client,
            Method::GET,
            "cities",
            &[("select", "population,name"), ("id", "eq.1")],
            "",
            &[],
        )
        .await
        .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.rows[0].keys().collect::<Vec<_>>(),
            vec!["population", "name"]
        );
    })
    .await;
}

#[test(tokio::test)]
async fn filters_order_and_pagination() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let rows = get(
            &mut client,
            "cities",
            &[
                ("select", "name"),
                ("population", "gt.0"),
                ("order", "population.desc"),
                ("limit", "2"),
                ("offset", "1"),
            ],
        )
        .await;

        assert_eq!(rows, json!([{"name": "Paris"}, {"name": "Lyon"}]));
    })
    .await;
}

#[test(tokio::test)]
async fn repeated_keys_are_combined() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let rows = get(
            &mut client,
            "cities",
            &[
                ("select", "name"),
                ("population", "gt.100"),
                ("population", "lt.10000000"),
                ("order", "id"),
            ],
        )
        .await;

        assert_eq!(rows, json!([{"name": "Paris"}, {"name": "Lyon"}]));
    })
    .await;
}

#[test(tokio::test)]
async fn in_lists_of_integers_and_texts() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let by_id = get(
            &mut client,
            "cities",
            &[("select", "name"), ("id", "in.(1,3)"), ("order", "id")],
        )
        .await;
        assert_eq!(by_id, json!([{"name": "Paris"}, {"name": "Tokyo"}]));

        let by_name = get(
            &mut client,
            "cities",
            &[("select", "id"), ("name", "in.(Lyon,Tokyo)"), ("order", "id")],
        )
        .await;
        assert_eq!(by_name, json!([{"id": 2}, {"id": 3}]));
    })
    .await;
}

#[test(tokio::test)]
async fn pattern_and_null_filters() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let like = get(
            &mut client,
            "cities",
            &[("select", "name"), ("name", "like.*o*"), ("order", "id")],
        )
        .await;
        assert_eq!(
            like,
            json!([{"name": "Lyon"}, {"name": "Tokyo"}, {"name": "Nowhere"}])
        );

        let ilike = get(
            &mut client,
            "cities",
            &[("select", "name"), ("name", "ilike.p*")],
        )
        .await;
        assert_eq!(ilike, json!([{"name": "Paris"}]));

        let orphans = get(
            &mut client,
            "cities",
            &[("select", "name"), ("country_id", "is.null")],
        )
        .await;
        assert_eq!(orphans, json!([{"name": "Nowhere"}]));
    })
    .await;
}

#[test(tokio::test)]
async fn json_paths() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let rows = get(
            &mut client,
            "cities",
            &[
                ("select", "name,details->>river,first:details->districts->0"),
                ("details->>river", "eq.Seine"),
            ],
        )
        .await;

        assert_eq!(rows, json!([{"name": "Paris", "river": "Seine", "first": 1}]));
    })
    .await;
}

#[test(tokio::test)]
async fn exact_count() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let response = run(
            &mut client,
            Method::GET,
            "cities",
            &[("select", "name"), ("order", "id"), ("limit", "2")],
            "",
            &["count=exact"],
        )
        .await
        .unwrap();
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.content_range.as_deref(), Some("0-1/4"));

        let empty = run(
            &mut client,
            Method::GET,
            "cities",
            &[("offset", "10")],
            "",
            &["count=exact"],
        )
        .await
        .unwrap();
        assert!(empty.rows.is_empty());
        assert_eq!(empty.content_range.as_deref(), Some("*/4"));

        let uncounted = run(&mut client, Method::GET, "cities", &[], "", &[])
            .await
            .unwrap();
        assert_eq!(uncounted.content_range, None);
    })
    .await;
}

#[test(tokio::test)]
async fn empty_result_is_not_an_error() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let rows = get(&mut client, "cities", &[("name", "eq.Atlantis City")]).await;
        assert_eq!(rows, json!([]));
    })
    .await;
}

#[test(tokio::test)]
async fn request_errors() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let unknown_table = run(&mut client, Method::GET, "planets", &[], "", &[])
            .await
            .unwrap_err();
        assert_eq!(unknown_table.status_code(), StatusCode::NOT_FOUND);

        let unknown_column = run(
            &mut client,
            Method::GET,
            "cities",
            &[("altitude", "eq.3")],
            "",
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(unknown_column.status_code(), StatusCode::BAD_REQUEST);

        let bad_value = run(
            &mut client,
            Method::GET,
            "cities",
            &[("population", "eq.many")],
            "",
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(bad_value.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            bad_value.to_json()["details"],
            json!("invalid digit found in string")
        );

        let bad_is = run(
            &mut client,
            Method::GET,
            "cities",
            &[("country_id", "is.maybe")],
            "",
            &[],
        )
        .await
        .unwrap_err();
        assert!(matches!(bad_is, RestError::InvalidRequest(_)));
    })
    .await;
}

#[test(tokio::test)]
async fn hostile_identifiers_are_quoted() {
    with_init_script(GEOGRAPHY, |mut client| async move {
        let error = run(
            &mut client,
            Method::GET,
            "cities",
            &[("select", r#"name"; DROP TABLE cities; --"#)],
            "",
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let rows = get(&mut client, "cities", &[("select", "name"), ("id", "eq.1")]).await;
        assert_eq!(rows, json!([{"name": "Paris"}]));
    })
    .await;
}
