// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod common;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use ::common::env_const::PGREST_REQUEST_TIMEOUT_SECS;
use common::request;
use http::{Method, StatusCode};
use pgrest_env::MapEnvironment;
use pgrest_sql::{
    DatabaseClient, DatabasePool, PGREST_POSTGRES_URL, testing::test_support::with_database_url,
};
use rest_resolver::{Operation, RestError, RestRouter};
use test_log::test;

const ACTIVE_QUERIES: &str = "
    SELECT COUNT(*) FROM pg_stat_activity
    WHERE datname = current_database() AND state = 'active' AND pid <> pg_backend_pid()
";

#[test(tokio::test)]
async fn slow_requests_time_out_and_their_query_is_cancelled() {
    with_database_url(|url| async move {
        let client = DatabaseClient::connect_direct(&url).await.unwrap();
        client
            .batch_execute("CREATE VIEW slow AS SELECT 1 AS id FROM pg_sleep(10)")
            .await
            .unwrap();

        let env = MapEnvironment::from([
            (PGREST_POSTGRES_URL, url.as_str()),
            (PGREST_REQUEST_TIMEOUT_SECS, "1"),
        ]);
        let pool = DatabasePool::from_env(&env, Some(1)).await.unwrap();
        let router = RestRouter::new(Arc::new(pool), Arc::new(env)).unwrap();

        let started = Instant::now();
        let error = router
            .resolve(Operation::Select, &request(Method::GET, "slow", &[], "", &[]))
            .await
            .unwrap_err();

        assert!(matches!(error, RestError::Timeout));
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(5));

        // The server processes the cancel request asynchronously
        let mut active = -1;
        for _ in 0..20 {
            active = client
                .query_one(ACTIVE_QUERIES, &[])
                .await
                .unwrap()
                .get::<_, i64>(0);
            if active == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(active, 0);
    })
    .await;
}
