// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![allow(dead_code)]

use bytes::Bytes;
use http::Method;
use pgrest_sql::DatabaseClient;
use rest_resolver::{Operation, Prefer, QueryParams, RestError, RestRequest, RestResponse, execute};
use serde_json::Value;

pub const GEOGRAPHY: &str = r#"
    CREATE TABLE countries (id SERIAL PRIMARY KEY, name TEXT NOT NULL, code TEXT NOT NULL UNIQUE);
    CREATE TABLE cities (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        country_id INT REFERENCES countries(id),
        population INT NOT NULL DEFAULT 0,
        details JSONB
    );

    INSERT INTO countries (name, code) VALUES ('France', 'FR'), ('Japan', 'JP'), ('Atlantis', 'AT');
    INSERT INTO cities (name, country_id, population, details) VALUES
        ('Paris', 1, 2100000, '{"river": "Seine", "districts": [1, 2, 3]}'),
        ('Lyon', 1, 500000, '{"river": "Rhone"}'),
        ('Tokyo', 2, 14000000, NULL),
        ('Nowhere', NULL, 0, NULL);
"#;

pub const ORCHESTRA: &str = r#"
    CREATE TABLE orchestral_sections (id SERIAL PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE instruments (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        section_id INT REFERENCES orchestral_sections(id)
    );

    INSERT INTO orchestral_sections (name) VALUES ('strings'), ('percussion');
    INSERT INTO instruments (name, section_id) VALUES ('violin', 1), ('viola', 1);
"#;

pub const TEAMS: &str = r#"
    CREATE TABLE users (id SERIAL PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE teams (id SERIAL PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE user_teams (
        user_id INT NOT NULL REFERENCES users(id),
        team_id INT NOT NULL REFERENCES teams(id),
        PRIMARY KEY (user_id, team_id)
    );

    INSERT INTO users (name) VALUES ('alice'), ('bob');
    INSERT INTO teams (name) VALUES ('red'), ('blue'), ('green');
    INSERT INTO user_teams (user_id, team_id) VALUES (1, 1), (1, 2), (2, 3);
"#;

pub fn request(
    method: Method,
    table: &str,
    params: &[(&str, &str)],
    body: &str,
    prefer: &[&str],
) -> RestRequest {
    RestRequest {
        method,
        table: table.to_string(),
        params: QueryParams::new(
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        ),
        body: Bytes::from(body.to_string()),
        prefer: Prefer::parse(prefer),
    }
}

pub async fn run(
    client: &mut DatabaseClient,
    method: Method,
    table: &str,
    params: &[(&str, &str)],
    body: &str,
    prefer: &[&str],
) -> Result<RestResponse, RestError> {
    let operation = Operation::from_method(&method).unwrap();
    let request = request(method, table, params, body, prefer);

    execute(client, "public", operation, &request).await
}

pub async fn get(
    client: &mut DatabaseClient,
    table: &str,
    params: &[(&str, &str)],
) -> Value {
    let response = run(client, Method::GET, table, params, "", &[]).await.unwrap();
    rows(&response)
}

pub fn rows(response: &RestResponse) -> Value {
    Value::Array(
        response
            .rows
            .iter()
            .cloned()
            .map(Value::Object)
            .collect(),
    )
}
