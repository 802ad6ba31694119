// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use pgrest_env::{EnvError, Environment, get_parsed};

pub const PGREST_REST_HTTP_PATH: &str = "PGREST_REST_HTTP_PATH";
pub const PGREST_DB_SCHEMA: &str = "PGREST_DB_SCHEMA";
pub const PGREST_REQUEST_TIMEOUT_SECS: &str = "PGREST_REQUEST_TIMEOUT_SECS";

pub const PGREST_SERVER_HOST: &str = "PGREST_SERVER_HOST";
pub const PGREST_SERVER_PORT: &str = "PGREST_SERVER_PORT";

pub const PGREST_LOG: &str = "PGREST_LOG";

pub fn get_rest_http_path(env: &dyn Environment) -> String {
    let path = env.get_or_else(PGREST_REST_HTTP_PATH, "/rest/v1");
    // "/rest/v1/" and "/rest/v1" are the same base path
    match path.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

pub fn get_db_schema(env: &dyn Environment) -> String {
    env.get_or_else(PGREST_DB_SCHEMA, "public")
}

pub fn get_request_timeout(env: &dyn Environment) -> Result<Duration, EnvError> {
    let secs = get_parsed::<u64>(env, PGREST_REQUEST_TIMEOUT_SECS)?.unwrap_or(30);
    Ok(Duration::from_secs(secs))
}

pub fn get_server_host(env: &dyn Environment) -> String {
    env.get_or_else(PGREST_SERVER_HOST, "0.0.0.0")
}

pub fn get_server_port(env: &dyn Environment) -> Result<u16, EnvError> {
    Ok(get_parsed::<u16>(env, PGREST_SERVER_PORT)?.unwrap_or(3000))
}
