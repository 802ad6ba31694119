// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Ephemeral databases on an already running server (`PGREST_TEST_DATABASE_URL`)

use tracing::{error, info};
use url::Url;

use super::{
    db::{EphemeralDatabase, EphemeralDatabaseServer, launch_process},
    error::EphemeralDatabaseSetupError,
};

pub const PGREST_TEST_DATABASE_URL: &str = "PGREST_TEST_DATABASE_URL";

pub struct ExternalPostgresDatabaseServer {
    /// Any database on the server the user may connect to; used as the maintenance database
    url: Url,
}

pub struct ExternalPostgresDatabase {
    maintenance_url: String,
    url: String,
    name: String,
}

impl ExternalPostgresDatabaseServer {
    pub fn from_env() -> Result<Option<Self>, EphemeralDatabaseSetupError> {
        let Ok(url) = std::env::var(PGREST_TEST_DATABASE_URL) else {
            return Ok(None);
        };

        let url = Url::parse(&url).map_err(|e| {
            EphemeralDatabaseSetupError::Generic(format!("Invalid {PGREST_TEST_DATABASE_URL}: {e}"))
        })?;

        which::which("createdb")?;
        which::which("dropdb")?;

        info!("Using PostgreSQL at {}", url.host_str().unwrap_or_default());
        Ok(Some(ExternalPostgresDatabaseServer { url }))
    }

    /// The server URL (credentials and parameters included) pointing at database `name`
    fn database_url(&self, name: &str) -> String {
        let mut url = self.url.clone();
        url.set_path(name);
        url.to_string()
    }
}

impl EphemeralDatabaseServer for ExternalPostgresDatabaseServer {
    fn create_database(
        &self,
        name: &str,
    ) -> Result<Box<dyn EphemeralDatabase + Send + Sync>, EphemeralDatabaseSetupError> {
        let maintenance_url = self.url.to_string();
        launch_process("createdb", &["--maintenance-db", &maintenance_url, name])?;

        Ok(Box::new(ExternalPostgresDatabase {
            maintenance_url,
            url: self.database_url(name),
            name: name.into(),
        }))
    }

    // The server outlives the tests
    fn cleanup(&self) {}
}

impl EphemeralDatabase for ExternalPostgresDatabase {
    fn url(&self) -> String {
        self.url.clone()
    }
}

impl Drop for ExternalPostgresDatabase {
    fn drop(&mut self) {
        if let Err(e) = launch_process(
            "dropdb",
            &["--maintenance-db", &self.maintenance_url, "--force", &self.name],
        ) {
            error!("Failed to drop database '{}': {e}", self.name);
        }
    }
}
