// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use rand::Rng;
use tracing::info;

use super::{
    docker::DockerPostgresDatabaseServer, error::EphemeralDatabaseSetupError,
    external::ExternalPostgresDatabaseServer, local::LocalPostgresDatabaseServer,
};

/// Launcher for an ephemeral database server: an existing server named by
/// `PGREST_TEST_DATABASE_URL`, a local Postgres installation, or Docker
pub struct EphemeralDatabaseLauncher {}

impl EphemeralDatabaseLauncher {
    /// Create a new database server.
    /// An explicitly configured server wins; otherwise it prefers a local installation and falls
    /// back to Docker if it's not available
    pub fn create_server()
    -> Result<Box<dyn EphemeralDatabaseServer + Send + Sync>, EphemeralDatabaseSetupError> {
        if let Some(server) = ExternalPostgresDatabaseServer::from_env()? {
            Ok(Box::new(server))
        } else if LocalPostgresDatabaseServer::check_availability().is_ok() {
            info!("Launching PostgreSQL locally...");
            LocalPostgresDatabaseServer::start()
        } else if DockerPostgresDatabaseServer::check_availability()? {
            info!("Launching PostgreSQL in Docker...");
            DockerPostgresDatabaseServer::start()
        } else {
            Err(EphemeralDatabaseSetupError::Generic(
                "Neither local PostgreSQL nor Docker is available".to_string(),
            ))
        }
    }
}

/// A ephemeral database server that can create ephemeral databases
pub trait EphemeralDatabaseServer {
    /// Create a new database on the server with the specified name
    fn create_database(
        &self,
        name: &str,
    ) -> Result<Box<dyn EphemeralDatabase + Send + Sync>, EphemeralDatabaseSetupError>;

    /// Stop the server and release its resources
    fn cleanup(&self);
}

/// A ephemeral database that can be used for testing.
/// Implementations drop the database when dropped.
pub trait EphemeralDatabase {
    /// Get the URL to connect to the database (suitable as the `psql` argument)
    fn url(&self) -> String;
}

/// Database and container names: lowercase alphanumeric, safe without quoting
pub fn generate_random_string() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(15)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Launch a process and wait for it to exit
pub(super) fn launch_process(name: &str, args: &[&str]) -> Result<(), EphemeralDatabaseSetupError> {
    let output = std::process::Command::new(name)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .output()
        .map_err(|e| {
            EphemeralDatabaseSetupError::Generic(format!("Failed to launch process {name}: {e}"))
        })?;

    if !output.status.success() {
        return Err(EphemeralDatabaseSetupError::Generic(format!(
            "Process {name} exited with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}
