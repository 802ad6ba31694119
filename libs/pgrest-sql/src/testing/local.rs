// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Ephemeral database server based on a local postgres installation

use std::{
    fs::OpenOptions,
    io::Write,
    process::{Child, Stdio},
    sync::Mutex,
};

use tempfile::TempDir;
use tracing::{error, info};

use super::{
    db::{EphemeralDatabase, EphemeralDatabaseServer, launch_process},
    error::EphemeralDatabaseSetupError,
};

const USER: &str = "pgrest";

pub struct LocalPostgresDatabaseServer {
    process: Mutex<Child>,
    data_dir: TempDir,
}

pub struct LocalPostgresDatabase {
    socket_dir: String,
    name: String,
}

impl LocalPostgresDatabaseServer {
    pub fn check_availability() -> Result<(), EphemeralDatabaseSetupError> {
        which::which("initdb")?;
        which::which("postgres")?;
        which::which("pg_isready")?;
        which::which("createdb")?;
        which::which("dropdb")?;
        Ok(())
    }

    pub fn start()
    -> Result<Box<dyn EphemeralDatabaseServer + Send + Sync>, EphemeralDatabaseSetupError> {
        let data_dir = tempfile::tempdir()?;
        let data_path = path_str(&data_dir)?;

        launch_process(
            "initdb",
            &["-D", &data_path, "-A", "trust", "--username", USER],
        )?;

        // Unix socket only; no TCP port to collide with
        let mut file = OpenOptions::new()
            .append(true)
            .open(data_dir.path().join("postgresql.conf"))?;
        file.write_all(b"\nlisten_addresses = ''\n")?;
        drop(file);

        let postgres = std::process::Command::new("postgres")
            .args(["-D", &data_path, "-k", &data_path])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EphemeralDatabaseSetupError::Generic(format!("Failed to start Postgres: {e}"))
            })?;

        let mut tries = 0;
        while launch_process("pg_isready", &["-h", &data_path, "-U", USER]).is_err() {
            tries += 1;
            if tries > 1000 {
                return Err(EphemeralDatabaseSetupError::Generic(
                    "Postgres failed to start".into(),
                ));
            }

            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        info!("Local PostgreSQL started in {data_path}");

        Ok(Box::new(LocalPostgresDatabaseServer {
            process: Mutex::new(postgres),
            data_dir,
        }))
    }
}

fn path_str(dir: &TempDir) -> Result<String, EphemeralDatabaseSetupError> {
    dir.path()
        .to_str()
        .map(|path| path.to_string())
        .ok_or_else(|| EphemeralDatabaseSetupError::Generic("Non UTF-8 temporary path".into()))
}

impl EphemeralDatabaseServer for LocalPostgresDatabaseServer {
    fn create_database(
        &self,
        name: &str,
    ) -> Result<Box<dyn EphemeralDatabase + Send + Sync>, EphemeralDatabaseSetupError> {
        let socket_dir = path_str(&self.data_dir)?;
        launch_process("createdb", &["-h", &socket_dir, "-U", USER, name])?;

        Ok(Box::new(LocalPostgresDatabase {
            socket_dir,
            name: name.into(),
        }))
    }

    fn cleanup(&self) {
        if let Ok(mut process) = self.process.lock() {
            if let Err(e) = process.kill() {
                error!("Failed to stop local Postgres: {e}");
            }
            let _ = process.wait();
        }
        let _ = std::fs::remove_dir_all(self.data_dir.path());
    }
}

impl Drop for LocalPostgresDatabaseServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl EphemeralDatabase for LocalPostgresDatabase {
    fn url(&self) -> String {
        format!(
            "postgres://{USER}@{}/{}",
            urlencoding::encode(&self.socket_dir),
            self.name
        )
    }
}

impl Drop for LocalPostgresDatabase {
    fn drop(&mut self) {
        if let Err(e) = launch_process(
            "dropdb",
            &["-h", &self.socket_dir, "--force", "-U", USER, &self.name],
        ) {
            error!("Failed to drop database '{}': {e}", self.name);
        }
    }
}
