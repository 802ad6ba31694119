// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::future::Future;
use std::sync::LazyLock;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::DatabaseClient;
use crate::testing::db::{
    EphemeralDatabaseLauncher, EphemeralDatabaseServer, generate_random_string,
};

/// Ensures we don't call cleanup (and thus force a launch) if no test used the server.
static DATABASE_SERVER_INITIALIZED: AtomicBool = AtomicBool::new(false);

static DATABASE_SERVER: LazyLock<Mutex<Box<dyn EphemeralDatabaseServer + Send + Sync>>> =
    LazyLock::new(|| {
        let server = EphemeralDatabaseLauncher::create_server()
            .unwrap_or_else(|e| panic!("Failed to launch a database server for tests: {e}"));
        Mutex::new(server)
    });

#[ctor::dtor]
fn cleanup() {
    if !DATABASE_SERVER_INITIALIZED.load(Ordering::Relaxed) {
        return;
    }

    DATABASE_SERVER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .cleanup();
}

/// Run `f` with the URL of a fresh database.
///
/// Panics if no database server can be launched (see [`EphemeralDatabaseLauncher`]).
// The server is behind a std Mutex since the dtor above is synchronous. Holding it across the
// await also serializes database tests within a binary.
#[allow(clippy::await_holding_lock)]
pub async fn with_database_url<Fut, T>(f: impl FnOnce(String) -> Fut) -> T
where
    Fut: Future<Output = T>,
{
    DATABASE_SERVER_INITIALIZED.store(true, Ordering::Relaxed);

    let database_server = DATABASE_SERVER
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let database_name = generate_random_string();
    let database = database_server.create_database(&database_name).unwrap();

    let result = f(database.url()).await;
    drop(database);
    result
}

/// Run `f` with a client connected to a fresh database
pub async fn with_client<Fut, T>(f: impl FnOnce(DatabaseClient) -> Fut) -> T
where
    Fut: Future<Output = T>,
{
    with_database_url(|url| async move {
        let client = DatabaseClient::connect_direct(&url).await.unwrap();

        f(client).await
    })
    .await
}

/// Like [`with_client`], after running `init_script` (which may hold several statements)
pub async fn with_init_script<Fut, T>(init_script: &str, f: impl FnOnce(DatabaseClient) -> Fut) -> T
where
    Fut: Future<Output = T>,
{
    with_client(|client| async move {
        client.batch_execute(init_script).await.unwrap();

        f(client).await
    })
    .await
}
