// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::str::FromStr;

use deadpool_postgres::{
    ConfigConnectImpl, Connect, Manager, ManagerConfig, Pool, RecyclingMethod,
};
use pgrest_env::{Environment, get_parsed};
use tokio_postgres::{CancelToken, Config};
use tracing::{debug, info};

use crate::database_error::{DatabaseError, WithContext};

use super::{database_client::DatabaseClient, ssl_config::SslConfig};

pub const PGREST_POSTGRES_URL: &str = "PGREST_POSTGRES_URL";
/// Consulted when [`PGREST_POSTGRES_URL`] is not set
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const PGREST_POSTGRES_USER: &str = "PGREST_POSTGRES_USER";
pub const PGREST_POSTGRES_PASSWORD: &str = "PGREST_POSTGRES_PASSWORD";
pub const PGREST_CONNECTION_POOL_SIZE: &str = "PGREST_CONNECTION_POOL_SIZE";
pub const PGREST_CHECK_CONNECTION_ON_STARTUP: &str = "PGREST_CHECK_CONNECTION_ON_STARTUP";

const DEFAULT_POOL_SIZE: usize = 10;

pub struct DatabasePool {
    pool: Pool,
    /// The connector used by the pool's connections, reused to reach the server when cancelling
    #[cfg(feature = "tls")]
    tls: Option<tokio_postgres_rustls::MakeRustlsConnect>,
}

impl DatabasePool {
    // pool_size_override useful when we want to explicitly control the pool size (for example, to 1 in tests)
    pub async fn from_env(
        env: &dyn Environment,
        pool_size_override: Option<usize>,
    ) -> Result<Self, DatabaseError> {
        let url = env
            .get(PGREST_POSTGRES_URL)
            .or_else(|| env.get(DATABASE_URL))
            .ok_or(DatabaseError::Config(format!(
                "Env {PGREST_POSTGRES_URL} (or {DATABASE_URL}) must be provided"
            )))?;

        let user = env.get(PGREST_POSTGRES_USER);
        let password = env.get(PGREST_POSTGRES_PASSWORD);
        let pool_size = match pool_size_override {
            Some(size) => size,
            None => get_parsed(env, PGREST_CONNECTION_POOL_SIZE)?.unwrap_or(DEFAULT_POOL_SIZE),
        };

        let pool = Self::from_helper(pool_size, &url, user, password).await?;

        if env.enabled(PGREST_CHECK_CONNECTION_ON_STARTUP, true)? {
            pool.check_connection().await?;
        }

        Ok(pool)
    }

    pub async fn from_db_url(url: &str, pool_size: Option<usize>) -> Result<Self, DatabaseError> {
        Self::from_helper(pool_size.unwrap_or(1), url, None, None).await
    }

    pub async fn get_client(&self) -> Result<DatabaseClient, DatabaseError> {
        Ok(DatabaseClient::Pooled(self.pool.get().await?))
    }

    /// Ask the server to cancel the query running on the connection behind `token`, connecting
    /// the way the pool's own connections do
    pub async fn cancel_query(&self, token: &CancelToken) -> Result<(), tokio_postgres::Error> {
        #[cfg(feature = "tls")]
        {
            if let Some(tls) = &self.tls {
                return token.cancel_query(tls.clone()).await;
            }
        }

        token.cancel_query(tokio_postgres::NoTls).await
    }

    /// Obtain a client and run a trivial statement, so that a misconfigured database is
    /// reported at startup rather than on the first request.
    pub async fn check_connection(&self) -> Result<(), DatabaseError> {
        let client = self
            .get_client()
            .await
            .with_context("Failed to connect to the database".into())?;
        client.simple_query("SELECT 1").await?;
        info!("Database connection verified");
        Ok(())
    }

    async fn from_helper(
        pool_size: usize,
        url: &str,
        user: Option<String>,
        password: Option<String>,
    ) -> Result<Self, DatabaseError> {
        let (url, ssl_config) = SslConfig::from_url(url)?;

        let config = Config::from_str(&url).map_err(|e| {
            DatabaseError::Delegate(e)
                .with_context("Failed to parse PostgreSQL connection string".into())
        })?;

        debug!(pool_size, tls = ssl_config.is_some(), "Creating database pool");

        match ssl_config {
            #[cfg(feature = "tls")]
            Some(ssl_config) => {
                let (config, tls) = ssl_config.updated_config(config)?;
                let connect = ConfigConnectImpl { tls: tls.clone() };

                Ok(Self {
                    pool: Self::build_pool(pool_size, config, connect, user, password)?,
                    tls: Some(tls),
                })
            }
            #[cfg(not(feature = "tls"))]
            Some(_) => Err(DatabaseError::Config(
                "SSL was requested, but TLS support is not enabled".into(),
            )),
            None => {
                let connect = ConfigConnectImpl {
                    tls: tokio_postgres::NoTls,
                };

                Ok(Self {
                    pool: Self::build_pool(pool_size, config, connect, user, password)?,
                    #[cfg(feature = "tls")]
                    tls: None,
                })
            }
        }
    }

    fn build_pool(
        pool_size: usize,
        mut config: Config,
        connect: impl Connect + 'static,
        user: Option<String>,
        password: Option<String>,
    ) -> Result<Pool, DatabaseError> {
        if let Some(user) = &user {
            config.user(user);
        }
        if let Some(password) = &password {
            config.password(password);
        }

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_connect(config, connect, manager_config);

        Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| DatabaseError::Config(format!("Failed to create DB pool: {e}")))
    }
}
