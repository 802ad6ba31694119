// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#[cfg(feature = "tls")]
use rustls::RootCertStore;
#[cfg(feature = "tls")]
use rustls_native_certs::load_native_certs;
#[cfg(feature = "tls")]
use rustls_pki_types::{CertificateDer, pem::PemObject};

use crate::database_error::DatabaseError;
use tokio_postgres::config::SslMode;

/// TLS settings extracted from the connection URL
#[derive(Debug, PartialEq)]
pub(crate) struct SslConfig {
    mode: SslMode,
    root_cert_path: Option<String>,
}

impl SslConfig {
    /// Split the `ssl`, `sslmode` and `sslrootcert` query parameters (which tokio-postgres
    /// either doesn't understand or maps only partially) out of the URL.
    ///
    /// Returns the cleaned URL and `None` if TLS is disabled.
    pub(crate) fn from_url(url: &str) -> Result<(String, Option<SslConfig>), DatabaseError> {
        let url = url::Url::parse(url)
            .map_err(|_| DatabaseError::Config("Invalid database URL".into()))?;

        let mut ssl_param_string: Option<String> = None;
        let mut ssl_mode_string: Option<String> = None;
        let mut ssl_root_cert_string = None;

        let query_pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter_map(|(name, value)| match name.as_ref() {
                "ssl" => {
                    ssl_param_string = Some(value.to_string());
                    None
                }
                "sslmode" => {
                    ssl_mode_string = Some(value.to_string());
                    None
                }
                "sslrootcert" => {
                    ssl_root_cert_string = Some(value.to_string());
                    None
                }
                _ => Some((name.to_string(), value.to_string())),
            })
            .collect();

        let mut cleaned_url = url.clone();
        if query_pairs.is_empty() {
            cleaned_url.set_query(None);
        } else {
            cleaned_url
                .query_pairs_mut()
                .clear()
                .extend_pairs(query_pairs);
        }

        // tokio-postgres doesn't decode '+' as a space
        let url = cleaned_url.as_str().replace('+', "%20");

        let mut ssl_mode = SslMode::Prefer;

        // "ssl=true" is shorthand for a required TLS connection; "sslmode" may refine it
        if let Some(ssl_param) = ssl_param_string {
            match ssl_param.as_str().parse() {
                Ok(true) => ssl_mode = SslMode::Require,
                Ok(false) => ssl_mode = SslMode::Prefer,
                _ => {
                    return Err(DatabaseError::Config(format!(
                        "Invalid 'ssl' parameter value {ssl_param}. Must be a 'true' or 'false'",
                    )));
                }
            }
        }
        // Map to the nearest stricter mode tokio-postgres supports
        if let Some(ssl_mode_string) = ssl_mode_string {
            match ssl_mode_string.as_str() {
                "verify-full" | "verify-ca" | "require" => ssl_mode = SslMode::Require,
                "prefer" | "allow" => ssl_mode = SslMode::Prefer,
                "disable" => ssl_mode = SslMode::Disable,
                _ => {
                    return Err(DatabaseError::Config(format!(
                        "Invalid 'sslmode' parameter value {ssl_mode_string}"
                    )));
                }
            }
        }

        let ssl_config = if ssl_mode == SslMode::Disable {
            None
        } else {
            Some(SslConfig {
                mode: ssl_mode,
                root_cert_path: ssl_root_cert_string,
            })
        };

        Ok((url, ssl_config))
    }

    #[cfg(feature = "tls")]
    pub(crate) fn updated_config(
        self,
        mut config: tokio_postgres::Config,
    ) -> Result<
        (
            tokio_postgres::Config,
            tokio_postgres_rustls::MakeRustlsConnect,
        ),
        DatabaseError,
    > {
        config.ssl_mode(self.mode);

        let mut root_store = RootCertStore::empty();

        match self.root_cert_path {
            Some(cert_path) => {
                let certs = CertificateDer::pem_file_iter(&cert_path).map_err(|e| {
                    DatabaseError::Config(format!(
                        "Failed to open certificate file '{cert_path}': {e}"
                    ))
                })?;

                for cert in certs {
                    let cert = cert.map_err(|e| {
                        DatabaseError::Config(format!("Invalid certificate in '{cert_path}': {e}"))
                    })?;
                    root_store.add(cert)?;
                }
            }
            None => {
                // Unix-socket-only configurations don't need certificates
                let needs_certs = config
                    .get_hosts()
                    .iter()
                    .any(|host| matches!(host, tokio_postgres::config::Host::Tcp(_)));

                if needs_certs {
                    root_store.add_parsable_certificates(load_native_certs().certs);
                }
            }
        }

        // install_default fails if a provider is already installed, which is fine
        let _existing = rustls::crypto::ring::default_provider().install_default();
        let client_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok((
            config,
            tokio_postgres_rustls::MakeRustlsConnect::new(client_config),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_url_prefers_tls() {
        let (url, config) = SslConfig::from_url("postgres://user@localhost:5432/app").unwrap();

        assert_eq!(url, "postgres://user@localhost:5432/app");
        assert_eq!(
            config,
            Some(SslConfig {
                mode: SslMode::Prefer,
                root_cert_path: None
            })
        );
    }

    #[test]
    fn ssl_parameters_are_extracted() {
        let (url, config) = SslConfig::from_url(
            "postgres://localhost/app?sslmode=verify-full&application_name=pgrest&sslrootcert=/tmp/ca.pem",
        )
        .unwrap();

        assert_eq!(url, "postgres://localhost/app?application_name=pgrest");
        assert_eq!(
            config,
            Some(SslConfig {
                mode: SslMode::Require,
                root_cert_path: Some("/tmp/ca.pem".to_string())
            })
        );
    }

    #[test]
    fn disabled() {
        let (url, config) = SslConfig::from_url("postgres://localhost/app?sslmode=disable").unwrap();

        assert_eq!(url, "postgres://localhost/app");
        assert_eq!(config, None);
    }

    #[test]
    fn invalid_values() {
        assert!(SslConfig::from_url("postgres://localhost/app?ssl=maybe").is_err());
        assert!(SslConfig::from_url("postgres://localhost/app?sslmode=sometimes").is_err());
        assert!(SslConfig::from_url("not a url").is_err());
    }
}
