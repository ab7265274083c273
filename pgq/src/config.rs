//! Connection settings loaded via OrthoConfig.
//!
//! Values come from `PGQ_*` environment variables (and any configuration
//! file or CLI layer OrthoConfig discovers). When a discrete connection
//! field is unset, the matching libpq variable (`PGHOST`, `PGPORT`,
//! `PGDATABASE`, `PGUSER`, `PGPASSWORD`, `PGSSLMODE`) is consulted before
//! the built-in default.

use std::env;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::outbound::persistence::PoolConfig;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_DATABASE: &str = "postgres";
const DEFAULT_USERNAME: &str = "postgres";
const DEFAULT_SSLMODE: &str = "prefer";

/// Errors raised while turning settings into a connection URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionSettingsError {
    /// The composed URL was rejected.
    #[error("invalid database connection settings: {message}")]
    InvalidUrl {
        /// Parser message.
        message: String,
    },
}

impl ConnectionSettingsError {
    fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PGQ")]
pub struct ConnectionSettings {
    /// Full connection URL; overrides every discrete field below.
    pub database_url: Option<String>,
    /// Server host name.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Database name.
    pub database: Option<String>,
    /// Login role.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// libpq `sslmode`.
    pub sslmode: Option<String>,
    /// Upper bound on pooled connections.
    #[ortho_config(default = 10)]
    pub max_connections: u32,
}

fn libpq_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn resolve(configured: Option<&str>, libpq: &str, default: &str) -> String {
    configured
        .map(str::to_owned)
        .or_else(|| libpq_env(libpq))
        .unwrap_or_else(|| default.to_owned())
}

impl ConnectionSettings {
    /// Effective host.
    #[must_use]
    pub fn host(&self) -> String {
        resolve(self.host.as_deref(), "PGHOST", DEFAULT_HOST)
    }

    /// Effective port. An unparsable `PGPORT` falls back to 5432.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| libpq_env("PGPORT").and_then(|value| value.parse().ok()))
            .unwrap_or(DEFAULT_PORT)
    }

    /// Effective database name.
    #[must_use]
    pub fn database(&self) -> String {
        resolve(self.database.as_deref(), "PGDATABASE", DEFAULT_DATABASE)
    }

    /// Effective login role.
    #[must_use]
    pub fn username(&self) -> String {
        resolve(self.username.as_deref(), "PGUSER", DEFAULT_USERNAME)
    }

    /// Effective password; empty when none is configured.
    #[must_use]
    pub fn password(&self) -> String {
        resolve(self.password.as_deref(), "PGPASSWORD", "")
    }

    /// Effective `sslmode`.
    #[must_use]
    pub fn sslmode(&self) -> String {
        resolve(self.sslmode.as_deref(), "PGSSLMODE", DEFAULT_SSLMODE)
    }

    /// Render the libpq connection URL.
    ///
    /// `database_url` is returned verbatim when set. Otherwise the URL is
    /// composed from the discrete fields with credentials percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionSettingsError::InvalidUrl`] when the host cannot
    /// form a valid URL.
    pub fn database_url(&self) -> Result<String, ConnectionSettingsError> {
        if let Some(url) = self.database_url.as_deref().filter(|url| !url.is_empty()) {
            return Ok(url.to_owned());
        }

        let base = format!("postgres://{}:{}/", self.host(), self.port());
        let mut url =
            Url::parse(&base).map_err(|err| ConnectionSettingsError::invalid_url(err.to_string()))?;
        url.set_username(&self.username())
            .map_err(|()| ConnectionSettingsError::invalid_url("host cannot carry credentials"))?;
        let password = self.password();
        if !password.is_empty() {
            url.set_password(Some(&password))
                .map_err(|()| ConnectionSettingsError::invalid_url("host cannot carry credentials"))?;
        }
        url.set_path(&format!("/{}", self.database()));
        url.query_pairs_mut().append_pair("sslmode", &self.sslmode());
        Ok(url.into())
    }

    /// Pool configuration for these settings.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::database_url`] failures.
    pub fn pool_config(&self) -> Result<PoolConfig, ConnectionSettingsError> {
        Ok(PoolConfig::new(self.database_url()?).with_max_size(self.max_connections))
    }
}
