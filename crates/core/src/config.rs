//! Application configuration.
//!
//! Layered the usual way: compiled-in defaults, then an optional TOML file,
//! then `PIPEFLOW_*` environment overrides (e.g. `PIPEFLOW_DATABASE__URL`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use pipeflow_errors::{PipeflowError, PipeflowResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the
    /// environment, in that order of precedence (later wins).
    pub fn load(path: Option<&Path>) -> PipeflowResult<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .map_err(|e| PipeflowError::config_error(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("PIPEFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: AppConfig = builder
            .build()
            .map_err(|e| PipeflowError::config_error(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PipeflowError::config_error(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> PipeflowResult<()> {
        self.database.validate()?;
        self.bootstrap.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:pipeflow.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> PipeflowResult<()> {
        if self.url.is_empty() {
            return Err(PipeflowError::config_error("database.url must not be empty"));
        }
        let supported = self.url.starts_with("postgres://")
            || self.url.starts_with("postgresql://")
            || self.url.starts_with("sqlite:");
        if !supported {
            return Err(PipeflowError::config_error(
                "database.url must be a postgres:// or sqlite: URL",
            ));
        }
        if self.max_connections == 0 {
            return Err(PipeflowError::config_error(
                "database.max_connections must be greater than zero",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(PipeflowError::config_error(
                "database.min_connections must be less than or equal to max_connections",
            ));
        }
        if self.connection_timeout_seconds == 0 {
            return Err(PipeflowError::config_error(
                "database.connection_timeout_seconds must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

/// Initial-data seeding. Both fields must be present for the admin account
/// to be created; the password arrives already hashed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    pub admin_email: Option<String>,
    pub admin_password_hash: Option<String>,
}

impl BootstrapConfig {
    pub fn validate(&self) -> PipeflowResult<()> {
        if self.admin_email.is_some() != self.admin_password_hash.is_some() {
            return Err(PipeflowError::config_error(
                "bootstrap.admin_email and bootstrap.admin_password_hash must be set together",
            ));
        }
        Ok(())
    }

    pub fn admin_account(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password_hash) {
            (Some(email), Some(hash)) => Some((email.as_str(), hash.as_str())),
            _ => None,
        }
    }
}
