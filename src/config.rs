use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cloud::PollConfig;

pub const DEFAULT_CONFIG_FILE: &str = "account-mover.toml";

/// Main configuration structure for the account mover
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MoverConfig {
    pub migration: MigrationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Role assumed in each member account and whose trust is rewritten
    pub access_role_name: String,
    /// Session name used for every AssumeRole call
    pub role_session_name: String,
    /// Failed accounts tolerated before the batch stops
    pub max_failures: u32,
    /// Pause between removal from the source and the invitation
    pub settle_delay_seconds: u64,
    pub handshake_poll_attempts: u32,
    pub handshake_poll_interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
    pub error_log_path: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            access_role_name: "OrganizationAccountAccessRole".to_string(),
            role_session_name: "AccountMover".to_string(),
            max_failures: 3,
            settle_delay_seconds: 30,
            handshake_poll_attempts: 10,
            handshake_poll_interval_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            error_log_path: "migration_errors.log".to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_seconds)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            max_attempts: self.handshake_poll_attempts,
            interval: Duration::from_secs(self.handshake_poll_interval_seconds),
        }
    }
}

impl MoverConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`explicit_file`, else account-mover.toml if present)
    /// 3. Environment variables (prefixed with ACCOUNT_MOVER_, `__` between keys)
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match explicit_file {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("ACCOUNT_MOVER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Callers validate once command-line overrides are applied.
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.migration.max_failures == 0 {
            bail!("migration.max_failures must be at least 1");
        }
        if self.migration.handshake_poll_attempts == 0 {
            bail!("migration.handshake_poll_attempts must be at least 1");
        }
        if self.migration.access_role_name.trim().is_empty() {
            bail!("migration.access_role_name must not be empty");
        }
        if self.migration.role_session_name.trim().is_empty() {
            bail!("migration.role_session_name must not be empty");
        }
        match self.logging.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => bail!("logging.log_format must be 'text' or 'json', got '{other}'"),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
