//! Configuration file parsing for `strata.toml`.
//!
//! ```toml
//! [database]
//! url = "${DATABASE_URL}"
//! statement_timeout_ms = 30000
//!
//! [migrations]
//! history_table = "strata_schema_migrations"
//! lock_timeout_secs = 60
//! ```
//!
//! `${VAR}` references are replaced with the variable's value before
//! parsing. Unset variables are left as written.

use std::path::Path;
use std::time::Duration;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use strata_migrate::{DEFAULT_HISTORY_TABLE, MigrationConfig};
use strata_postgres::{DEFAULT_LOCK_KEY, PgConfig, PgMigrationStore};

use crate::error::{StrataError, StrataResult};

/// Main configuration structure for `strata.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseSection,

    /// Migration runner settings.
    #[serde(default)]
    pub migrations: MigrationsSection,
}

/// `[database]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    /// Connection URL. Falls back to `DATABASE_URL` when unset.
    pub url: Option<String>,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Server-side statement timeout in milliseconds.
    pub statement_timeout_ms: Option<u64>,
    /// Application name reported to the server.
    pub application_name: Option<String>,
}

/// `[migrations]`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsSection {
    /// Applied-migration log table.
    #[serde(default = "default_history_table")]
    pub history_table: String,
    /// Seconds to wait for the migration lock. 0 fails fast.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    /// Milliseconds between lock attempts.
    #[serde(default = "default_lock_retry_interval_ms")]
    pub lock_retry_interval_ms: u64,
    /// Deadline for a single migration unit, in seconds.
    #[serde(default)]
    pub unit_timeout_secs: Option<u64>,
    /// Advisory lock key.
    #[serde(default = "default_lock_key")]
    pub lock_key: i64,
    /// Report pending migrations without applying them.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for MigrationsSection {
    fn default() -> Self {
        Self {
            history_table: default_history_table(),
            lock_timeout_secs: default_lock_timeout_secs(),
            lock_retry_interval_ms: default_lock_retry_interval_ms(),
            unit_timeout_secs: None,
            lock_key: default_lock_key(),
            dry_run: false,
        }
    }
}

fn default_history_table() -> String {
    DEFAULT_HISTORY_TABLE.to_string()
}
fn default_lock_timeout_secs() -> u64 {
    60
}
fn default_lock_retry_interval_ms() -> u64 {
    500
}
fn default_lock_key() -> i64 {
    DEFAULT_LOCK_KEY
}

impl StrataConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| StrataError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> StrataResult<Self> {
        let expanded = expand_env_vars(content)?;
        Ok(toml::from_str(&expanded)?)
    }

    /// Connection settings for the migration store.
    pub fn pg_config(&self) -> StrataResult<PgConfig> {
        let mut builder = PgConfig::builder();
        builder = match &self.database.url {
            Some(url) => builder.url(url.clone()),
            None => builder.url(PgConfig::from_env()?.url),
        };
        if let Some(secs) = self.database.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = self.database.statement_timeout_ms {
            builder = builder.statement_timeout(Duration::from_millis(ms));
        }
        if let Some(name) = &self.database.application_name {
            builder = builder.application_name(name.clone());
        }
        Ok(builder.build()?)
    }

    /// Runner settings.
    pub fn migration_config(&self) -> MigrationConfig {
        let section = &self.migrations;
        let mut config = MigrationConfig::new()
            .lock_retry_interval(Duration::from_millis(section.lock_retry_interval_ms))
            .dry_run(section.dry_run);
        config = match section.lock_timeout_secs {
            0 => config.fail_fast(),
            secs => config.lock_timeout(Duration::from_secs(secs)),
        };
        if let Some(secs) = section.unit_timeout_secs {
            config = config.unit_timeout(Duration::from_secs(secs));
        }
        config
    }

    /// Connect a migration store using these settings.
    pub async fn connect_store(&self) -> StrataResult<PgMigrationStore> {
        let store = PgMigrationStore::connect(&self.pg_config()?)
            .await?
            .with_history_table(self.migrations.history_table.as_str())?
            .with_lock_key(self.migrations.lock_key);
        Ok(store)
    }
}

/// Expand `${VAR_NAME}` references.
fn expand_env_vars(content: &str) -> StrataResult<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| StrataError::config(e.to_string()))?;
    let expanded = re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StrataConfig::default();
        assert!(config.database.url.is_none());
        assert_eq!(config.migrations.history_table, "strata_schema_migrations");
        assert_eq!(config.migrations.lock_timeout_secs, 60);
        assert_eq!(config.migrations.lock_key, DEFAULT_LOCK_KEY);
    }

    #[test]
    fn test_unset_variable_is_kept() {
        let expanded = expand_env_vars("url = \"${STRATA_TEST_SURELY_UNSET_VAR}\"").unwrap();
        assert_eq!(expanded, "url = \"${STRATA_TEST_SURELY_UNSET_VAR}\"");
    }

    #[test]
    fn test_variable_is_expanded() {
        let path = std::env::var("PATH").unwrap_or_default();
        let expanded = expand_env_vars("value = \"${PATH}\"").unwrap();
        assert_eq!(expanded, format!("value = \"{}\"", path));
    }

    #[test]
    fn test_zero_lock_timeout_fails_fast() {
        let mut config = StrataConfig::default();
        config.migrations.lock_timeout_secs = 0;
        assert!(config.migration_config().lock_timeout.is_none());
    }
}
