//! Top-level error type.

use std::path::PathBuf;

use strata_migrate::MigrationError;
use strata_postgres::PgError;
use thiserror::Error;

/// Result type for top-level operations.
pub type StrataResult<T> = Result<T, StrataError>;

/// Errors from loading configuration or running migrations.
#[derive(Error, Debug)]
pub enum StrataError {
    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration value is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The database driver failed.
    #[error(transparent)]
    Postgres(#[from] PgError),

    /// The migration run failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl StrataError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
