//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while registering or applying migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Two migration units share a version token.
    #[error("Duplicate migration version {version}: '{existing}' and '{duplicate}'")]
    DuplicateVersion {
        /// The colliding version.
        version: i64,
        /// Name of the unit registered first.
        existing: String,
        /// Name of the rejected unit.
        duplicate: String,
    },

    /// A migration unit declares no steps.
    #[error("Migration {version} '{name}' has no steps")]
    EmptyMigration {
        /// Version of the unit.
        version: i64,
        /// Name of the unit.
        name: String,
    },

    /// A schema object name cannot be embedded in a statement.
    #[error("Invalid identifier {name:?}: {reason}")]
    InvalidIdentifier {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A guarded structural statement failed.
    #[error("Migration {version} '{unit}' failed at step {step} on {target}: {source}")]
    StepExecutionFailed {
        /// Version of the failing unit.
        version: i64,
        /// Name of the failing unit.
        unit: String,
        /// Zero-based index of the failing step within the unit.
        step: usize,
        /// The entity the statement targeted.
        target: String,
        /// Underlying backend failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// The applied-migration log entry could not be written or committed.
    #[error("Migration {version} '{unit}' could not be recorded: {source}")]
    LogWriteFailed {
        /// Version of the unit.
        version: i64,
        /// Name of the unit.
        unit: String,
        /// Underlying backend failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// The advisory lock for the run could not be acquired.
    #[error("Failed to acquire migration lock: {0}")]
    LockUnavailable(String),

    /// A unit did not finish before its deadline and was rolled back.
    #[error("Migration {version} '{unit}' timed out after {timeout_ms}ms")]
    UnitTimedOut {
        /// Version of the unit.
        version: i64,
        /// Name of the unit.
        unit: String,
        /// The configured deadline.
        timeout_ms: u64,
    },

    /// Database operation error.
    #[error("Database error: {0}")]
    Database(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a lock unavailable error.
    pub fn lock_unavailable(msg: impl Into<String>) -> Self {
        Self::LockUnavailable(msg.into())
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason,
        }
    }

    /// Wrap a backend failure as a step failure of the given unit.
    pub fn step_failed(
        version: i64,
        unit: impl Into<String>,
        step: usize,
        target: impl Into<String>,
        source: MigrationError,
    ) -> Self {
        Self::StepExecutionFailed {
            version,
            unit: unit.into(),
            step,
            target: target.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a backend failure as a bookkeeping failure of the given unit.
    pub fn log_write_failed(version: i64, unit: impl Into<String>, source: MigrationError) -> Self {
        Self::LogWriteFailed {
            version,
            unit: unit.into(),
            source: Box::new(source),
        }
    }

    /// The version of the unit this error is attributed to, if any.
    pub fn version(&self) -> Option<i64> {
        match self {
            Self::DuplicateVersion { version, .. }
            | Self::EmptyMigration { version, .. }
            | Self::StepExecutionFailed { version, .. }
            | Self::LogWriteFailed { version, .. }
            | Self::UnitTimedOut { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// Whether the hosting process must abort startup on this error.
    /// Always true.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Whether retrying the whole run later may succeed without code changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LockUnavailable(_) | Self::UnitTimedOut { .. } | Self::Database(_) => true,
            Self::StepExecutionFailed { source, .. } | Self::LogWriteFailed { source, .. } => {
                source.is_retryable()
            }
            Self::DuplicateVersion { .. }
            | Self::EmptyMigration { .. }
            | Self::InvalidIdentifier { .. } => false,
        }
    }
}
