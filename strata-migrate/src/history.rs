//! Applied-migration log and the backend seam the runner drives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::quote::quote_identifier;
use crate::sql::{Dialect, GuardedStatement};

/// Default name of the applied-migration log table.
pub const DEFAULT_HISTORY_TABLE: &str = "strata_schema_migrations";

/// A record of an applied migration unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Version of the unit.
    pub version: i64,
    /// Name of the unit.
    pub name: String,
    /// When the unit was committed.
    pub applied_at: DateTime<Utc>,
}

/// A database the runner can migrate.
///
/// Implementations own one connection for the whole run. The set of
/// versions returned by [`applied`](Self::applied) is the only record of
/// what has been applied; there is no schema introspection.
#[async_trait::async_trait]
pub trait MigrationStore: Send {
    /// Statement syntax for this backend.
    fn dialect(&self) -> &dyn Dialect;

    /// Try to take the cross-process migration lock without blocking.
    async fn try_lock(&mut self) -> MigrateResult<bool>;

    /// Release the migration lock.
    async fn unlock(&mut self) -> MigrateResult<()>;

    /// Create the log table if it does not exist.
    async fn initialize(&mut self) -> MigrateResult<()>;

    /// All log entries, ascending by version.
    async fn applied(&mut self) -> MigrateResult<Vec<MigrationRecord>>;

    /// Open a transaction scoped to a single migration unit.
    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn MigrationTransaction + 'a>>;
}

/// A transaction covering one migration unit.
///
/// Dropping a transaction without committing must roll it back.
#[async_trait::async_trait]
pub trait MigrationTransaction: Send {
    /// Execute a guarded statement.
    async fn execute(&mut self, statement: &GuardedStatement) -> MigrateResult<()>;

    /// Append the unit's log entry.
    async fn record_applied(&mut self, version: i64, name: &str) -> MigrateResult<()>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// SQL creating the log table (PostgreSQL).
pub fn postgres_init_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    \
         version BIGINT PRIMARY KEY,\n    \
         name TEXT NOT NULL,\n    \
         applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n);",
        quote_identifier(table)
    )
}

/// SQL reading the log (PostgreSQL).
pub fn postgres_select_sql(table: &str) -> String {
    format!(
        "SELECT version, name, applied_at FROM {} ORDER BY version",
        quote_identifier(table)
    )
}

/// SQL appending to the log (PostgreSQL). Binds `$1` version, `$2` name.
pub fn postgres_insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (version, name, applied_at) VALUES ($1, $2, NOW())",
        quote_identifier(table)
    )
}

/// SQL for the advisory lock (PostgreSQL). Binds `$1` lock key.
pub const POSTGRES_TRY_LOCK_SQL: &str = "SELECT pg_try_advisory_lock($1)";
/// SQL releasing the advisory lock (PostgreSQL). Binds `$1` lock key.
pub const POSTGRES_UNLOCK_SQL: &str = "SELECT pg_advisory_unlock($1)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_record_roundtrips_through_json() {
        let record = MigrationRecord {
            version: 2022110411000000,
            name: "server_names".to_string(),
            applied_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: MigrationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_init_sql_has_table() {
        let sql = postgres_init_sql(DEFAULT_HISTORY_TABLE);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"strata_schema_migrations\""));
        assert!(sql.contains("version BIGINT PRIMARY KEY"));
        assert!(sql.contains("applied_at TIMESTAMPTZ"));
    }

    #[test]
    fn test_log_sql_quotes_table() {
        assert!(postgres_insert_sql("my\"log").contains("\"my\"\"log\""));
        assert!(postgres_select_sql("log").ends_with("ORDER BY version"));
    }
}
