//! [`MigrationStore`] backed by PostgreSQL.
//!
//! The store holds one session for the whole run. The migration lock is a
//! session-level advisory lock, so it is released when the connection
//! closes even if the process dies mid-run.

use chrono::{DateTime, Utc};
use strata_migrate::history::{
    POSTGRES_TRY_LOCK_SQL, POSTGRES_UNLOCK_SQL, postgres_init_sql, postgres_insert_sql,
    postgres_select_sql,
};
use strata_migrate::{
    DEFAULT_HISTORY_TABLE, Dialect, GuardedStatement, Identifier, MigrateResult, MigrationRecord,
    MigrationStore, MigrationTransaction, PostgresDialect,
};
use tracing::{debug, warn};

use crate::config::PgConfig;
use crate::connection::{PgConnection, PgTransaction};
use crate::error::{PgError, PgResult};

/// Advisory lock key shared by every process migrating the same database.
pub const DEFAULT_LOCK_KEY: i64 = 0x5354_5241_5441_4d47;

/// A migration store on a dedicated PostgreSQL connection.
pub struct PgMigrationStore {
    conn: PgConnection,
    dialect: PostgresDialect,
    history_table: Identifier,
    lock_key: i64,
}

impl PgMigrationStore {
    /// Connect using `config`.
    pub async fn connect(config: &PgConfig) -> PgResult<Self> {
        Ok(Self::new(PgConnection::connect(config).await?))
    }

    /// Wrap an open connection.
    pub fn new(conn: PgConnection) -> Self {
        Self {
            conn,
            dialect: PostgresDialect,
            history_table: Identifier::new(DEFAULT_HISTORY_TABLE),
            lock_key: DEFAULT_LOCK_KEY,
        }
    }

    /// Use a different log table.
    pub fn with_history_table(mut self, table: impl Into<Identifier>) -> PgResult<Self> {
        let table = table.into();
        table
            .validate()
            .map_err(|e| PgError::config(e.to_string()))?;
        self.history_table = table;
        Ok(self)
    }

    /// Use a different advisory lock key.
    pub fn with_lock_key(mut self, key: i64) -> Self {
        self.lock_key = key;
        self
    }

    /// The log table name.
    pub fn history_table(&self) -> &Identifier {
        &self.history_table
    }

    /// The advisory lock key.
    pub fn lock_key(&self) -> i64 {
        self.lock_key
    }
}

#[async_trait::async_trait]
impl MigrationStore for PgMigrationStore {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn try_lock(&mut self) -> MigrateResult<bool> {
        let row = self
            .conn
            .query_one(POSTGRES_TRY_LOCK_SQL, &[&self.lock_key])
            .await?;
        let acquired: bool = row.try_get(0).map_err(PgError::from)?;
        debug!(key = self.lock_key, acquired, "Tried advisory lock");
        Ok(acquired)
    }

    async fn unlock(&mut self) -> MigrateResult<()> {
        let row = self
            .conn
            .query_one(POSTGRES_UNLOCK_SQL, &[&self.lock_key])
            .await?;
        let released: bool = row.try_get(0).map_err(PgError::from)?;
        if !released {
            warn!(key = self.lock_key, "Advisory lock was not held");
        }
        Ok(())
    }

    async fn initialize(&mut self) -> MigrateResult<()> {
        self.conn
            .batch_execute(&postgres_init_sql(self.history_table.as_str()))
            .await?;
        Ok(())
    }

    async fn applied(&mut self) -> MigrateResult<Vec<MigrationRecord>> {
        let rows = self
            .conn
            .query(&postgres_select_sql(self.history_table.as_str()), &[])
            .await?;

        let records = rows
            .iter()
            .map(|row| -> PgResult<MigrationRecord> {
                Ok(MigrationRecord {
                    version: row.try_get(0)?,
                    name: row.try_get(1)?,
                    applied_at: row.try_get::<_, DateTime<Utc>>(2)?,
                })
            })
            .collect::<PgResult<Vec<_>>>()?;
        Ok(records)
    }

    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn MigrationTransaction + 'a>> {
        let insert_sql = postgres_insert_sql(self.history_table.as_str());
        let txn = self.conn.transaction().await?;
        Ok(Box::new(PgMigrationTransaction { txn, insert_sql }))
    }
}

/// The transaction wrapping one migration unit.
pub struct PgMigrationTransaction<'a> {
    txn: PgTransaction<'a>,
    insert_sql: String,
}

#[async_trait::async_trait]
impl MigrationTransaction for PgMigrationTransaction<'_> {
    async fn execute(&mut self, statement: &GuardedStatement) -> MigrateResult<()> {
        self.txn.batch_execute(&statement.sql).await?;
        Ok(())
    }

    async fn record_applied(&mut self, version: i64, name: &str) -> MigrateResult<()> {
        self.txn
            .execute(&self.insert_sql, &[&version, &name])
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
