//! In-memory migration store.
//!
//! Simulates the structural state of a database (tables, columns,
//! constraints, indexes) with PostgreSQL guard semantics. Useful for
//! tests and for checking a registry against a known starting shape
//! without a server.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{MigrateResult, MigrationError};
use crate::history::{MigrationRecord, MigrationStore, MigrationTransaction};
use crate::sql::{Dialect, GuardedOp, GuardedStatement, PostgresDialect};

/// Structural state of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableState {
    /// Column names, in creation order.
    pub columns: Vec<String>,
    /// Constraint names.
    pub constraints: Vec<String>,
}

impl TableState {
    /// Whether the table has `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Whether the table has `constraint`.
    pub fn has_constraint(&self, constraint: &str) -> bool {
        self.constraints.iter().any(|c| c == constraint)
    }
}

/// Structural state of a simulated database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaState {
    /// Tables by name.
    pub tables: IndexMap<String, TableState>,
    /// Indexes by name, mapped to their table.
    pub indexes: IndexMap<String, String>,
}

impl SchemaState {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with the given columns and constraints.
    pub fn with_table<C, K>(mut self, name: &str, columns: C, constraints: K) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        self.tables.insert(
            name.to_string(),
            TableState {
                columns: columns.into_iter().map(Into::into).collect(),
                constraints: constraints.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Look up a table.
    pub fn table(&self, name: &str) -> Option<&TableState> {
        self.tables.get(name)
    }

    /// Whether a table called `name` exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Apply a guarded operation. Satisfied preconditions are no-ops.
    pub fn apply(&mut self, op: &GuardedOp) -> MigrateResult<()> {
        match op {
            GuardedOp::CreateTable {
                table,
                columns,
                primary_key,
            } => {
                if self.tables.contains_key(table.as_str()) {
                    return Ok(());
                }
                let mut state = TableState {
                    columns: columns.iter().map(|c| c.name.to_string()).collect(),
                    constraints: Vec::new(),
                };
                if !primary_key.is_empty() {
                    state.constraints.push(table.derived("pkey").to_string());
                }
                self.tables.insert(table.to_string(), state);
            }
            GuardedOp::AddColumn { table, column } => {
                if let Some(state) = self.tables.get_mut(table.as_str()) {
                    if !state.has_column(column.name.as_str()) {
                        state.columns.push(column.name.to_string());
                    }
                }
            }
            GuardedOp::DropColumn { table, column } => {
                if let Some(state) = self.tables.get_mut(table.as_str()) {
                    state.columns.retain(|c| c != column.as_str());
                }
            }
            GuardedOp::DropConstraint { table, constraint } => {
                if let Some(state) = self.tables.get_mut(table.as_str()) {
                    state.constraints.retain(|c| c != constraint.as_str());
                }
            }
            GuardedOp::RenameTable { from, to } => {
                if !self.tables.contains_key(from.as_str()) {
                    return Ok(());
                }
                if self.tables.contains_key(to.as_str()) {
                    return Err(MigrationError::database(format!(
                        "relation \"{}\" already exists",
                        to
                    )));
                }
                // Constraints keep their names across a rename.
                if let Some(state) = self.tables.shift_remove(from.as_str()) {
                    self.tables.insert(to.to_string(), state);
                }
                for owner in self.indexes.values_mut() {
                    if owner.as_str() == from.as_str() {
                        *owner = to.to_string();
                    }
                }
            }
            GuardedOp::CreateIndex { index } => {
                if self.indexes.contains_key(index.name.as_str()) {
                    return Ok(());
                }
                let state = self.tables.get(index.table.as_str()).ok_or_else(|| {
                    MigrationError::database(format!(
                        "relation \"{}\" does not exist",
                        index.table
                    ))
                })?;
                if let Some(missing) = index
                    .columns
                    .iter()
                    .find(|c| !state.has_column(c.as_str()))
                {
                    return Err(MigrationError::database(format!(
                        "column \"{}\" does not exist",
                        missing
                    )));
                }
                self.indexes
                    .insert(index.name.to_string(), index.table.to_string());
            }
            GuardedOp::DropIndex { index } => {
                self.indexes.shift_remove(index.as_str());
            }
        }
        Ok(())
    }
}

type FailurePredicate = Box<dyn Fn(&GuardedOp) -> bool + Send>;

#[derive(Default)]
struct MemoryState {
    schema: SchemaState,
    log: Vec<MigrationRecord>,
    log_writes: usize,
    executed: Vec<String>,
    locked: bool,
    initialized: bool,
    fail_when: Option<FailurePredicate>,
    fail_log_writes: bool,
}

impl MemoryState {
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.log.iter().map(|r| r.applied_at).max() {
            Some(last) if now <= last => last + ChronoDuration::microseconds(1),
            _ => now,
        }
    }
}

/// A [`MigrationStore`] over a simulated schema.
///
/// Clones share state, so one handle can inspect the schema while another
/// is owned by an engine. A second handle also competes for the same lock.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    transactional_ddl: bool,
    statement_delay: Option<Duration>,
    commit_delay: Option<Duration>,
    holds_lock: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store over an empty schema.
    pub fn new() -> Self {
        Self::with_schema(SchemaState::new())
    }

    /// Create a store over an existing schema.
    pub fn with_schema(schema: SchemaState) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                schema,
                ..Default::default()
            })),
            transactional_ddl: true,
            statement_delay: None,
            commit_delay: None,
            holds_lock: false,
        }
    }

    /// Apply DDL immediately instead of at commit, like a backend whose
    /// structural changes survive a rollback.
    pub fn non_transactional_ddl(mut self) -> Self {
        self.transactional_ddl = false;
        self
    }

    /// Sleep before executing each statement.
    pub fn statement_delay(mut self, delay: Duration) -> Self {
        self.statement_delay = Some(delay);
        self
    }

    /// Sleep after a commit has become durable, like a backend whose
    /// acknowledgement is slow to arrive.
    pub fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = Some(delay);
        self
    }

    /// Fail every statement whose operation matches `predicate`.
    pub fn fail_when(&self, predicate: impl Fn(&GuardedOp) -> bool + Send + 'static) {
        self.state.lock().fail_when = Some(Box::new(predicate));
    }

    /// Make log writes fail.
    pub fn fail_log_writes(&self, fail: bool) {
        self.state.lock().fail_log_writes = fail;
    }

    /// Remove any injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_when = None;
        state.fail_log_writes = false;
    }

    /// A copy of the committed schema.
    pub fn schema(&self) -> SchemaState {
        self.state.lock().schema.clone()
    }

    /// Committed log entries, ascending by version.
    pub fn log(&self) -> Vec<MigrationRecord> {
        let mut log = self.state.lock().log.clone();
        log.sort_by_key(|r| r.version);
        log
    }

    /// Number of committed log writes.
    pub fn log_writes(&self) -> usize {
        self.state.lock().log_writes
    }

    /// SQL of every statement executed, including rolled-back ones.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Whether the log table has been created.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Whether any handle holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Record a unit as applied without running it, as for a database
    /// whose schema was brought up to date by other means.
    pub fn baseline(&self, version: i64, name: &str) {
        let mut state = self.state.lock();
        let applied_at = state.next_timestamp();
        state.log.push(MigrationRecord {
            version,
            name: name.to_string(),
            applied_at,
        });
    }
}

#[async_trait::async_trait]
impl MigrationStore for MemoryStore {
    fn dialect(&self) -> &dyn Dialect {
        &PostgresDialect
    }

    async fn try_lock(&mut self) -> MigrateResult<bool> {
        let mut state = self.state.lock();
        if self.holds_lock {
            return Ok(true);
        }
        if state.locked {
            return Ok(false);
        }
        state.locked = true;
        self.holds_lock = true;
        Ok(true)
    }

    async fn unlock(&mut self) -> MigrateResult<()> {
        if self.holds_lock {
            self.state.lock().locked = false;
            self.holds_lock = false;
        }
        Ok(())
    }

    async fn initialize(&mut self) -> MigrateResult<()> {
        self.state.lock().initialized = true;
        Ok(())
    }

    async fn applied(&mut self) -> MigrateResult<Vec<MigrationRecord>> {
        Ok(self.log())
    }

    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn MigrationTransaction + 'a>> {
        let schema = self.state.lock().schema.clone();
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            transactional_ddl: self.transactional_ddl,
            statement_delay: self.statement_delay,
            commit_delay: self.commit_delay,
            schema,
            pending_log: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    transactional_ddl: bool,
    statement_delay: Option<Duration>,
    commit_delay: Option<Duration>,
    schema: SchemaState,
    pending_log: Vec<(i64, String)>,
}

#[async_trait::async_trait]
impl MigrationTransaction for MemoryTransaction {
    async fn execute(&mut self, statement: &GuardedStatement) -> MigrateResult<()> {
        if let Some(delay) = self.statement_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        state.executed.push(statement.sql.clone());
        trace!(sql = %statement.sql, "memory store executing");

        if state.fail_when.as_ref().is_some_and(|f| f(&statement.op)) {
            return Err(MigrationError::database(format!(
                "injected failure on {}",
                statement.op.target()
            )));
        }

        if self.transactional_ddl {
            self.schema.apply(&statement.op)
        } else {
            state.schema.apply(&statement.op)
        }
    }

    async fn record_applied(&mut self, version: i64, name: &str) -> MigrateResult<()> {
        let state = self.state.lock();
        if state.fail_log_writes {
            return Err(MigrationError::database("injected log write failure"));
        }
        if state.log.iter().any(|r| r.version == version)
            || self.pending_log.iter().any(|(v, _)| *v == version)
        {
            return Err(MigrationError::database(format!(
                "duplicate key value violates unique constraint: version {}",
                version
            )));
        }
        drop(state);
        self.pending_log.push((version, name.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let this = *self;
        {
            let mut state = this.state.lock();
            if this.transactional_ddl {
                state.schema = this.schema;
            }
            for (version, name) in this.pending_log {
                let applied_at = state.next_timestamp();
                state.log.push(MigrationRecord {
                    version,
                    name,
                    applied_at,
                });
                state.log_writes += 1;
            }
        }
        if let Some(delay) = this.commit_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        Ok(())
    }
}
