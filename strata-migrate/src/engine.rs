//! Migration engine implementation.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{MigrateResult, MigrationError};
use crate::history::{MigrationRecord, MigrationStore};
use crate::migration::MigrationUnit;
use crate::registry::MigrationRegistry;
use crate::rename::RenameResolver;
use crate::sql::GuardedStatement;

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// How long to keep retrying the migration lock. `None` fails fast.
    pub lock_timeout: Option<Duration>,
    /// Delay between lock attempts.
    pub lock_retry_interval: Duration,
    /// Deadline for running a unit's statements and log write. The unit is
    /// rolled back when it expires. Commit is not bounded.
    pub unit_timeout: Option<Duration>,
    /// Whether to run in dry-run mode.
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Some(Duration::from_secs(60)),
            lock_retry_interval: Duration::from_millis(500),
            unit_timeout: None,
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long to wait for the migration lock.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Fail immediately if another process holds the migration lock.
    pub fn fail_fast(mut self) -> Self {
        self.lock_timeout = None;
        self
    }

    /// Set the delay between lock attempts.
    pub fn lock_retry_interval(mut self, interval: Duration) -> Self {
        self.lock_retry_interval = interval;
        self
    }

    /// Set the per-unit deadline.
    pub fn unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = Some(timeout);
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of a migration run.
#[derive(Debug, Default)]
pub struct MigrationResult {
    /// Number of units applied.
    pub applied_count: usize,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
    /// Versions of applied units, in application order.
    pub applied_migrations: Vec<i64>,
    /// Number of statements executed.
    pub statements_executed: usize,
    /// Warnings generated during the run.
    pub warnings: Vec<String>,
}

impl MigrationResult {
    /// Check if any units were applied.
    pub fn has_changes(&self) -> bool {
        self.applied_count > 0
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if self.applied_count == 0 {
            "No migrations applied".to_string()
        } else {
            format!(
                "{} applied ({} statements) in {}ms",
                self.applied_count, self.statements_executed, self.duration_ms
            )
        }
    }
}

/// A pending unit and the statements it would execute.
#[derive(Debug, Clone)]
pub struct PlannedUnit {
    /// Version of the unit.
    pub version: i64,
    /// Name of the unit.
    pub name: String,
    /// Statements, in execution order.
    pub statements: Vec<GuardedStatement>,
}

/// Result of planning a run.
#[derive(Debug, Default)]
pub struct MigrationPlan {
    /// Pending units, ascending by version.
    pub pending: Vec<PlannedUnit>,
}

impl MigrationPlan {
    /// Check if there's anything to migrate.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total number of statements across pending units.
    pub fn statement_count(&self) -> usize {
        self.pending.iter().map(|u| u.statements.len()).sum()
    }

    /// Get a summary of the plan.
    pub fn summary(&self) -> String {
        if self.pending.is_empty() {
            "No changes to apply".to_string()
        } else {
            format!(
                "{} pending migrations; {} statements",
                self.pending.len(),
                self.statement_count()
            )
        }
    }

    /// The full script, one statement per line, with a header per unit.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        for unit in &self.pending {
            out.push_str(&format!("-- {} {}\n", unit.version, unit.name));
            for statement in &unit.statements {
                out.push_str(&statement.sql);
                out.push('\n');
            }
        }
        out
    }
}

/// Migration status information.
#[derive(Debug)]
pub struct MigrationStatus {
    /// Applied units.
    pub applied: Vec<MigrationRecord>,
    /// Pending versions, ascending.
    pub pending: Vec<i64>,
    /// Logged versions the registry does not know about.
    pub unknown: Vec<i64>,
}

impl MigrationStatus {
    /// Whether the schema is current with the registry.
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The migration runner.
pub struct MigrationEngine<S: MigrationStore> {
    config: MigrationConfig,
    store: S,
}

impl<S: MigrationStore> MigrationEngine<S> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, store: S) -> Self {
        Self { config, store }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the engine, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply every pending unit of `registry`.
    ///
    /// Holds the migration lock for the whole run. Each unit runs in its own
    /// transaction together with its log entry; the first failure rolls that
    /// unit back and ends the run.
    pub async fn run(&mut self, registry: &MigrationRegistry) -> MigrateResult<MigrationResult> {
        let start = Instant::now();
        self.acquire_lock().await?;

        let outcome = self.run_locked(registry).await;

        if let Err(e) = self.store.unlock().await {
            warn!(error = %e, "Failed to release migration lock");
        }

        let mut result = outcome?;
        result.duration_ms = start.elapsed().as_millis() as i64;
        info!(
            applied = result.applied_count,
            statements = result.statements_executed,
            duration_ms = result.duration_ms,
            "Migration run finished"
        );
        Ok(result)
    }

    async fn run_locked(&mut self, registry: &MigrationRegistry) -> MigrateResult<MigrationResult> {
        let mut result = MigrationResult::default();

        self.store.initialize().await?;
        let applied = self.applied_versions().await?;
        let resolver = registry.resolver();

        let pending: Vec<&MigrationUnit> = registry
            .list()
            .filter(|u| !applied.contains(&u.version()))
            .collect();

        if pending.is_empty() {
            debug!("Schema is up to date");
            return Ok(result);
        }

        info!(
            pending = pending.len(),
            dialect = self.store.dialect().name(),
            "Applying pending migrations"
        );

        for unit in pending {
            if self.config.dry_run {
                result.warnings.push(format!(
                    "[DRY RUN] Would apply: {}",
                    unit.full_name()
                ));
                continue;
            }

            let migration_start = Instant::now();
            let executed = self.apply_unit(unit, &resolver).await?;

            info!(
                version = unit.version(),
                name = %unit.name(),
                statements = executed,
                duration_ms = migration_start.elapsed().as_millis() as u64,
                "Applied migration"
            );

            result.applied_migrations.push(unit.version());
            result.applied_count += 1;
            result.statements_executed += executed;
        }

        Ok(result)
    }

    /// Apply a single unit in its own transaction.
    ///
    /// The unit deadline covers opening the transaction, the statements and
    /// the log write. Commit runs outside it. An expired deadline drops the
    /// open transaction, which rolls it back.
    async fn apply_unit(
        &mut self,
        unit: &MigrationUnit,
        resolver: &RenameResolver,
    ) -> MigrateResult<usize> {
        let statements = unit.statements(self.store.dialect(), resolver);
        let unit_timeout = self.config.unit_timeout;
        let deadline = unit_timeout.map(|t| tokio::time::Instant::now() + t);
        let timed_out = || MigrationError::UnitTimedOut {
            version: unit.version(),
            unit: unit.name().to_string(),
            timeout_ms: unit_timeout.map_or(0, |t| t.as_millis() as u64),
        };

        let mut tx = within(deadline, self.store.begin())
            .await
            .ok_or_else(timed_out)??;

        let staged = within(deadline, async {
            for statement in &statements {
                debug!(
                    version = unit.version(),
                    step = statement.step,
                    sql = %statement.sql,
                    "Executing statement"
                );
                tx.execute(statement).await.map_err(|e| {
                    MigrationError::step_failed(
                        unit.version(),
                        unit.name(),
                        statement.step,
                        statement.op.target(),
                        e,
                    )
                })?;
            }
            tx.record_applied(unit.version(), unit.name())
                .await
                .map_err(|e| MigrationError::log_write_failed(unit.version(), unit.name(), e))
        })
        .await;

        match staged {
            None => return Err(timed_out()),
            Some(Err(e)) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(version = unit.version(), error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
            Some(Ok(())) => {}
        }

        tx.commit()
            .await
            .map_err(|e| MigrationError::log_write_failed(unit.version(), unit.name(), e))?;

        Ok(statements.len())
    }

    async fn acquire_lock(&mut self) -> MigrateResult<()> {
        let deadline = self.config.lock_timeout.map(|t| Instant::now() + t);

        loop {
            let acquired = self
                .store
                .try_lock()
                .await
                .map_err(|e| MigrationError::lock_unavailable(e.to_string()))?;
            if acquired {
                debug!("Migration lock acquired");
                return Ok(());
            }

            match deadline {
                Some(deadline) if Instant::now() < deadline => {
                    debug!("Migration lock held elsewhere, retrying");
                    tokio::time::sleep(self.config.lock_retry_interval).await;
                }
                Some(_) => {
                    return Err(MigrationError::lock_unavailable(
                        "timed out waiting for another migration run",
                    ));
                }
                None => {
                    return Err(MigrationError::lock_unavailable(
                        "another migration run holds the lock",
                    ));
                }
            }
        }
    }

    async fn applied_versions(&mut self) -> MigrateResult<HashSet<i64>> {
        Ok(self
            .store
            .applied()
            .await?
            .into_iter()
            .map(|r| r.version)
            .collect())
    }

    /// Plan a run without applying any unit or taking the lock.
    ///
    /// Creates the log table if it is missing, so a fresh database can be
    /// planned.
    pub async fn plan(&mut self, registry: &MigrationRegistry) -> MigrateResult<MigrationPlan> {
        self.store.initialize().await?;
        let applied = self.applied_versions().await?;
        let resolver = registry.resolver();
        let dialect = self.store.dialect();

        let pending = registry
            .list()
            .filter(|u| !applied.contains(&u.version()))
            .map(|u| PlannedUnit {
                version: u.version(),
                name: u.name().to_string(),
                statements: u.statements(dialect, &resolver),
            })
            .collect();

        Ok(MigrationPlan { pending })
    }

    /// Get migration status.
    pub async fn status(&mut self, registry: &MigrationRegistry) -> MigrateResult<MigrationStatus> {
        self.store.initialize().await?;
        let applied = self.store.applied().await?;
        let applied_ids: HashSet<i64> = applied.iter().map(|r| r.version).collect();

        let pending = registry
            .list()
            .map(MigrationUnit::version)
            .filter(|v| !applied_ids.contains(v))
            .collect();

        let unknown = applied
            .iter()
            .map(|r| r.version)
            .filter(|v| registry.get(*v).is_none())
            .collect();

        Ok(MigrationStatus {
            applied,
            pending,
            unknown,
        })
    }
}

/// Run `fut` to completion, or give up at `deadline`.
async fn within<F: Future>(deadline: Option<tokio::time::Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}
