//! Integration tests for the migration runner.
//!
//! These run the built-in account registry against the in-memory store
//! and check the runner's guarantees: idempotence, ordering, failure
//! isolation, locking, timeouts and dry runs.

use std::time::Duration;

use pretty_assertions::assert_eq;
use strata::migrate::deltas::{self, server_name_indexes, server_names};
use strata::migrate::{
    GuardedOp, MemoryStore, MigrationConfig, MigrationEngine, MigrationError, MigrationRegistry,
    MigrationStore,
};

fn registry() -> MigrationRegistry {
    deltas::account_registry().expect("account registry")
}

fn engine(store: &MemoryStore) -> MigrationEngine<MemoryStore> {
    MigrationEngine::new(MigrationConfig::new().fail_fast(), store.clone())
}

fn versions(store: &MemoryStore) -> Vec<i64> {
    store.log().iter().map(|r| r.version).collect()
}

fn fails_on_table(table: &'static str) -> impl Fn(&GuardedOp) -> bool + Send + 'static {
    move |op| matches!(op, GuardedOp::AddColumn { table: t, .. } if t.as_str() == table)
}

#[tokio::test]
async fn test_fresh_database_reaches_latest_schema() {
    let store = MemoryStore::new();
    let registry = registry();

    let result = engine(&store).run(&registry).await.unwrap();

    assert_eq!(result.applied_count, registry.len());
    assert_eq!(
        result.applied_migrations,
        registry.list().map(|u| u.version()).collect::<Vec<_>>()
    );
    assert!(store.is_initialized());
    assert!(!store.is_locked());

    let schema = store.schema();
    for table in server_names::SERVER_NAME_TABLES {
        let state = schema.table(table).unwrap_or_else(|| panic!("{table} missing"));
        assert!(state.has_column("server_name"), "{table} lacks server_name");
    }
    for table in server_names::DROP_PRIMARY_KEY_TABLES {
        assert!(schema.table(table).unwrap().constraints.is_empty());
    }
    assert!(!schema.has_table("account_accounts"));
    assert!(
        schema
            .table("userapi_devices")
            .unwrap()
            .has_constraint("device_devices_pkey")
    );
    assert_eq!(
        schema.indexes.get("userapi_accounts_idx").map(String::as_str),
        Some("userapi_accounts")
    );
}

#[tokio::test]
async fn test_rerun_is_a_no_op() {
    let store = MemoryStore::new();
    let registry = registry();
    engine(&store).run(&registry).await.unwrap();

    let writes = store.log_writes();
    let executed = store.executed().len();
    let schema = store.schema();

    let result = engine(&store).run(&registry).await.unwrap();

    assert_eq!(result.applied_count, 0);
    assert_eq!(result.statements_executed, 0);
    assert!(!result.has_changes());
    assert_eq!(store.log_writes(), writes);
    assert_eq!(store.executed().len(), executed);
    assert_eq!(store.schema(), schema);
}

#[tokio::test]
async fn test_applied_at_follows_version_order() {
    let store = MemoryStore::new();
    engine(&store).run(&registry()).await.unwrap();

    let log = store.log();
    assert_eq!(log.len(), registry().len());
    for pair in log.windows(2) {
        assert!(pair[0].version < pair[1].version);
        assert!(pair[0].applied_at < pair[1].applied_at);
    }
}

#[tokio::test]
async fn test_failed_unit_is_rolled_back_and_retried() {
    let store = MemoryStore::new();
    store.fail_when(fails_on_table("userapi_pushers"));
    let registry = registry();

    let err = engine(&store).run(&registry).await.unwrap_err();
    match &err {
        MigrationError::StepExecutionFailed {
            version,
            unit,
            step,
            target,
            ..
        } => {
            assert_eq!(*version, server_names::VERSION);
            assert_eq!(unit, "server_names");
            assert_eq!(*step, 0);
            assert_eq!(target, "column \"server_name\" on \"userapi_pushers\"");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_fatal());

    // Earlier units stay applied; the failing unit left nothing behind.
    let applied = versions(&store);
    assert!(applied.iter().all(|v| *v < server_names::VERSION));
    assert_eq!(applied.len(), registry.len() - 2);
    let schema = store.schema();
    assert!(!schema.table("userapi_accounts").unwrap().has_column("server_name"));
    assert!(!store.is_locked());

    store.clear_failures();
    let result = engine(&store).run(&registry).await.unwrap();
    assert_eq!(
        result.applied_migrations,
        vec![server_names::VERSION, server_name_indexes::VERSION]
    );
    assert_eq!(versions(&store).len(), registry.len());
}

#[tokio::test]
async fn test_retry_after_partial_non_transactional_ddl() {
    let store = MemoryStore::new().non_transactional_ddl();
    store.fail_when(fails_on_table("userapi_pushers"));
    let registry = registry();

    assert!(engine(&store).run(&registry).await.is_err());

    // The DDL before the failure survived, but the unit is not logged.
    let schema = store.schema();
    assert!(schema.table("userapi_accounts").unwrap().has_column("server_name"));
    assert!(!versions(&store).contains(&server_names::VERSION));

    store.clear_failures();
    engine(&store).run(&registry).await.unwrap();

    let schema = store.schema();
    let accounts = schema.table("userapi_accounts").unwrap();
    assert_eq!(
        accounts.columns.iter().filter(|c| *c == "server_name").count(),
        1
    );
    assert!(schema.table("userapi_pushers").unwrap().has_column("server_name"));
    assert_eq!(versions(&store).len(), registry.len());
}

#[tokio::test]
async fn test_log_write_failure_rolls_back_unit() {
    let store = MemoryStore::new();
    store.fail_log_writes(true);

    let err = engine(&store).run(&registry()).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::LogWriteFailed { version, .. } if version == deltas::initial_account_tables::VERSION
    ));
    assert!(store.log().is_empty());
    assert!(store.schema().tables.is_empty());
}

#[tokio::test]
async fn test_lock_held_elsewhere_fails_fast() {
    let store = MemoryStore::new();
    let mut holder = store.clone();
    assert!(holder.try_lock().await.unwrap());

    let err = engine(&store).run(&registry()).await.unwrap_err();

    assert!(matches!(err, MigrationError::LockUnavailable(_)));
    assert!(err.is_retryable());
    assert!(!store.is_initialized());
    assert!(store.log().is_empty());
    assert!(store.executed().is_empty());

    holder.unlock().await.unwrap();
    engine(&store).run(&registry()).await.unwrap();
}

#[tokio::test]
async fn test_lock_wait_times_out() {
    let store = MemoryStore::new();
    let mut holder = store.clone();
    assert!(holder.try_lock().await.unwrap());

    let config = MigrationConfig::new()
        .lock_timeout(Duration::from_millis(50))
        .lock_retry_interval(Duration::from_millis(10));
    let mut engine = MigrationEngine::new(config, store.clone());

    let err = engine.run(&registry()).await.unwrap_err();
    assert!(matches!(err, MigrationError::LockUnavailable(_)));
    assert!(store.log().is_empty());
}

#[tokio::test]
async fn test_unit_timeout_rolls_back() {
    let store = MemoryStore::new().statement_delay(Duration::from_millis(50));
    let config = MigrationConfig::new()
        .fail_fast()
        .unit_timeout(Duration::from_millis(10));
    let mut engine = MigrationEngine::new(config, store.clone());

    let err = engine.run(&registry()).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::UnitTimedOut { version, timeout_ms: 10, .. }
            if version == deltas::initial_account_tables::VERSION
    ));
    assert!(store.log().is_empty());
    assert!(store.schema().tables.is_empty());
    assert!(!store.is_locked());
}

#[tokio::test]
async fn test_slow_commit_is_not_reported_as_timeout() {
    let store = MemoryStore::new().commit_delay(Duration::from_millis(100));
    let registry = registry();
    let config = MigrationConfig::new()
        .fail_fast()
        .unit_timeout(Duration::from_millis(20));
    let mut engine = MigrationEngine::new(config, store.clone());

    let result = engine.run(&registry).await.unwrap();

    assert_eq!(result.applied_count, registry.len());
    assert_eq!(versions(&store), result.applied_migrations);
    assert!(!store.is_locked());
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let store = MemoryStore::new();
    let registry = registry();
    let mut engine =
        MigrationEngine::new(MigrationConfig::new().fail_fast().dry_run(true), store.clone());

    let result = engine.run(&registry).await.unwrap();

    assert_eq!(result.applied_count, 0);
    assert_eq!(result.warnings.len(), registry.len());
    assert!(result.warnings[0].starts_with("[DRY RUN] Would apply: 2017100200000000_"));
    assert!(store.log().is_empty());
    assert!(store.executed().is_empty());
    assert!(store.schema().tables.is_empty());
}

#[tokio::test]
async fn test_plan_lists_pending_statements() {
    let store = MemoryStore::new();
    let registry = registry();
    store.baseline(deltas::initial_account_tables::VERSION, "initial_account_tables");
    store.baseline(deltas::push_tables::VERSION, "push_tables");
    store.baseline(deltas::rename_account_tables::VERSION, "rename_account_tables");

    let plan = engine(&store).plan(&registry).await.unwrap();

    let pending: Vec<i64> = plan.pending.iter().map(|u| u.version).collect();
    assert_eq!(pending, vec![server_names::VERSION, server_name_indexes::VERSION]);
    // 8 column additions, 3 tables x 2 names x 2 key names, 3 indexes.
    assert_eq!(plan.statement_count(), 8 + 12 + 3);
    let sql = plan.to_sql();
    assert!(sql.starts_with("-- 2022110411000000 server_names\n"));
    assert!(sql.contains(
        "ALTER TABLE IF EXISTS \"userapi_profiles\" DROP CONSTRAINT IF EXISTS \"account_profiles_pkey\";"
    ));
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_plan_on_fresh_database_only_creates_log() {
    let store = MemoryStore::new();
    let registry = registry();

    let plan = engine(&store).plan(&registry).await.unwrap();

    assert_eq!(plan.pending.len(), registry.len());
    assert!(store.is_initialized());
    assert!(store.log().is_empty());
    assert!(store.executed().is_empty());
    assert!(store.schema().tables.is_empty());
    assert!(!store.is_locked());
}

#[tokio::test]
async fn test_status_reports_unknown_versions() {
    let store = MemoryStore::new();
    let registry = registry();
    engine(&store).run(&registry).await.unwrap();
    store.baseline(1, "from_a_newer_release");

    let status = engine(&store).status(&registry).await.unwrap();

    assert!(status.is_current());
    assert_eq!(status.unknown, vec![1]);
    assert_eq!(status.applied.len(), registry.len() + 1);
}
