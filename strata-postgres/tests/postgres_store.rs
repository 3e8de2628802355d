//! Integration tests against a live PostgreSQL server.
//!
//! These tests run only when `DATABASE_URL` points at a disposable
//! database; otherwise they return immediately.

use strata_migrate::{
    MigrationConfig, MigrationEngine, MigrationError, MigrationStore, deltas,
};
use strata_postgres::{PgConfig, PgConnection, PgMigrationStore};

const ACCOUNT_TABLES: &[&str] = &[
    "account_accounts",
    "account_data",
    "account_profiles",
    "account_threepid",
    "device_devices",
    "open_id_tokens",
    "userapi_accounts",
    "userapi_account_datas",
    "userapi_profiles",
    "userapi_threepids",
    "userapi_devices",
    "userapi_openid_tokens",
    "userapi_pushers",
    "userapi_notifications",
];

fn config() -> Option<PgConfig> {
    match PgConfig::from_env() {
        Ok(config) => Some(config),
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping");
            None
        }
    }
}

async fn reset(config: &PgConfig, history_table: &str) {
    let conn = PgConnection::connect(config).await.expect("connect");
    let mut sql = format!("DROP TABLE IF EXISTS \"{history_table}\";");
    for table in ACCOUNT_TABLES {
        sql.push_str(&format!("DROP TABLE IF EXISTS \"{table}\" CASCADE;"));
    }
    conn.batch_execute(&sql).await.expect("reset");
}

async fn has_constraint(conn: &PgConnection, table: &str, constraint: &str) -> bool {
    let row = conn
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_constraint c JOIN pg_class t ON t.oid = c.conrelid \
             WHERE t.relname = $1 AND c.conname = $2)",
            &[&table, &constraint],
        )
        .await
        .expect("query");
    row.get(0)
}

async fn has_index(conn: &PgConnection, table: &str, index: &str) -> bool {
    let row = conn
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE tablename = $1 AND indexname = $2)",
            &[&table, &index],
        )
        .await
        .expect("query");
    row.get(0)
}

#[tokio::test]
async fn test_account_registry_applies_once() {
    let Some(config) = config() else { return };
    let history_table = "strata_test_migrations";
    reset(&config, history_table).await;

    let registry = deltas::account_registry().unwrap();
    let store = PgMigrationStore::connect(&config)
        .await
        .unwrap()
        .with_history_table(history_table)
        .unwrap();
    let mut engine = MigrationEngine::new(MigrationConfig::new(), store);

    let first = engine.run(&registry).await.unwrap();
    assert_eq!(first.applied_count, registry.len());

    let second = engine.run(&registry).await.unwrap();
    assert_eq!(second.applied_count, 0);
    assert_eq!(second.statements_executed, 0);

    let status = engine.status(&registry).await.unwrap();
    assert!(status.is_current());
    let versions: Vec<i64> = status.applied.iter().map(|r| r.version).collect();
    let expected: Vec<i64> = registry.list().map(|u| u.version()).collect();
    assert_eq!(versions, expected);

    let conn = PgConnection::connect(&config).await.unwrap();
    assert!(!has_constraint(&conn, "userapi_accounts", "account_accounts_pkey").await);
    assert!(has_index(&conn, "userapi_accounts", "userapi_accounts_idx").await);
}

#[tokio::test]
async fn test_lock_held_elsewhere_fails_fast() {
    let Some(config) = config() else { return };
    let key = 0x7465_7374_6c6f_636b;

    let mut holder = PgMigrationStore::connect(&config)
        .await
        .unwrap()
        .with_lock_key(key);
    assert!(holder.try_lock().await.unwrap());

    let contender = PgMigrationStore::connect(&config)
        .await
        .unwrap()
        .with_lock_key(key);
    let mut engine = MigrationEngine::new(MigrationConfig::new().fail_fast(), contender);
    let err = engine
        .run(&deltas::account_registry().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::LockUnavailable(_)));

    holder.unlock().await.unwrap();
}
