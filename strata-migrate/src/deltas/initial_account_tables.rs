//! The original account tables, under their legacy names.

use crate::migration::MigrationUnit;
use crate::step::{ColumnDef, ColumnType, DefaultValue, DeltaStep};

/// Version of this unit.
pub const VERSION: i64 = 2017100200000000;

fn text(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Text)
}

fn bigint(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::BigInt)
}

fn table(name: &str, columns: Vec<ColumnDef>, primary_key: &[&str]) -> DeltaStep {
    DeltaStep::CreateTableIfMissing {
        table: name.into(),
        columns,
        primary_key: primary_key.iter().map(|c| (*c).into()).collect(),
    }
}

/// Build the unit.
pub fn unit() -> MigrationUnit {
    MigrationUnit::new(VERSION, "initial_account_tables")
        .step(table(
            "account_accounts",
            vec![
                text("localpart").not_null(),
                bigint("created_ts").not_null(),
                text("password_hash"),
                text("appservice_id"),
                ColumnDef::new("is_deactivated", ColumnType::Boolean)
                    .default_value(DefaultValue::Boolean(false)),
                ColumnDef::new("account_type", ColumnType::SmallInt)
                    .not_null()
                    .default_value(DefaultValue::Integer(1)),
            ],
            &["localpart"],
        ))
        .step(table(
            "account_data",
            vec![
                text("localpart").not_null(),
                text("room_id").not_null(),
                text("type").not_null(),
                text("content").not_null(),
            ],
            &["localpart", "room_id", "type"],
        ))
        .step(table(
            "account_profiles",
            vec![
                text("localpart").not_null(),
                text("display_name"),
                text("avatar_url"),
            ],
            &["localpart"],
        ))
        .step(table(
            "account_threepid",
            vec![
                text("threepid").not_null(),
                text("medium")
                    .not_null()
                    .default_value(DefaultValue::Text("email".to_string())),
                text("localpart").not_null(),
            ],
            &["threepid", "medium"],
        ))
        .step(table(
            "device_devices",
            vec![
                text("access_token").not_null(),
                bigint("session_id").not_null(),
                text("device_id").not_null(),
                text("localpart").not_null(),
                bigint("created_ts").not_null(),
                text("display_name"),
                bigint("last_seen_ts").not_null(),
                text("ip"),
                text("user_agent"),
            ],
            &["access_token"],
        ))
        .step(table(
            "open_id_tokens",
            vec![
                text("token").not_null(),
                text("localpart").not_null(),
                bigint("token_expires_at_ms").not_null(),
            ],
            &["token"],
        ))
}
