//! Pusher and notification tables. These were introduced with their
//! current names and have no legacy aliases.

use crate::migration::MigrationUnit;
use crate::step::{ColumnDef, ColumnType, DefaultValue, DeltaStep};

/// Version of this unit.
pub const VERSION: i64 = 2021033000000000;

/// Build the unit.
pub fn unit() -> MigrationUnit {
    let text = |name: &str| ColumnDef::new(name, ColumnType::Text);
    let bigint = |name: &str| ColumnDef::new(name, ColumnType::BigInt);

    MigrationUnit::new(VERSION, "push_tables")
        .step(DeltaStep::CreateTableIfMissing {
            table: "userapi_pushers".into(),
            columns: vec![
                text("localpart").not_null(),
                bigint("session_id"),
                text("pushkey").not_null(),
                text("kind").not_null(),
                text("app_id").not_null(),
                text("app_display_name").not_null(),
                text("device_display_name").not_null(),
                text("profile_tag"),
                text("lang").not_null(),
                text("data").not_null(),
            ],
            primary_key: Vec::new(),
        })
        .step(DeltaStep::CreateTableIfMissing {
            table: "userapi_notifications".into(),
            columns: vec![
                text("localpart").not_null(),
                text("room_id").not_null(),
                text("event_id").not_null(),
                bigint("stream_pos").not_null(),
                bigint("ts_ms").not_null(),
                ColumnDef::new("highlight", ColumnType::Boolean).not_null(),
                text("notification_json").not_null(),
                ColumnDef::new("read", ColumnType::Boolean)
                    .not_null()
                    .default_value(DefaultValue::Boolean(false)),
            ],
            primary_key: Vec::new(),
        })
}
