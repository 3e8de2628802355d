//! Scope account data by server name for virtual hosting.
//!
//! Adds a `server_name` column to every account table and drops the
//! primary keys that do not include it, so that the next unit can create
//! unique indexes that do. The primary key may still be named after the
//! table's legacy name, so that drop is rename-aware.

use crate::migration::MigrationUnit;
use crate::step::{ColumnDef, ColumnType, DefaultValue, DeltaStep, TableRef};

/// Version of this unit.
pub const VERSION: i64 = 2022110411000000;

/// Tables that gain a `server_name` column.
pub const SERVER_NAME_TABLES: &[&str] = &[
    "userapi_accounts",
    "userapi_account_datas",
    "userapi_devices",
    "userapi_notifications",
    "userapi_openid_tokens",
    "userapi_profiles",
    "userapi_pushers",
    "userapi_threepids",
];

/// Tables whose primary key is replaced by a unique index.
pub const DROP_PRIMARY_KEY_TABLES: &[&str] = &[
    "userapi_accounts",
    "userapi_account_datas",
    "userapi_profiles",
];

/// The column added by this unit.
pub fn server_name_column() -> ColumnDef {
    ColumnDef::new("server_name", ColumnType::Text)
        .not_null()
        .default_value(DefaultValue::Text(String::new()))
}

/// Build the unit.
pub fn unit() -> MigrationUnit {
    MigrationUnit::new(VERSION, "server_names")
        .step(DeltaStep::add_column(
            SERVER_NAME_TABLES.iter().copied(),
            server_name_column(),
        ))
        .step(DeltaStep::drop_primary_key(
            DROP_PRIMARY_KEY_TABLES
                .iter()
                .map(|t| TableRef::rename_aware(*t)),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rename::RenameResolver;
    use crate::sql::PostgresDialect;

    #[test]
    fn test_adds_column_to_every_table() {
        let statements = unit().statements(&PostgresDialect, &RenameResolver::new());
        let adds: Vec<_> = statements.iter().filter(|s| s.step == 0).collect();
        assert_eq!(adds.len(), SERVER_NAME_TABLES.len());
        assert!(adds[0].sql.contains("\"userapi_accounts\" ADD COLUMN IF NOT EXISTS \"server_name\" TEXT NOT NULL DEFAULT ''"));
    }

    #[test]
    fn test_primary_key_drop_uses_legacy_names() {
        let registry = crate::deltas::account_registry().unwrap();
        let statements = unit().statements(&PostgresDialect, &registry.resolver());
        let drops: Vec<&str> = statements
            .iter()
            .filter(|s| s.step == 1)
            .map(|s| s.sql.as_str())
            .collect();

        // Two candidate tables times two candidate key names, per table.
        assert_eq!(drops.len(), DROP_PRIMARY_KEY_TABLES.len() * 4);
        assert!(drops.contains(
            &"ALTER TABLE IF EXISTS \"userapi_account_datas\" DROP CONSTRAINT IF EXISTS \"account_data_pkey\";"
        ));
        assert!(drops.contains(
            &"ALTER TABLE IF EXISTS \"account_profiles\" DROP CONSTRAINT IF EXISTS \"account_profiles_pkey\";"
        ));
    }
}
