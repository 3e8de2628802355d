//! Unique indexes that include the server name, replacing the primary
//! keys dropped by the previous unit.

use crate::migration::MigrationUnit;
use crate::step::{DeltaStep, IndexDef};

/// Version of this unit.
pub const VERSION: i64 = 2022110411000001;

/// Build the unit.
pub fn unit() -> MigrationUnit {
    MigrationUnit::new(VERSION, "server_name_indexes").steps([
        DeltaStep::CreateIndexIfMissing(IndexDef::unique(
            "userapi_accounts_idx",
            "userapi_accounts",
            ["localpart", "server_name"],
        )),
        DeltaStep::CreateIndexIfMissing(IndexDef::unique(
            "userapi_account_datas_idx",
            "userapi_account_datas",
            ["localpart", "server_name", "room_id", "type"],
        )),
        DeltaStep::CreateIndexIfMissing(IndexDef::unique(
            "userapi_profiles_idx",
            "userapi_profiles",
            ["localpart", "server_name"],
        )),
    ])
}
