//! Move the legacy account tables into the `userapi_` namespace.
//!
//! PostgreSQL keeps constraint names across a table rename, so a renamed
//! table still carries e.g. `account_accounts_pkey`. The mappings
//! registered here let later units find those names.

use crate::migration::MigrationUnit;
use crate::rename::RenameMapping;
use crate::step::DeltaStep;

/// Version of this unit.
pub const VERSION: i64 = 2022021013023800;

/// Legacy name → current name.
pub const RENAMES: &[(&str, &str)] = &[
    ("account_accounts", "userapi_accounts"),
    ("account_data", "userapi_account_datas"),
    ("account_profiles", "userapi_profiles"),
    ("account_threepid", "userapi_threepids"),
    ("device_devices", "userapi_devices"),
    ("open_id_tokens", "userapi_openid_tokens"),
];

/// Build the unit.
pub fn unit() -> MigrationUnit {
    RENAMES
        .iter()
        .fold(
            MigrationUnit::new(VERSION, "rename_account_tables"),
            |unit, (from, to)| {
                unit.step(DeltaStep::RenameTableIfPresent {
                    from: (*from).into(),
                    to: (*to).into(),
                })
                .rename(RenameMapping::new(*to, *from))
            },
        )
}
