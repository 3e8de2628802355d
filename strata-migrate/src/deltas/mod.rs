//! Schema history of the account store.
//!
//! Each submodule defines one migration unit. New revisions get a new
//! module with a higher version and are appended to [`units`]; existing
//! units are never edited once released.

pub mod initial_account_tables;
pub mod push_tables;
pub mod rename_account_tables;
pub mod server_name_indexes;
pub mod server_names;

use crate::error::MigrateResult;
use crate::migration::MigrationUnit;
use crate::registry::MigrationRegistry;

/// Every account-store migration unit, in release order.
pub fn units() -> Vec<MigrationUnit> {
    vec![
        initial_account_tables::unit(),
        push_tables::unit(),
        rename_account_tables::unit(),
        server_names::unit(),
        server_name_indexes::unit(),
    ]
}

/// The registry of account-store migrations.
pub fn account_registry() -> MigrateResult<MigrationRegistry> {
    let mut registry = MigrationRegistry::new();
    registry.register_all(units())?;
    Ok(registry)
}
