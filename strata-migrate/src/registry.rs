//! The catalog of known migration units.

use std::collections::BTreeMap;

use crate::error::{MigrateResult, MigrationError};
use crate::migration::MigrationUnit;
use crate::rename::RenameResolver;

/// Ordered catalog of every migration unit in the system's history.
///
/// Populated once at startup; the ascending version order produced by
/// [`list`](Self::list) is the only order the runner trusts.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    units: BTreeMap<i64, MigrationUnit>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit.
    ///
    /// Fails with [`MigrationError::DuplicateVersion`] if the version is
    /// already taken, or if the unit does not validate.
    pub fn register(&mut self, unit: MigrationUnit) -> MigrateResult<()> {
        if let Some(existing) = self.units.get(&unit.version()) {
            return Err(MigrationError::DuplicateVersion {
                version: unit.version(),
                existing: existing.name().to_string(),
                duplicate: unit.name().to_string(),
            });
        }
        unit.validate()?;
        self.units.insert(unit.version(), unit);
        Ok(())
    }

    /// Register several units, stopping at the first failure.
    pub fn register_all(
        &mut self,
        units: impl IntoIterator<Item = MigrationUnit>,
    ) -> MigrateResult<()> {
        units.into_iter().try_for_each(|unit| self.register(unit))
    }

    /// Every unit, ascending by version.
    pub fn list(&self) -> impl Iterator<Item = &MigrationUnit> {
        self.units.values()
    }

    /// Look up a unit by version.
    pub fn get(&self, version: i64) -> Option<&MigrationUnit> {
        self.units.get(&version)
    }

    /// The highest registered version.
    pub fn latest_version(&self) -> Option<i64> {
        self.units.keys().next_back().copied()
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// A resolver covering every rename registered by any unit.
    pub fn resolver(&self) -> RenameResolver {
        RenameResolver::from_mappings(self.units.values().flat_map(|u| u.renames()))
    }
}
