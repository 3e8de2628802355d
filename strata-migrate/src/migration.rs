//! Migration units.

use crate::error::{MigrateResult, MigrationError};
use crate::rename::{RenameMapping, RenameResolver};
use crate::sql::{Dialect, GuardedStatement};
use crate::step::DeltaStep;

/// One schema revision: an ordered batch of delta steps under a version.
///
/// Units are built once, registered, and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    version: i64,
    name: String,
    steps: Vec<DeltaStep>,
    renames: Vec<RenameMapping>,
}

impl MigrationUnit {
    /// Create an empty unit.
    pub fn new(version: i64, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            steps: Vec::new(),
            renames: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: DeltaStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = DeltaStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Register a rename introduced by this unit.
    pub fn rename(mut self, mapping: RenameMapping) -> Self {
        self.renames.push(mapping);
        self
    }

    /// Version token.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps, in application order.
    pub fn delta_steps(&self) -> &[DeltaStep] {
        &self.steps
    }

    /// Renames introduced by this unit.
    pub fn renames(&self) -> &[RenameMapping] {
        &self.renames
    }

    /// The full migration name (`version_name`).
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }

    /// Check the unit can be registered.
    pub fn validate(&self) -> MigrateResult<()> {
        if self.steps.is_empty() {
            return Err(MigrationError::EmptyMigration {
                version: self.version,
                name: self.name.clone(),
            });
        }
        for step in &self.steps {
            step.validate()?;
        }
        for mapping in &self.renames {
            mapping.logical_name.validate()?;
            for alias in &mapping.historical_aliases {
                alias.validate()?;
            }
        }
        Ok(())
    }

    /// Every statement this unit executes, in order.
    pub fn statements(
        &self,
        dialect: &dyn Dialect,
        resolver: &RenameResolver,
    ) -> Vec<GuardedStatement> {
        self.steps
            .iter()
            .enumerate()
            .flat_map(|(i, step)| step.render(i, dialect, resolver))
            .collect()
    }
}
