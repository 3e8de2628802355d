//! Historical name resolution.
//!
//! A database created before a rename still carries the old names, and a
//! table rename never renames the constraints that were derived from the
//! old table name. Rename-aware steps therefore target every candidate
//! name, each attempt guarded by an existence check.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::quote::Identifier;

/// Maps the current name of an entity to the names it used to have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameMapping {
    /// The current (post-rename) name.
    pub logical_name: Identifier,
    /// Previous names, most recent first.
    pub historical_aliases: Vec<Identifier>,
}

impl RenameMapping {
    /// Create a mapping from the current name to its most recent previous
    /// name.
    pub fn new(logical_name: impl Into<Identifier>, previous: impl Into<Identifier>) -> Self {
        Self {
            logical_name: logical_name.into(),
            historical_aliases: vec![previous.into()],
        }
    }

    /// Add a name older than every alias added so far.
    pub fn with_alias(mut self, alias: impl Into<Identifier>) -> Self {
        self.historical_aliases.push(alias.into());
        self
    }
}

/// Resolves logical names to the physical names they may have in an
/// unmigrated database.
#[derive(Debug, Clone, Default)]
pub struct RenameResolver {
    aliases: IndexMap<Identifier, Vec<Identifier>>,
}

impl RenameResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver from a set of mappings. Aliases for the same
    /// logical name are merged in registration order.
    pub fn from_mappings<'a>(mappings: impl IntoIterator<Item = &'a RenameMapping>) -> Self {
        let mut resolver = Self::new();
        for mapping in mappings {
            resolver.add(mapping);
        }
        resolver
    }

    /// Add a mapping.
    pub fn add(&mut self, mapping: &RenameMapping) {
        let entry = self.aliases.entry(mapping.logical_name.clone()).or_default();
        for alias in &mapping.historical_aliases {
            if alias != &mapping.logical_name && !entry.contains(alias) {
                entry.push(alias.clone());
            }
        }
    }

    /// Candidate physical names for `logical`, current name first.
    pub fn aliases_of(&self, logical: &Identifier) -> Vec<Identifier> {
        let mut out = vec![logical.clone()];
        if let Some(history) = self.aliases.get(logical) {
            out.extend(history.iter().cloned());
        }
        out
    }

    /// Whether any aliases are registered for `logical`.
    pub fn has_aliases(&self, logical: &Identifier) -> bool {
        self.aliases.get(logical).is_some_and(|a| !a.is_empty())
    }

    /// Number of logical names with aliases.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether no mappings are registered.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
