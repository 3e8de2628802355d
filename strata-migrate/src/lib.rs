//! # strata-migrate
//!
//! Versioned schema migrations for the Strata account store.
//!
//! This crate provides:
//! - Safe quoting of identifiers embedded in generated DDL
//! - Idempotent, guarded delta steps (`IF EXISTS` / `IF NOT EXISTS`)
//! - Rename-aware targeting, so a step finds an object under any name it
//!   has had
//! - A registry of migration units ordered by version
//! - An applied-migration log and a runner that applies each pending unit
//!   in its own transaction, under a cross-process lock
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │  Registry    │────▶│  Runner        │────▶│ Guarded SQL      │
//! │ (units)      │     │ (diff vs log)  │     │ (per unit, in tx)│
//! └──────────────┘     └────────────────┘     └──────────────────┘
//!        │                     │                       │
//!        ▼                     ▼                       ▼
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ Rename       │     │ Migration lock │     │ Log entry        │
//! │ resolver     │     │                │     │ (same tx)        │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//! ```
//!
//! Applied units are tracked in the `strata_schema_migrations` table. The
//! log is the only record of what has run: a unit whose version is logged is
//! never executed again.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine, deltas};
//!
//! async fn migrate(store: impl strata_migrate::MigrationStore) -> strata_migrate::MigrateResult<()> {
//!     let registry = deltas::account_registry()?;
//!     let mut engine = MigrationEngine::new(MigrationConfig::new(), store);
//!
//!     let plan = engine.plan(&registry).await?;
//!     println!("{}", plan.summary());
//!
//!     let result = engine.run(&registry).await?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Writing a unit
//!
//! ```rust
//! use strata_migrate::{ColumnDef, ColumnType, DefaultValue, DeltaStep, MigrationUnit, TableRef};
//!
//! let unit = MigrationUnit::new(2022110411000000, "server_names")
//!     .step(DeltaStep::add_column(
//!         ["userapi_accounts", "userapi_devices"],
//!         ColumnDef::new("server_name", ColumnType::Text)
//!             .not_null()
//!             .default_value(DefaultValue::Text(String::new())),
//!     ))
//!     .step(DeltaStep::drop_primary_key([TableRef::rename_aware("userapi_accounts")]));
//!
//! assert!(unit.validate().is_ok());
//! ```

pub mod deltas;
pub mod engine;
pub mod error;
pub mod history;
pub mod memory;
pub mod migration;
pub mod quote;
pub mod registry;
pub mod rename;
pub mod sql;
pub mod step;

// Re-exports
pub use engine::{
    MigrationConfig, MigrationEngine, MigrationPlan, MigrationResult, MigrationStatus, PlannedUnit,
};
pub use error::{MigrateResult, MigrationError};
pub use history::{
    DEFAULT_HISTORY_TABLE, MigrationRecord, MigrationStore, MigrationTransaction,
};
pub use memory::{MemoryStore, SchemaState, TableState};
pub use migration::MigrationUnit;
pub use quote::{Identifier, MAX_IDENTIFIER_LEN, quote_identifier, quote_literal};
pub use registry::MigrationRegistry;
pub use rename::{RenameMapping, RenameResolver};
pub use sql::{Dialect, GuardedOp, GuardedStatement, PostgresDialect};
pub use step::{ColumnDef, ColumnType, ConstraintRef, DefaultValue, DeltaStep, IndexDef, TableRef};
