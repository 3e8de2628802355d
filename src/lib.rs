//! # Strata
//!
//! Versioned schema migrations for a Matrix account store, and the HTTP
//! routes that depend on the migrated schema.
//!
//! Strata provides:
//! - Idempotent, rename-aware schema changes grouped into versioned units
//! - A runner that applies each pending unit in its own transaction and
//!   records it in an applied-migration log, under a cross-process lock
//! - A PostgreSQL backend and an in-memory backend for tests
//! - The joined-rooms route over a membership storage contract
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::StrataConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::StrataError> {
//!     strata::logging::init();
//!
//!     let config = StrataConfig::from_file("strata.toml")?;
//!     let result = strata::run_migrations(&config).await?;
//!     println!("{}", result.summary());
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod logging;

/// Migration units, the registry and the runner.
pub mod migrate {
    pub use strata_migrate::*;
}

/// PostgreSQL backend.
pub mod postgres {
    pub use strata_postgres::*;
}

/// HTTP routes.
pub mod http {
    pub use strata_axum::*;
}

pub use config::StrataConfig;
pub use error::{StrataError, StrataResult};

use strata_migrate::{MigrationEngine, MigrationResult, deltas};
use tracing::info;

/// Bring the account store up to date.
///
/// Connects with `config`, applies every pending account migration, and
/// closes the connection.
pub async fn run_migrations(config: &StrataConfig) -> StrataResult<MigrationResult> {
    let registry = deltas::account_registry()?;
    let store = config.connect_store().await?;
    let mut engine = MigrationEngine::new(config.migration_config(), store);

    info!(
        known = registry.len(),
        latest = ?registry.latest_version(),
        "Migrating account store"
    );
    Ok(engine.run(&registry).await?)
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::StrataConfig;
    pub use crate::error::{StrataError, StrataResult};
    pub use strata_migrate::{
        MemoryStore, MigrationConfig, MigrationEngine, MigrationError, MigrationRegistry,
        MigrationUnit, deltas,
    };
    pub use strata_postgres::{PgConfig, PgMigrationStore};
}
