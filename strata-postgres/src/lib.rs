//! # strata-postgres
//!
//! PostgreSQL backend for Strata schema migrations.
//!
//! This crate provides:
//! - Connection configuration from a URL, the environment, or a builder
//! - A [`MigrationStore`](strata_migrate::MigrationStore) that runs every
//!   migration unit in its own transaction on a dedicated session
//! - A session-level advisory lock so that only one process migrates at a
//!   time
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine, deltas};
//! use strata_postgres::{PgConfig, PgMigrationStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PgConfig::from_env()?;
//!     let store = PgMigrationStore::connect(&config).await?;
//!
//!     let mut engine = MigrationEngine::new(MigrationConfig::new(), store);
//!     let result = engine.run(&deltas::account_registry()?).await?;
//!     println!("{}", result.summary());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod store;

pub use config::{DATABASE_URL_ENV, PgConfig, PgConfigBuilder, SslMode};
pub use connection::{PgConnection, PgTransaction};
pub use error::{PgError, PgResult};
pub use store::{DEFAULT_LOCK_KEY, PgMigrationStore, PgMigrationTransaction};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{PgConfig, PgConfigBuilder};
    pub use crate::error::{PgError, PgResult};
    pub use crate::store::PgMigrationStore;
}
