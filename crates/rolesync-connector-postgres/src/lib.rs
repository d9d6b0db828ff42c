//! # PostgreSQL Role Catalog
//!
//! PostgreSQL implementation of the rolesync role store traits.
//!
//! Managed accounts are login roles; entitlements are role memberships.
//! All statements for one phase run inside one transaction, and each
//! `DROP ROLE` runs inside its own savepoint so a role that still owns
//! objects does not abort the drops that follow it.
//!
//! ## Example
//!
//! ```ignore
//! use rolesync_connector_postgres::{PostgresConfig, PostgresConnector};
//! use rolesync_connector::prelude::*;
//!
//! let config = PostgresConfig::new("db.internal", "appdb", "rolesync")
//!     .with_password("secret");
//! let store = PostgresConnector::new().connect(&config).await?;
//! let mut tx = store.begin().await?;
//! tx.grant_role("readers", "nc_jdoe").await?;
//! tx.commit().await?;
//! store.close().await;
//! ```

pub mod catalog;
pub mod config;
pub mod sql;

// Re-exports
pub use catalog::{PgRoleStore, PgRoleTransaction, PostgresConnector};
pub use config::{PostgresConfig, SslMode};
