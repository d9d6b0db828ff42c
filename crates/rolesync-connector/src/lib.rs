//! # Connector Framework
//!
//! Core abstractions for connecting rolesync to a directory service and to a
//! relational role catalog.
//!
//! The reconciliation core never talks to LDAP or PostgreSQL directly. It is
//! written against the traits in this crate:
//!
//! - [`Directory`] - read-only lookup of groups and member entries
//! - [`RoleStoreConnector`] - opens a [`RoleStore`] for one database
//! - [`RoleStore`] / [`RoleTransaction`] - role existence, creation, grants,
//!   revokes and drops, always inside a transaction
//!
//! ## Crate Organization
//!
//! - [`ids`] - Type-safe identifiers (`EntryRef`)
//! - [`error`] - `DirectoryError` and `CatalogError` with transient/permanent classification
//! - [`config`] - `ConnectorConfig` trait and shared connection/TLS settings
//! - [`traits`] - Directory and role store capability traits

pub mod config;
pub mod error;
pub mod ids;
pub mod traits;

pub use config::{ConnectionSettings, ConnectorConfig, TlsConfig, REDACTED};
pub use error::{CatalogError, CatalogResult, DirectoryError, DirectoryResult};
pub use ids::EntryRef;
pub use traits::{Directory, DirectoryEntry, RoleStore, RoleStoreConnector, RoleTransaction};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ConnectionSettings, ConnectorConfig, TlsConfig};
    pub use crate::error::{CatalogError, CatalogResult, DirectoryError, DirectoryResult};
    pub use crate::ids::EntryRef;
    pub use crate::traits::{
        Directory, DirectoryEntry, RoleStore, RoleStoreConnector, RoleTransaction,
    };
}
