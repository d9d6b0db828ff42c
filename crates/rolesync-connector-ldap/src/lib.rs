//! # LDAP Directory
//!
//! LDAP/Active Directory implementation of the rolesync `Directory` trait.
//!
//! Only two operations are needed for group resolution: find a group by
//! exact name under the group search base, and read one entry's object
//! classes, member references and identifying attribute.
//!
//! ## Features
//!
//! - LDAPS and STARTTLS, with a custom CA or (explicitly) no verification
//! - Configurable group class, name, member and identifier attributes
//! - Per-operation timeouts
//!
//! ## Example
//!
//! ```ignore
//! use rolesync_connector_ldap::{LdapConfig, LdapDirectory};
//! use rolesync_connector::prelude::*;
//!
//! let config = LdapConfig::new(
//!     "ldap.example.com",
//!     "dc=example,dc=com",
//!     "cn=sync,dc=example,dc=com",
//! )
//! .with_password("secret")
//! .with_tls(TlsConfig::default().with_ca_cert("/etc/ssl/ldap-ca.pem"));
//!
//! let directory = LdapDirectory::new(config)?;
//! directory.connect().await?;
//! let group = directory.find_group("db_admins").await?;
//! ```

pub mod config;
pub mod directory;

// Re-exports
pub use config::{LdapConfig, LdapSchema};
pub use directory::LdapDirectory;
