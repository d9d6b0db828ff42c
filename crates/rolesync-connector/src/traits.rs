//! Connector Framework traits
//!
//! Capability traits for the two systems a sync pass talks to: a read-only
//! directory and a transactional role catalog.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogResult, DirectoryResult};
use crate::ids::EntryRef;

/// Attributes of one directory entry that matter for group resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Reference the entry was fetched by.
    pub reference: EntryRef,
    /// Values of `objectClass`.
    #[serde(default)]
    pub object_classes: Vec<String>,
    /// Values of the member attribute (empty for non-groups).
    #[serde(default)]
    pub member_refs: Vec<EntryRef>,
    /// Value of the identifying attribute (e.g. `uid`), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl DirectoryEntry {
    /// Create an entry with no attributes.
    pub fn new(reference: impl Into<EntryRef>) -> Self {
        Self {
            reference: reference.into(),
            object_classes: Vec::new(),
            member_refs: Vec::new(),
            identifier: None,
        }
    }

    /// Add an object class.
    #[must_use]
    pub fn with_object_class(mut self, class: impl Into<String>) -> Self {
        self.object_classes.push(class.into());
        self
    }

    /// Add a member reference.
    #[must_use]
    pub fn with_member(mut self, member: impl Into<EntryRef>) -> Self {
        self.member_refs.push(member.into());
        self
    }

    /// Set the identifying attribute value.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Check whether the entry carries any of the given object classes.
    ///
    /// Object class names are case-insensitive in LDAP.
    #[must_use]
    pub fn has_any_object_class<S: AsRef<str>>(&self, classes: &[S]) -> bool {
        self.object_classes
            .iter()
            .any(|oc| classes.iter().any(|c| oc.eq_ignore_ascii_case(c.as_ref())))
    }
}

/// Read-only access to a directory service.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Find the reference of the single group whose name matches exactly.
    ///
    /// Fails with `GroupNotFound` when nothing matches and `AmbiguousGroup`
    /// when more than one entry does.
    async fn find_group(&self, name: &str) -> DirectoryResult<EntryRef>;

    /// Fetch one entry by reference.
    ///
    /// Returns `Ok(None)` when the entry does not exist, so a dangling member
    /// reference can be skipped without treating it as an outage.
    async fn entry(&self, reference: &EntryRef) -> DirectoryResult<Option<DirectoryEntry>>;
}

/// One unit of work against the role catalog.
///
/// Dropping a transaction without calling [`commit`](Self::commit) discards
/// its changes.
#[async_trait]
pub trait RoleTransaction: Send {
    /// Check whether an account (login role) with this name exists.
    async fn account_exists(&mut self, name: &str) -> CatalogResult<bool>;

    /// Create a login account.
    async fn create_account(&mut self, name: &str) -> CatalogResult<()>;

    /// Grant `role` to the account `name`.
    async fn grant_role(&mut self, role: &str, name: &str) -> CatalogResult<()>;

    /// Revoke `role` from the account `name`.
    async fn revoke_role(&mut self, role: &str, name: &str) -> CatalogResult<()>;

    /// Delete the account `name`.
    ///
    /// A failure must leave the transaction usable so later statements and
    /// the final commit still succeed.
    async fn drop_account(&mut self, name: &str) -> CatalogResult<()>;

    /// List direct members of `role` whose names start with one of `prefixes`.
    ///
    /// Prefixes match literally. An empty prefix list yields no members.
    async fn list_managed_role_members(
        &mut self,
        role: &str,
        prefixes: &[String],
    ) -> CatalogResult<Vec<String>>;

    /// Make the transaction's changes permanent.
    async fn commit(self) -> CatalogResult<()>;

    /// Discard the transaction's changes.
    async fn rollback(self) -> CatalogResult<()>;
}

/// An open connection (pool) to one database's role catalog.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Transaction type handed out by [`begin`](Self::begin).
    type Transaction: RoleTransaction;

    /// Start a new transaction.
    async fn begin(&self) -> CatalogResult<Self::Transaction>;

    /// Release the connection. Called once the database has been processed.
    async fn close(&self);
}

/// Opens [`RoleStore`]s from per-database connection descriptors.
#[async_trait]
pub trait RoleStoreConnector: Send + Sync {
    /// Connection descriptor for one database.
    type Descriptor: Send + Sync;

    /// Store produced by a successful connection.
    type Store: RoleStore;

    /// Open and verify a connection.
    async fn connect(&self, descriptor: &Self::Descriptor) -> CatalogResult<Self::Store>;
}
