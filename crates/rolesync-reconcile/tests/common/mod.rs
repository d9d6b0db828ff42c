//! In-memory directory and catalog for reconciliation tests.
//!
//! The catalog keeps committed state behind a mutex; each transaction works
//! on a private copy that replaces the committed state on commit and is
//! discarded on rollback or drop.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;

use rolesync_connector::{
    CatalogError, CatalogResult, Directory, DirectoryEntry, DirectoryError, DirectoryResult,
    EntryRef, RoleStore, RoleStoreConnector, RoleTransaction,
};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub const GROUPS_BASE: &str = "ou=groups,dc=example,dc=com";
pub const PEOPLE_BASE: &str = "ou=people,dc=example,dc=com";

pub fn group_dn(cn: &str) -> String {
    format!("cn={cn},{GROUPS_BASE}")
}

pub fn user_dn(uid: &str) -> String {
    format!("uid={uid},{PEOPLE_BASE}")
}

// =============================================================================
// Directory
// =============================================================================

/// Directory backed by a map of entries.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: HashMap<EntryRef, DirectoryEntry>,
    names: HashMap<String, Vec<EntryRef>>,
    failing_entries: HashSet<EntryRef>,
    failing_groups: HashSet<String>,
    pub entry_fetches: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `groupOfNames` entry named `cn` with the given member DNs.
    pub fn group(mut self, cn: &str, members: &[String]) -> Self {
        let dn = group_dn(cn);
        let mut entry = DirectoryEntry::new(dn.as_str()).with_object_class("groupOfNames");
        for member in members {
            entry = entry.with_member(member.as_str());
        }
        self.names
            .entry(cn.to_string())
            .or_default()
            .push(EntryRef::new(dn.as_str()));
        self.entries.insert(EntryRef::new(dn), entry);
        self
    }

    /// Add a second, differently placed group with an existing name.
    pub fn duplicate_group(mut self, cn: &str) -> Self {
        let dn = format!("cn={cn},ou=legacy,dc=example,dc=com");
        self.names
            .entry(cn.to_string())
            .or_default()
            .push(EntryRef::new(dn.as_str()));
        self.entries.insert(
            EntryRef::new(dn.as_str()),
            DirectoryEntry::new(dn.as_str()).with_object_class("groupOfNames"),
        );
        self
    }

    /// Make `cn` findable by name while its entry is missing.
    pub fn vanished_group(mut self, cn: &str) -> Self {
        self.names
            .entry(cn.to_string())
            .or_default()
            .push(EntryRef::new(group_dn(cn)));
        self
    }

    /// Add an `inetOrgPerson` entry identified by `uid`.
    pub fn user(mut self, uid: &str) -> Self {
        let dn = user_dn(uid);
        self.entries.insert(
            EntryRef::new(dn.as_str()),
            DirectoryEntry::new(dn.as_str())
                .with_object_class("inetOrgPerson")
                .with_identifier(uid),
        );
        self
    }

    /// Add a person entry with no identifying attribute.
    pub fn user_without_uid(mut self, dn: &str) -> Self {
        self.entries.insert(
            EntryRef::new(dn),
            DirectoryEntry::new(dn).with_object_class("inetOrgPerson"),
        );
        self
    }

    /// Make reads of `dn` fail with a search error.
    pub fn failing_entry(mut self, dn: &str) -> Self {
        self.failing_entries.insert(EntryRef::new(dn));
        self
    }

    /// Make lookups of group `cn` fail with a connection error.
    pub fn failing_group(mut self, cn: &str) -> Self {
        self.failing_groups.insert(cn.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.entry_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_group(&self, name: &str) -> DirectoryResult<EntryRef> {
        if self.failing_groups.contains(name) {
            return Err(DirectoryError::connection_failed("directory unreachable"));
        }
        match self.names.get(name).map(Vec::as_slice) {
            None | Some([]) => Err(DirectoryError::GroupNotFound {
                name: name.to_string(),
                search_base: GROUPS_BASE.to_string(),
            }),
            Some([single]) => Ok(single.clone()),
            Some(many) => Err(DirectoryError::AmbiguousGroup {
                name: name.to_string(),
                count: many.len(),
            }),
        }
    }

    async fn entry(&self, reference: &EntryRef) -> DirectoryResult<Option<DirectoryEntry>> {
        self.entry_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_entries.contains(reference) {
            return Err(DirectoryError::search_failed(format!(
                "read of {reference} failed"
            )));
        }
        Ok(self.entries.get(reference).cloned())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Committed catalog contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogState {
    pub accounts: BTreeSet<String>,
    /// role -> members
    pub members: BTreeMap<String, BTreeSet<String>>,
}

impl CatalogState {
    pub fn with_account(mut self, name: &str, roles: &[&str]) -> Self {
        self.accounts.insert(name.to_string());
        for role in roles {
            self.members
                .entry((*role).to_string())
                .or_default()
                .insert(name.to_string());
        }
        self
    }

    pub fn role_members(&self, role: &str) -> Vec<String> {
        self.members
            .get(role)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Injected failures.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail_create: HashSet<String>,
    pub fail_drop: HashSet<String>,
    pub fail_grant_on_role: HashSet<String>,
    pub fail_begin: bool,
    pub statement_delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub begins: AtomicUsize,
    pub mutations: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub closes: AtomicUsize,
}

/// Catalog backed by shared in-memory state.
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
    faults: Arc<Mutex<Faults>>,
    pub counters: Arc<Counters>,
}

impl MemoryCatalog {
    pub fn new(state: CatalogState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    pub fn with_faults(self, faults: Faults) -> Self {
        *self.faults.lock().unwrap() = faults;
        self
    }

    pub fn snapshot(&self) -> CatalogState {
        self.state.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> usize {
        self.counters.mutations.load(Ordering::SeqCst)
    }

    pub fn begins(&self) -> usize {
        self.counters.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleStore for MemoryCatalog {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> CatalogResult<MemoryTransaction> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        let faults = self.faults.lock().unwrap().clone();
        if faults.fail_begin {
            return Err(CatalogError::TransactionFailed {
                message: "cannot begin".to_string(),
                source: None,
            });
        }
        Ok(MemoryTransaction {
            working: self.snapshot(),
            shared: Arc::clone(&self.state),
            faults,
            counters: Arc::clone(&self.counters),
        })
    }

    async fn close(&self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MemoryTransaction {
    working: CatalogState,
    shared: Arc<Mutex<CatalogState>>,
    faults: Faults,
    counters: Arc<Counters>,
}

impl MemoryTransaction {
    async fn statement(&self) {
        if let Some(delay) = self.faults.statement_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn mutation(&self) {
        self.counters.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn require_account(&self, name: &str) -> CatalogResult<()> {
        if self.working.accounts.contains(name) {
            Ok(())
        } else {
            Err(CatalogError::statement_failed(format!(
                "role \"{name}\" does not exist"
            )))
        }
    }
}

#[async_trait]
impl RoleTransaction for MemoryTransaction {
    async fn account_exists(&mut self, name: &str) -> CatalogResult<bool> {
        self.statement().await;
        Ok(self.working.accounts.contains(name))
    }

    async fn create_account(&mut self, name: &str) -> CatalogResult<()> {
        self.statement().await;
        self.mutation();
        if self.faults.fail_create.contains(name) {
            return Err(CatalogError::statement_failed(format!(
                "permission denied to create role \"{name}\""
            )));
        }
        if !self.working.accounts.insert(name.to_string()) {
            return Err(CatalogError::statement_failed(format!(
                "role \"{name}\" already exists"
            )));
        }
        Ok(())
    }

    async fn grant_role(&mut self, role: &str, name: &str) -> CatalogResult<()> {
        self.statement().await;
        self.mutation();
        if self.faults.fail_grant_on_role.contains(role) {
            return Err(CatalogError::statement_failed(format!(
                "permission denied to grant role \"{role}\""
            )));
        }
        self.require_account(name)?;
        self.working
            .members
            .entry(role.to_string())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    async fn revoke_role(&mut self, role: &str, name: &str) -> CatalogResult<()> {
        self.statement().await;
        self.mutation();
        self.require_account(name)?;
        if let Some(members) = self.working.members.get_mut(role) {
            members.remove(name);
        }
        Ok(())
    }

    async fn drop_account(&mut self, name: &str) -> CatalogResult<()> {
        self.statement().await;
        self.mutation();
        if self.faults.fail_drop.contains(name) {
            return Err(CatalogError::statement_failed(format!(
                "role \"{name}\" cannot be dropped because some objects depend on it"
            )));
        }
        self.require_account(name)?;
        self.working.accounts.remove(name);
        for members in self.working.members.values_mut() {
            members.remove(name);
        }
        Ok(())
    }

    async fn list_managed_role_members(
        &mut self,
        role: &str,
        prefixes: &[String],
    ) -> CatalogResult<Vec<String>> {
        self.statement().await;
        Ok(self
            .working
            .members
            .get(role)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| prefixes.iter().any(|p| m.starts_with(p.as_str())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(self) -> CatalogResult<()> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        *self.shared.lock().unwrap() = self.working;
        Ok(())
    }

    async fn rollback(self) -> CatalogResult<()> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that hands out pre-built catalogs by alias.
#[derive(Default)]
pub struct MemoryConnector {
    catalogs: HashMap<String, MemoryCatalog>,
    pub connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, alias: &str, catalog: MemoryCatalog) -> Self {
        self.catalogs.insert(alias.to_string(), catalog);
        self
    }
}

#[async_trait]
impl RoleStoreConnector for MemoryConnector {
    type Descriptor = String;
    type Store = MemoryCatalog;

    async fn connect(&self, descriptor: &String) -> CatalogResult<MemoryCatalog> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.catalogs
            .get(descriptor)
            .cloned()
            .ok_or_else(|| CatalogError::ConnectionFailed {
                message: format!("no route to {descriptor}"),
                source: None,
            })
    }
}
