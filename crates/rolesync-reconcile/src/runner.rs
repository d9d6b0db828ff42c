//! Pass orchestration across databases.
//!
//! For each database, in order: open the catalog, resolve every mapping,
//! provision, sync each role, deprovision, close. Databases are isolated from
//! each other: a failure in one is reported and the pass moves on.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use rolesync_connector::{Directory, DirectoryError, RoleStore, RoleStoreConnector};

use crate::engine::{EngineOptions, ReconciliationEngine};
use crate::membership::PrincipalSet;
use crate::policy::{RoleMapping, SyncPolicy};
use crate::report::{
    DatabaseReport, DatabaseStatus, DeprovisioningReport, MappingReport, MembershipReport,
    PassReport, PhaseStatus, ProvisioningReport,
};
use crate::resolver::{GroupResolver, DEFAULT_GROUP_OBJECT_CLASSES};

/// One database to reconcile.
#[derive(Debug, Clone)]
pub struct DatabaseTarget<C> {
    /// Name used in logs and reports.
    pub alias: String,
    /// Connector-specific connection descriptor.
    pub connection: C,
    pub mappings: Vec<RoleMapping>,
}

/// Desired state for one role, merged over every mapping that targets it.
#[derive(Debug, Default)]
struct RoleUnit {
    groups: Vec<String>,
    desired: PrincipalSet,
    /// Some mapping for this role failed to resolve.
    incomplete: bool,
}

/// Outcome of resolving every mapping of one database.
#[derive(Debug, Default)]
struct ResolvedMappings {
    valid: PrincipalSet,
    roles: BTreeMap<String, RoleUnit>,
    reports: Vec<MappingReport>,
}

/// Runs complete passes.
pub struct SyncRunner<'a, D: Directory + ?Sized, K: RoleStoreConnector> {
    directory: &'a D,
    connector: &'a K,
    policy: &'a SyncPolicy,
    options: EngineOptions,
    group_object_classes: Vec<String>,
}

impl<'a, D: Directory + ?Sized, K: RoleStoreConnector> SyncRunner<'a, D, K> {
    pub fn new(directory: &'a D, connector: &'a K, policy: &'a SyncPolicy) -> Self {
        Self {
            directory,
            connector,
            policy,
            options: EngineOptions::default(),
            group_object_classes: DEFAULT_GROUP_OBJECT_CLASSES
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_group_object_classes(mut self, classes: Vec<String>) -> Self {
        self.group_object_classes = classes;
        self
    }

    /// Reconcile every target in order and report on all of them.
    pub async fn run(&self, targets: &[DatabaseTarget<K::Descriptor>]) -> PassReport {
        let started_at = Utc::now();
        info!(
            databases = targets.len(),
            dry_run = self.options.dry_run,
            "Starting sync pass"
        );
        if !self.policy.is_enforcing() {
            warn!("No allowed user prefixes configured; no catalog changes will be made");
        }

        let mut databases = Vec::with_capacity(targets.len());
        for target in targets {
            let span = info_span!("database", alias = %target.alias);
            databases.push(self.run_database(target).instrument(span).await);
        }

        let report = PassReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: self.options.dry_run,
            databases,
        };
        let summary = report.summary();
        info!(
            databases = summary.databases,
            created = summary.created,
            granted = summary.granted,
            revoked = summary.revoked,
            dropped = summary.dropped,
            errors = summary.errors,
            "Sync pass complete"
        );
        report
    }

    /// Reconcile one database. Never fails; problems land in the report.
    pub async fn run_database(&self, target: &DatabaseTarget<K::Descriptor>) -> DatabaseReport {
        info!("Processing database");
        let store = match self.connector.connect(&target.connection).await {
            Ok(store) => store,
            Err(e) => {
                error!(
                    error = %e,
                    transient = e.is_transient(),
                    "Failed to connect, skipping database"
                );
                return DatabaseReport::connect_failed(&target.alias, e.to_string());
            }
        };

        let report = self.reconcile(&store, target).await;
        store.close().await;
        report
    }

    async fn reconcile(
        &self,
        store: &K::Store,
        target: &DatabaseTarget<K::Descriptor>,
    ) -> DatabaseReport {
        let resolved = self.resolve_mappings(&target.mappings).await;
        let engine = ReconciliationEngine::new(store, self.policy, self.options.clone());

        let mut report = DatabaseReport {
            alias: target.alias.clone(),
            status: DatabaseStatus::Completed,
            error: None,
            mappings: resolved.reports,
            provisioning: ProvisioningReport::with_status(PhaseStatus::NotRun, ""),
            memberships: Vec::new(),
            deprovisioning: DeprovisioningReport::with_status(PhaseStatus::NotRun, ""),
        };

        match engine.provision(&resolved.valid).await {
            Ok(provisioning) => report.provisioning = provisioning,
            Err(e) => {
                error!(
                    error = %e,
                    transient = e.is_transient(),
                    "Provisioning failed, skipping remaining phases"
                );
                report.status = DatabaseStatus::ProvisioningFailed;
                report.error = Some(e.to_string());
                report.provisioning = ProvisioningReport::failed(&e);
                report.deprovisioning = DeprovisioningReport::with_status(
                    PhaseStatus::NotRun,
                    "provisioning failed",
                );
                return report;
            }
        }

        for (role, unit) in &resolved.roles {
            let membership = if unit.incomplete {
                warn!(role = %role, groups = ?unit.groups, "Skipping role with unresolved mappings");
                MembershipReport::with_status(
                    role,
                    PhaseStatus::Skipped,
                    "a mapped group could not be resolved",
                )
            } else {
                match engine.sync_membership(role, &unit.desired).await {
                    Ok(membership) => membership,
                    Err(e) => {
                        error!(
                            role = %role,
                            error = %e,
                            transient = e.is_transient(),
                            "Membership sync failed"
                        );
                        MembershipReport::with_status(role, PhaseStatus::Failed, e.to_string())
                    }
                }
            };
            report.memberships.push(membership);
        }

        // Failed mappings contribute nothing to the valid set.
        report.deprovisioning = match engine.deprovision(&resolved.valid).await {
            Ok(deprovisioning) => deprovisioning,
            Err(e) => {
                error!(error = %e, transient = e.is_transient(), "Deprovisioning failed");
                DeprovisioningReport::with_status(PhaseStatus::Failed, e.to_string())
            }
        };

        if report.error_count() > 0 {
            report.status = DatabaseStatus::CompletedWithErrors;
        }
        report
    }

    async fn resolve_mappings(&self, mappings: &[RoleMapping]) -> ResolvedMappings {
        let resolver = GroupResolver::new(self.directory)
            .with_group_object_classes(self.group_object_classes.clone());
        let mut resolved = ResolvedMappings::default();

        for mapping in mappings {
            let unit = resolved
                .roles
                .entry(mapping.target_role.clone())
                .or_default();
            unit.groups.push(mapping.directory_group.clone());

            match resolver.resolve(&mapping.directory_group).await {
                Ok(resolution) => {
                    let managed = self.policy.filter(&resolution.principals);
                    let excluded = resolution.principals.len() - managed.len();
                    if excluded > 0 {
                        debug!(
                            group = %mapping.directory_group,
                            excluded,
                            "Principals outside the allowed prefixes ignored"
                        );
                    }
                    resolved.reports.push(MappingReport {
                        directory_group: mapping.directory_group.clone(),
                        target_role: mapping.target_role.clone(),
                        status: PhaseStatus::Completed,
                        resolved: resolution.principals.len(),
                        managed: managed.len(),
                        error_code: None,
                        error: None,
                        transient: false,
                    });
                    unit.desired.extend_from(&managed);
                    resolved.valid.extend_from(&managed);
                }
                Err(e) => {
                    if e.is_lookup_miss() {
                        warn!(group = %mapping.directory_group, error = %e, "Group lookup failed");
                    } else {
                        error!(
                            group = %mapping.directory_group,
                            error = %e,
                            transient = e.is_transient(),
                            "Group resolution failed"
                        );
                    }
                    unit.incomplete = true;
                    resolved.reports.push(failed_mapping(mapping, &e));
                }
            }
        }

        info!(
            mappings = mappings.len(),
            valid = resolved.valid.len(),
            "Resolved valid principal set"
        );
        resolved
    }
}

fn failed_mapping(mapping: &RoleMapping, error: &DirectoryError) -> MappingReport {
    MappingReport {
        directory_group: mapping.directory_group.clone(),
        target_role: mapping.target_role.clone(),
        status: PhaseStatus::Failed,
        resolved: 0,
        managed: 0,
        error_code: Some(error.error_code().to_string()),
        error: Some(error.to_string()),
        transient: error.is_transient(),
    }
}
