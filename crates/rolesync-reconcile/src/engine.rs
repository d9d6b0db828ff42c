//! Reconciliation engine.
//!
//! Drives the three mutating phases against one catalog:
//!
//! 1. **Provisioning**: create an account for every valid principal that has
//!    none and grant it the default role. One transaction; any failure rolls
//!    the whole phase back.
//! 2. **Membership sync**: per role, grant `desired \ actual` and revoke
//!    `actual \ desired`, where both sides are restricted to managed
//!    principals. One transaction per role.
//! 3. **Deprovisioning**: drop every managed account that is no longer
//!    valid. One transaction; each drop is isolated so one failure leaves the
//!    others in place.
//!
//! Every phase checks the policy first and is skipped without touching the
//! catalog when no prefixes are configured.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use rolesync_connector::{RoleStore, RoleTransaction};

use crate::error::{SyncError, SyncResult};
use crate::membership::PrincipalSet;
use crate::plan::{accounts_to_create, accounts_to_drop, MembershipPlan};
use crate::policy::SyncPolicy;
use crate::report::{
    DeprovisioningReport, DropFailure, MembershipReport, PhaseStatus, ProvisioningReport,
};

const NO_PREFIXES: &str = "no allowed user prefixes configured";

/// Mutating phases of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Provisioning,
    Membership,
    Deprovisioning,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Provisioning => "provisioning",
            Phase::Membership => "membership",
            Phase::Deprovisioning => "deprovisioning",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time limits for each phase's transaction, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimeouts {
    #[serde(default = "default_provisioning_secs")]
    pub provisioning_secs: u64,

    /// Applies to each role's transaction separately.
    #[serde(default = "default_membership_secs")]
    pub membership_secs: u64,

    #[serde(default = "default_deprovisioning_secs")]
    pub deprovisioning_secs: u64,
}

fn default_provisioning_secs() -> u64 {
    60
}

fn default_membership_secs() -> u64 {
    30
}

fn default_deprovisioning_secs() -> u64 {
    30
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            provisioning_secs: default_provisioning_secs(),
            membership_secs: default_membership_secs(),
            deprovisioning_secs: default_deprovisioning_secs(),
        }
    }
}

impl PhaseTimeouts {
    /// Limit for `phase`.
    #[must_use]
    pub fn for_phase(&self, phase: Phase) -> Duration {
        Duration::from_secs(match phase {
            Phase::Provisioning => self.provisioning_secs,
            Phase::Membership => self.membership_secs,
            Phase::Deprovisioning => self.deprovisioning_secs,
        })
    }

    /// Reject zero limits.
    pub fn check(&self) -> Result<(), String> {
        for phase in [Phase::Provisioning, Phase::Membership, Phase::Deprovisioning] {
            if self.for_phase(phase).is_zero() {
                return Err(format!("{phase} timeout must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// Options shared by every phase of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub timeouts: PhaseTimeouts,
    /// Read and plan only: no mutating statement is issued and every
    /// transaction is rolled back. Reports list what would have changed.
    pub dry_run: bool,
}

/// Applies reconciliation phases to one catalog.
pub struct ReconciliationEngine<'a, S: RoleStore> {
    store: &'a S,
    policy: &'a SyncPolicy,
    options: EngineOptions,
}

impl<'a, S: RoleStore> ReconciliationEngine<'a, S> {
    pub fn new(store: &'a S, policy: &'a SyncPolicy, options: EngineOptions) -> Self {
        Self {
            store,
            policy,
            options,
        }
    }

    /// Managed members of `role` currently in the catalog.
    async fn managed_members(
        &self,
        tx: &mut S::Transaction,
        role: &str,
    ) -> SyncResult<PrincipalSet> {
        let members = tx
            .list_managed_role_members(role, &self.policy.allowed_prefixes)
            .await?;
        // The catalog filter is advisory; the policy has the last word.
        Ok(members.into_iter().filter(|m| self.policy.allows(m)).collect())
    }

    /// Run `fut` under the phase's time limit.
    async fn within<T, F>(&self, phase: Phase, fut: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        let limit = self.options.timeouts.for_phase(phase);
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::PhaseTimeout {
                phase,
                timeout_secs: limit.as_secs(),
            }),
        }
    }

    /// Commit, or roll back in a dry run.
    async fn finish(&self, tx: S::Transaction) -> SyncResult<()> {
        if self.options.dry_run {
            debug!("Dry run, rolling back");
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }
        Ok(())
    }

    /// Roll back after a failed phase. The phase error wins.
    async fn abandon(tx: S::Transaction, phase: Phase) {
        if let Err(e) = tx.rollback().await {
            warn!(phase = %phase, error = %e, "Rollback failed");
        }
    }

    /// Phase 1: create missing accounts and grant them the default role.
    ///
    /// Any error rolls the whole phase back and is returned; the caller must
    /// not run later phases for this catalog.
    #[instrument(skip(self, valid), fields(valid = valid.len(), dry_run = self.options.dry_run))]
    pub async fn provision(&self, valid: &PrincipalSet) -> SyncResult<ProvisioningReport> {
        if !self.policy.is_enforcing() {
            warn!("No allowed user prefixes configured, skipping provisioning");
            return Ok(ProvisioningReport::with_status(
                PhaseStatus::Skipped,
                NO_PREFIXES,
            ));
        }

        self.within(Phase::Provisioning, async {
            let mut tx = self.store.begin().await?;
            match self.provision_in(&mut tx, valid).await {
                Ok(report) => {
                    self.finish(tx).await?;
                    Ok(report)
                }
                Err(e) => {
                    Self::abandon(tx, Phase::Provisioning).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn provision_in(
        &self,
        tx: &mut S::Transaction,
        valid: &PrincipalSet,
    ) -> SyncResult<ProvisioningReport> {
        let candidates = self.policy.filter(valid);
        if candidates.len() < valid.len() {
            warn!(
                excluded = valid.len() - candidates.len(),
                "Valid set contained principals outside the allowed prefixes"
            );
        }

        let mut existing = PrincipalSet::new();
        for principal in candidates.iter() {
            if tx.account_exists(principal).await? {
                existing.insert(principal);
            }
        }

        let to_create = accounts_to_create(&candidates, &existing);
        for principal in to_create.iter() {
            info!(account = %principal, "Creating account");
            if !self.options.dry_run {
                tx.create_account(principal).await?;
                tx.grant_role(&self.policy.default_role, principal).await?;
            }
        }

        info!(
            created = to_create.len(),
            already_present = existing.len(),
            "Provisioning complete"
        );
        Ok(ProvisioningReport {
            status: PhaseStatus::Completed,
            reason: None,
            created: to_create.to_vec(),
            already_present: existing.len(),
        })
    }

    /// Phase 2: make `role`'s managed membership equal `desired`.
    ///
    /// Members outside the allowed prefixes are invisible here: never
    /// granted, never revoked.
    #[instrument(skip(self, desired), fields(role = %role, desired = desired.len()))]
    pub async fn sync_membership(
        &self,
        role: &str,
        desired: &PrincipalSet,
    ) -> SyncResult<MembershipReport> {
        if !self.policy.is_enforcing() {
            warn!("No allowed user prefixes configured, skipping membership sync");
            return Ok(MembershipReport::with_status(
                role,
                PhaseStatus::Skipped,
                NO_PREFIXES,
            ));
        }

        self.within(Phase::Membership, async {
            let mut tx = self.store.begin().await?;
            match self.sync_membership_in(&mut tx, role, desired).await {
                Ok(report) => {
                    self.finish(tx).await?;
                    Ok(report)
                }
                Err(e) => {
                    Self::abandon(tx, Phase::Membership).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn sync_membership_in(
        &self,
        tx: &mut S::Transaction,
        role: &str,
        desired: &PrincipalSet,
    ) -> SyncResult<MembershipReport> {
        let desired = self.policy.filter(desired);
        let actual = self.managed_members(tx, role).await?;
        let plan = MembershipPlan::compute(role, &desired, &actual);

        if plan.is_empty() {
            debug!("Role membership already in sync");
        }
        for principal in plan.to_grant.iter() {
            info!(account = %principal, "Granting role");
            if !self.options.dry_run {
                tx.grant_role(role, principal).await?;
            }
        }
        for principal in plan.to_revoke.iter() {
            info!(account = %principal, "Revoking role");
            if !self.options.dry_run {
                tx.revoke_role(role, principal).await?;
            }
        }

        Ok(MembershipReport {
            role: role.to_string(),
            status: PhaseStatus::Completed,
            reason: None,
            granted: plan.to_grant.to_vec(),
            revoked: plan.to_revoke.to_vec(),
        })
    }

    /// Phase 3: drop managed accounts that are no longer valid.
    ///
    /// A failed drop is logged and recorded; the remaining drops still
    /// commit. `valid` must come from a complete resolution: the caller
    /// decides whether that holds.
    #[instrument(skip(self, valid), fields(valid = valid.len(), dry_run = self.options.dry_run))]
    pub async fn deprovision(&self, valid: &PrincipalSet) -> SyncResult<DeprovisioningReport> {
        if !self.policy.is_enforcing() {
            warn!("No allowed user prefixes configured, skipping deprovisioning");
            return Ok(DeprovisioningReport::with_status(
                PhaseStatus::Skipped,
                NO_PREFIXES,
            ));
        }

        self.within(Phase::Deprovisioning, async {
            let mut tx = self.store.begin().await?;
            match self.deprovision_in(&mut tx, valid).await {
                Ok(report) => {
                    self.finish(tx).await?;
                    Ok(report)
                }
                Err(e) => {
                    Self::abandon(tx, Phase::Deprovisioning).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn deprovision_in(
        &self,
        tx: &mut S::Transaction,
        valid: &PrincipalSet,
    ) -> SyncResult<DeprovisioningReport> {
        let managed = self.managed_members(tx, &self.policy.default_role).await?;
        let to_drop = accounts_to_drop(&managed, valid);

        let mut dropped = Vec::new();
        let mut failures = Vec::new();
        for principal in to_drop.iter() {
            info!(account = %principal, "Dropping account");
            if self.options.dry_run {
                dropped.push(principal.to_string());
                continue;
            }
            match tx.drop_account(principal).await {
                Ok(()) => dropped.push(principal.to_string()),
                Err(e) => {
                    error!(account = %principal, error = %e, "Failed to drop account");
                    failures.push(DropFailure {
                        account: principal.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            managed = managed.len(),
            dropped = dropped.len(),
            failed = failures.len(),
            "Deprovisioning complete"
        );
        Ok(DeprovisioningReport {
            status: PhaseStatus::Completed,
            reason: None,
            dropped,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Provisioning.to_string(), "provisioning");
        assert_eq!(Phase::Membership.to_string(), "membership");
        assert_eq!(Phase::Deprovisioning.to_string(), "deprovisioning");
    }

    #[test]
    fn test_default_timeouts() {
        let t = PhaseTimeouts::default();
        assert_eq!(t.for_phase(Phase::Provisioning), Duration::from_secs(60));
        assert_eq!(t.for_phase(Phase::Membership), Duration::from_secs(30));
        assert_eq!(t.for_phase(Phase::Deprovisioning), Duration::from_secs(30));
        assert!(t.check().is_ok());
    }

    #[test]
    fn test_timeouts_partial_deserialize() {
        let t: PhaseTimeouts = serde_json::from_str(r#"{"membership_secs": 5}"#).unwrap();
        assert_eq!(t.provisioning_secs, 60);
        assert_eq!(t.membership_secs, 5);

        let zero = PhaseTimeouts {
            deprovisioning_secs: 0,
            ..PhaseTimeouts::default()
        };
        assert_eq!(
            zero.check().unwrap_err(),
            "deprovisioning timeout must be greater than 0"
        );
    }
}
