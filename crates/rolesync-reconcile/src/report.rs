//! Pass reports.
//!
//! Every phase outcome of a pass is recorded here: what was created,
//! granted, revoked and dropped, and every error met on the way. The report
//! is what the operator sees; nothing fails silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Outcome of one phase or unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Ran and committed (or rolled back in a dry run).
    Completed,
    /// Deliberately not run; see the reason.
    Skipped,
    /// Aborted; its transaction was rolled back.
    Failed,
    /// Never reached because an earlier step aborted the database.
    NotRun,
}

impl PhaseStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Completed => "completed",
            PhaseStatus::Skipped => "skipped",
            PhaseStatus::Failed => "failed",
            PhaseStatus::NotRun => "not_run",
        }
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution result for one role mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingReport {
    pub directory_group: String,
    pub target_role: String,
    pub status: PhaseStatus,
    /// Principals found in the directory before the prefix filter.
    pub resolved: usize,
    /// Principals left after the prefix filter.
    pub managed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failure was an outage or timeout; a later pass may succeed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transient: bool,
}

/// Provisioning phase outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningReport {
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Accounts created (and granted the default role).
    pub created: Vec<String>,
    /// Valid principals that already had an account.
    pub already_present: usize,
}

impl ProvisioningReport {
    pub(crate) fn with_status(status: PhaseStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
            created: Vec::new(),
            already_present: 0,
        }
    }

    pub(crate) fn failed(error: &SyncError) -> Self {
        Self::with_status(PhaseStatus::Failed, error.to_string())
    }
}

/// Membership sync outcome for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipReport {
    pub role: String,
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub granted: Vec<String>,
    pub revoked: Vec<String>,
}

impl MembershipReport {
    pub(crate) fn with_status(
        role: impl Into<String>,
        status: PhaseStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            status,
            reason: Some(reason.into()),
            granted: Vec::new(),
            revoked: Vec::new(),
        }
    }
}

/// An account that could not be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropFailure {
    pub account: String,
    pub error: String,
}

/// Deprovisioning phase outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprovisioningReport {
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub dropped: Vec<String>,
    /// Per-account failures; the rest of the phase still committed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DropFailure>,
}

impl DeprovisioningReport {
    pub(crate) fn with_status(status: PhaseStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
            dropped: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Overall state of one database after the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    /// Every phase ran; no errors.
    Completed,
    /// Every phase ran, but some unit reported an error.
    CompletedWithErrors,
    /// The catalog connection could not be opened.
    ConnectFailed,
    /// Provisioning failed; later phases were not run.
    ProvisioningFailed,
}

/// Everything that happened to one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseReport {
    pub alias: String,
    pub status: DatabaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub mappings: Vec<MappingReport>,
    pub provisioning: ProvisioningReport,
    pub memberships: Vec<MembershipReport>,
    pub deprovisioning: DeprovisioningReport,
}

impl DatabaseReport {
    pub(crate) fn connect_failed(alias: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            alias: alias.into(),
            status: DatabaseStatus::ConnectFailed,
            error: Some(error),
            mappings: Vec::new(),
            provisioning: ProvisioningReport::with_status(PhaseStatus::NotRun, "connect failed"),
            memberships: Vec::new(),
            deprovisioning: DeprovisioningReport::with_status(
                PhaseStatus::NotRun,
                "connect failed",
            ),
        }
    }

    /// Number of failed units (mappings, phases, roles, individual drops).
    #[must_use]
    pub fn error_count(&self) -> usize {
        let mut count = usize::from(self.status == DatabaseStatus::ConnectFailed);
        count += self
            .mappings
            .iter()
            .filter(|m| m.status == PhaseStatus::Failed)
            .count();
        count += usize::from(self.provisioning.status == PhaseStatus::Failed);
        count += self
            .memberships
            .iter()
            .filter(|m| m.status == PhaseStatus::Failed)
            .count();
        count += usize::from(self.deprovisioning.status == PhaseStatus::Failed);
        count + self.deprovisioning.failures.len()
    }
}

/// Totals across a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub databases: usize,
    pub created: usize,
    pub granted: usize,
    pub revoked: usize,
    pub dropped: usize,
    pub errors: usize,
}

/// Report of one complete pass across all selected databases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub databases: Vec<DatabaseReport>,
}

impl PassReport {
    /// Aggregate counts over every database.
    #[must_use]
    pub fn summary(&self) -> PassSummary {
        let mut summary = PassSummary {
            databases: self.databases.len(),
            ..PassSummary::default()
        };
        for db in &self.databases {
            summary.created += db.provisioning.created.len();
            summary.granted += db.memberships.iter().map(|m| m.granted.len()).sum::<usize>();
            summary.revoked += db.memberships.iter().map(|m| m.revoked.len()).sum::<usize>();
            summary.dropped += db.deprovisioning.dropped.len();
            summary.errors += db.error_count();
        }
        summary
    }

    /// True when any unit of any database failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.databases.iter().any(|db| db.error_count() > 0)
    }

    /// Wall-clock duration of the pass.
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}
