//! # Role Reconciliation
//!
//! Mirrors directory group membership onto catalog roles.
//!
//! A pass, per database:
//!
//! 1. Resolve each mapped directory group into its flat set of principals
//!    ([`GroupResolver`]), following nested groups and tolerating cycles.
//! 2. Restrict every set to the managed population ([`SyncPolicy`]).
//! 3. Create missing accounts, sync each role's membership, drop accounts
//!    that lost all entitlement ([`ReconciliationEngine`]).
//!
//! [`SyncRunner`] drives the whole pass and produces a [`PassReport`].
//!
//! ## Safety
//!
//! Accounts outside the allowed prefixes are never created, granted,
//! revoked or dropped. With no prefixes configured, a pass makes no catalog
//! changes at all.

pub mod engine;
pub mod error;
pub mod membership;
pub mod plan;
pub mod policy;
pub mod report;
pub mod resolver;
pub mod runner;

pub use engine::{EngineOptions, Phase, PhaseTimeouts, ReconciliationEngine};
pub use error::{SyncError, SyncResult};
pub use membership::PrincipalSet;
pub use plan::{accounts_to_create, accounts_to_drop, MembershipPlan};
pub use policy::{RoleMapping, SyncPolicy};
pub use report::{
    DatabaseReport, DatabaseStatus, DeprovisioningReport, DropFailure, MappingReport,
    MembershipReport, PassReport, PassSummary, PhaseStatus, ProvisioningReport,
};
pub use resolver::{GroupResolver, Resolution, DEFAULT_GROUP_OBJECT_CLASSES};
pub use runner::{DatabaseTarget, SyncRunner};
