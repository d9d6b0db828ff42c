//! Reconciliation plans.
//!
//! Pure set differences between a desired and an actual view. Plans are
//! computed fresh for every phase and discarded afterwards.

use serde::{Deserialize, Serialize};

use crate::membership::PrincipalSet;

/// Grants and revokes needed to make one role's managed membership match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPlan {
    /// Role the plan applies to.
    pub role: String,
    /// `desired \ actual`
    pub to_grant: PrincipalSet,
    /// `actual \ desired`
    pub to_revoke: PrincipalSet,
}

impl MembershipPlan {
    /// Compute the plan for `role`.
    ///
    /// The two sets are disjoint by construction.
    #[must_use]
    pub fn compute(role: impl Into<String>, desired: &PrincipalSet, actual: &PrincipalSet) -> Self {
        let plan = Self {
            role: role.into(),
            to_grant: desired.difference(actual),
            to_revoke: actual.difference(desired),
        };
        debug_assert!(plan.to_grant.is_disjoint(&plan.to_revoke));
        plan
    }

    /// True when the role already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_grant.is_empty() && self.to_revoke.is_empty()
    }
}

/// Accounts that must be created for the database.
#[must_use]
pub fn accounts_to_create(valid: &PrincipalSet, existing: &PrincipalSet) -> PrincipalSet {
    valid.difference(existing)
}

/// Managed accounts that are no longer entitled to exist.
#[must_use]
pub fn accounts_to_drop(managed: &PrincipalSet, valid: &PrincipalSet) -> PrincipalSet {
    managed.difference(valid)
}
