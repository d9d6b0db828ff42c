//! Sync policy and role mappings.
//!
//! The policy's prefix list is the safety filter: only principals whose
//! identifier starts with an allowed prefix are ever created, granted,
//! revoked or dropped. An empty list disables every mutating phase.

use serde::{Deserialize, Serialize};

use crate::membership::PrincipalSet;

/// Global rules for one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    /// Identifier prefixes of managed accounts.
    #[serde(rename = "allowed_user_prefixes", default)]
    pub allowed_prefixes: Vec<String>,

    /// Role every managed account is granted on creation; also the role whose
    /// membership defines the managed population for deprovisioning.
    #[serde(rename = "default_postgres_group")]
    pub default_role: String,
}

impl SyncPolicy {
    pub fn new(allowed_prefixes: Vec<String>, default_role: impl Into<String>) -> Self {
        Self {
            allowed_prefixes,
            default_role: default_role.into(),
        }
    }

    /// True when at least one prefix is configured.
    ///
    /// Mutating phases check this first and become no-ops when it is false.
    #[must_use]
    pub fn is_enforcing(&self) -> bool {
        !self.allowed_prefixes.is_empty()
    }

    /// True iff `principal` starts with at least one allowed prefix.
    #[must_use]
    pub fn allows(&self, principal: &str) -> bool {
        self.allowed_prefixes
            .iter()
            .any(|prefix| principal.starts_with(prefix.as_str()))
    }

    /// Narrow a set to the principals this policy allows.
    #[must_use]
    pub fn filter(&self, principals: &PrincipalSet) -> PrincipalSet {
        let mut allowed = principals.clone();
        allowed.retain(|p| self.allows(p));
        allowed
    }

    /// Check the policy is complete enough to run a pass.
    pub fn check(&self) -> Result<(), String> {
        if self.default_role.trim().is_empty() {
            return Err("sync_policy.default_postgres_group must not be empty".to_string());
        }
        if self.allowed_prefixes.iter().any(|p| p.is_empty()) {
            return Err(
                "sync_policy.allowed_user_prefixes must not contain an empty prefix".to_string(),
            );
        }
        Ok(())
    }
}

/// Mapping of one directory group to one catalog role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleMapping {
    /// Name (`cn`) of the directory group.
    #[serde(rename = "ldap_group_cn")]
    pub directory_group: String,

    /// Catalog role mirroring the group.
    #[serde(rename = "postgres_role")]
    pub target_role: String,
}

impl RoleMapping {
    pub fn new(directory_group: impl Into<String>, target_role: impl Into<String>) -> Self {
        Self {
            directory_group: directory_group.into(),
            target_role: target_role.into(),
        }
    }
}
