//! Principal sets.
//!
//! Every membership view a pass works with (resolved group members, the
//! global valid set, catalog members, plan fields) is a [`PrincipalSet`].
//! Iteration order is sorted so logs and reports are stable between runs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A deduplicated set of account identifiers.
///
/// Membership is exact and case-sensitive; no normalization is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalSet(BTreeSet<String>);

impl PrincipalSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a principal. Returns `true` if it was not already present.
    pub fn insert(&mut self, principal: impl Into<String>) -> bool {
        self.0.insert(principal.into())
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, principal: &str) -> bool {
        self.0.contains(principal)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    /// Principals in `self` but not in `other`.
    #[must_use]
    pub fn difference(&self, other: &PrincipalSet) -> PrincipalSet {
        PrincipalSet(self.0.difference(&other.0).cloned().collect())
    }

    /// True if the sets share no principal.
    #[must_use]
    pub fn is_disjoint(&self, other: &PrincipalSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    /// Add every principal of `other` to `self`.
    pub fn extend_from(&mut self, other: &PrincipalSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Keep only principals for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|p| keep(p));
    }

    /// Copy the principals into a sorted `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl fmt::Display for PrincipalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p)?;
        }
        f.write_str("]")
    }
}

impl<S: Into<String>> FromIterator<S> for PrincipalSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        PrincipalSet(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for PrincipalSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for PrincipalSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PrincipalSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
