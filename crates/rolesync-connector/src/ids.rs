//! Connector Framework ID types
//!
//! Newtype wrappers for type-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a directory entry (an LDAP distinguished name).
///
/// Only used as a lookup key while a group is being resolved. Equality is
/// exact; the directory is trusted to return a consistent spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryRef(String);

impl EntryRef {
    /// Wrap a distinguished name.
    pub fn new(dn: impl Into<String>) -> Self {
        Self(dn.into())
    }

    /// Get the raw distinguished name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for an empty reference (blank member values are ignored).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryRef {
    fn from(dn: &str) -> Self {
        Self(dn.to_string())
    }
}

impl From<String> for EntryRef {
    fn from(dn: String) -> Self {
        Self(dn)
    }
}

impl AsRef<str> for EntryRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
