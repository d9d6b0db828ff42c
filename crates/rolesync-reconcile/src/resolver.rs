//! Nested group resolution with cycle detection.
//!
//! Expands a named directory group into the flat set of leaf principal
//! identifiers reachable through any depth of nested groups. Traversal is
//! depth-first over an explicit stack, so pathological nesting cannot exhaust
//! the call stack, and every distinct reference is fetched at most once, so
//! self-referential and diamond-shaped graphs terminate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use rolesync_connector::{Directory, DirectoryEntry, DirectoryError, DirectoryResult, EntryRef};

use crate::membership::PrincipalSet;

/// Object classes that mark an entry as a group by default.
pub const DEFAULT_GROUP_OBJECT_CLASSES: [&str; 3] = ["group", "groupOfNames", "groupOfUniqueNames"];

/// Result of resolving one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Leaf principals reachable from the group.
    pub principals: PrincipalSet,
    /// Distinct groups expanded (including the root).
    pub groups_visited: usize,
    /// References skipped because they were already processed (cycles, diamonds).
    pub repeats_skipped: usize,
    /// Leaf members skipped because they lack the identifying attribute.
    pub malformed_skipped: usize,
    /// Member references that point at no entry.
    pub dangling_skipped: usize,
}

/// Resolves directory groups into principal sets.
pub struct GroupResolver<'a, D: Directory + ?Sized> {
    directory: &'a D,
    group_object_classes: Vec<String>,
}

impl<'a, D: Directory + ?Sized> GroupResolver<'a, D> {
    /// Create a resolver that recognises groups by the default object classes.
    pub fn new(directory: &'a D) -> Self {
        Self {
            directory,
            group_object_classes: DEFAULT_GROUP_OBJECT_CLASSES
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }

    /// Override the object classes that mark an entry as a group.
    #[must_use]
    pub fn with_group_object_classes(mut self, classes: Vec<String>) -> Self {
        self.group_object_classes = classes;
        self
    }

    fn is_group(&self, entry: &DirectoryEntry) -> bool {
        entry.has_any_object_class(&self.group_object_classes)
    }

    /// Resolve `group_name` into its flat, deduplicated principal set.
    ///
    /// Fails with `GroupNotFound` / `AmbiguousGroup` when the name does not
    /// identify exactly one group, with `GroupVanished` when that group's
    /// entry is gone by the time it is read, and with any directory error raised while
    /// reading entries. Members that are missing or lack an identifier are
    /// skipped with a warning.
    #[instrument(skip(self), fields(group = %group_name))]
    pub async fn resolve(&self, group_name: &str) -> DirectoryResult<Resolution> {
        let root_ref = self.directory.find_group(group_name).await?;
        let root = self
            .directory
            .entry(&root_ref)
            .await?
            .ok_or_else(|| DirectoryError::GroupVanished {
                name: group_name.to_string(),
                reference: root_ref.to_string(),
            })?;

        let mut resolution = Resolution::default();
        let mut visited: HashSet<EntryRef> = HashSet::new();
        visited.insert(root_ref);
        let mut stack: Vec<DirectoryEntry> = vec![root];

        while let Some(group) = stack.pop() {
            resolution.groups_visited += 1;
            debug!(
                group_dn = %group.reference,
                members = group.member_refs.len(),
                "Expanding group"
            );

            for member_ref in group.member_refs {
                if member_ref.is_empty() {
                    continue;
                }
                if !visited.insert(member_ref.clone()) {
                    resolution.repeats_skipped += 1;
                    debug!(member_dn = %member_ref, "Skipping already processed reference");
                    continue;
                }

                let Some(member) = self.directory.entry(&member_ref).await? else {
                    resolution.dangling_skipped += 1;
                    warn!(
                        group_dn = %group.reference,
                        member_dn = %member_ref,
                        "Member reference points at no entry, skipping"
                    );
                    continue;
                };

                if self.is_group(&member) {
                    debug!(member_dn = %member_ref, "Found nested group");
                    stack.push(member);
                    continue;
                }

                match member.identifier.as_deref().filter(|id| !id.is_empty()) {
                    Some(id) => {
                        if resolution.principals.insert(id) {
                            debug!(principal = %id, "Found principal");
                        }
                    }
                    None => {
                        resolution.malformed_skipped += 1;
                        warn!(
                            member_dn = %member_ref,
                            "Member is not a group and has no identifying attribute, skipping"
                        );
                    }
                }
            }
        }

        if resolution.repeats_skipped > 0 {
            debug!(
                repeats = resolution.repeats_skipped,
                "Repeated or circular references skipped during resolution"
            );
        }
        info!(
            principals = resolution.principals.len(),
            groups_visited = resolution.groups_visited,
            "Group resolution complete"
        );

        Ok(resolution)
    }
}
