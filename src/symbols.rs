// src/symbols.rs

use crate::model::{AdminHeader, Branch, Tag};
use crate::revision::RevisionId;
use std::collections::BTreeMap;

/// Name of the branch whose first revision is `branch_head` (e.g. `1.2.2.1`).
///
/// Symbols store the magic form `1.2.0.2` while deltas use `1.2.2.x`, so a
/// symbol matches when its branch number is the branch `branch_head` lives on.
/// A symbol pointing at exactly `branch_head` is accepted as a last resort.
pub fn branch_name<'h>(header: &'h AdminHeader, branch_head: &RevisionId) -> Option<&'h str> {
    let branch = branch_head.containing_branch();
    header
        .symbols
        .iter()
        .find(|(_, rev)| rev.is_branch_symbol() && branch.is_some() && rev.branch_number() == branch)
        .or_else(|| header.symbols.iter().find(|(_, rev)| *rev == branch_head))
        .map(|(name, _)| name.as_str())
}

/// Branch and tag symbols of every file, merged by name.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    branches: BTreeMap<String, Branch>,
    tags: BTreeMap<String, Tag>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &str, header: &AdminHeader) {
        for (name, rev) in &header.symbols {
            if rev.is_branch_symbol() {
                let Some(point) = rev.branch_number().and_then(|b| b.branch_point()) else {
                    continue;
                };
                self.branches
                    .entry(name.clone())
                    .or_insert_with(|| Branch {
                        name: name.clone(),
                        ..Branch::default()
                    })
                    .points
                    .insert(path.to_string(), point);
            } else {
                self.tags
                    .entry(name.clone())
                    .or_insert_with(|| Tag {
                        name: name.clone(),
                        ..Tag::default()
                    })
                    .revisions
                    .insert(path.to_string(), rev.clone());
            }
        }
    }

    /// Sorted by name.
    pub fn branches(&self) -> Vec<Branch> {
        self.branches.values().cloned().collect()
    }

    /// Sorted by name.
    pub fn tags(&self) -> Vec<Tag> {
        self.tags.values().cloned().collect()
    }
}
