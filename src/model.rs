// src/model.rs

use crate::revision::RevisionId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type Timestamp = DateTime<Utc>;

/// Administrative section of an RCS file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminHeader {
    pub head: Option<RevisionId>,
    pub branch: Option<RevisionId>,
    pub access: Vec<String>,
    pub symbols: BTreeMap<String, RevisionId>,
    pub locks: BTreeMap<String, RevisionId>,
    pub strict: bool,
    pub comment: Option<Vec<u8>>,
    /// Keyword expansion mode, e.g. `b` for binary files
    pub expand: Option<Vec<u8>>,
    pub description: Vec<u8>,
}

/// One stored revision: metadata plus its log and diff text
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub revision: RevisionId,
    pub date: Timestamp,
    pub author: String,
    pub state: String,
    pub branches: Vec<RevisionId>,
    pub next: Option<RevisionId>,
    pub commitid: Option<String>,
    pub log: Vec<u8>,
    /// Full text for the head revision, an edit script for all others
    pub text: Vec<u8>,
}

impl Delta {
    pub fn is_dead(&self) -> bool {
        self.state == "dead"
    }
}

/// A decoded RCS file
#[derive(Debug, Clone, Default)]
pub struct RcsFile {
    pub header: AdminHeader,
    pub deltas: HashMap<RevisionId, Delta>,
    /// Revisions in the order their delta blocks appear in the file
    pub order: Vec<RevisionId>,
}

impl RcsFile {
    pub fn delta(&self, revision: &RevisionId) -> Option<&Delta> {
        self.deltas.get(revision)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Add,
    Modify,
    Delete,
}

/// One file's change at one revision
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Repository-relative path with `,v` and any `Attic/` removed
    pub path: String,
    pub revision: RevisionId,
    pub author: String,
    pub timestamp: Timestamp,
    pub message: String,
    /// Empty for trunk
    pub branch: String,
    pub action: Action,
    pub commitid: Option<String>,
    pub executable: bool,
}

/// A cluster of change events finalized into one commit
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicCommit {
    pub id: String,
    pub author: String,
    pub timestamp: Timestamp,
    pub branch: String,
    pub message: String,
    pub changes: Vec<ChangeEvent>,
}

/// A file change with its reconstructed content
#[derive(Debug, Clone, PartialEq)]
pub struct FileChange {
    pub path: String,
    pub revision: RevisionId,
    pub action: Action,
    pub executable: bool,
    /// `None` for deletions
    pub content: Option<Arc<[u8]>>,
}

/// A commit as handed to a target writer
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub id: String,
    pub author: String,
    pub timestamp: Timestamp,
    pub branch: String,
    pub message: String,
    pub files: Vec<FileChange>,
}

/// A branch symbol merged across every file that carries it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    pub name: String,
    /// Path to the revision the branch sprouts from in that file
    pub points: BTreeMap<String, RevisionId>,
}

/// A tag symbol merged across every file that carries it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub name: String,
    pub revisions: BTreeMap<String, RevisionId>,
}
