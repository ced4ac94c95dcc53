// src/reader.rs

use crate::aggregate::{aggregate, ClusterPolicy};
use crate::analyzer::{self, Analysis, ParsedFile};
use crate::config::MigrationConfig;
use crate::error::{Error, FileFailure, Result};
use crate::graph::{self, ContentCache};
use crate::model::{Action, AtomicCommit, Branch, ChangeEvent, Commit, FileChange, Tag};
use crate::progress::{CancelToken, NoProgress, Progress};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unopened,
    Validated,
    Iterating,
    Closed,
}

impl ReaderState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReaderState::Unopened => "unopened",
            ReaderState::Validated => "validated",
            ReaderState::Iterating => "iterating",
            ReaderState::Closed => "closed",
        }
    }
}

/// Reads a CVS module directory as a time-ordered stream of atomic commits.
pub struct CvsReader {
    root: PathBuf,
    config: MigrationConfig,
    cancel: CancelToken,
    state: ReaderState,
    files_found: usize,
    analysis: Option<Analysis>,
    cache: HashMap<usize, ContentCache>,
}

impl CvsReader {
    pub fn new(root: impl Into<PathBuf>, config: MigrationConfig) -> Self {
        CvsReader {
            root: root.into(),
            config,
            cancel: CancelToken::new(),
            state: ReaderState::Unopened,
            files_found: 0,
            analysis: None,
            cache: HashMap::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Number of RCS files seen by the last `validate`.
    pub fn files_found(&self) -> usize {
        self.files_found
    }

    fn require_validated(&self, operation: &'static str) -> Result<()> {
        match self.state {
            ReaderState::Closed => Err(Error::ClosedRepository),
            ReaderState::Unopened => Err(Error::InvalidState {
                operation,
                state: self.state.as_str(),
            }),
            ReaderState::Validated | ReaderState::Iterating => Ok(()),
        }
    }

    fn analysis(&mut self, progress: &dyn Progress) -> Result<&mut Analysis> {
        let analysis = match self.analysis.take() {
            Some(analysis) => analysis,
            None => analyzer::analyze(&self.root, &self.config, progress, &self.cancel)?,
        };
        Ok(self.analysis.insert(analysis))
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.state == ReaderState::Closed {
            return Err(Error::ClosedRepository);
        }
        let files = analyzer::validate(&self.root)?;
        tracing::info!(root = %self.root.display(), files, "repository validated");
        self.files_found = files;
        if self.state == ReaderState::Unopened {
            self.state = ReaderState::Validated;
        }
        Ok(())
    }

    /// Runs the per-file phase now rather than on first use, reporting to
    /// `progress`. Returns the number of files that failed.
    pub fn prepare(&mut self, progress: &dyn Progress) -> Result<usize> {
        self.require_validated("prepare")?;
        Ok(self.analysis(progress)?.failures.len())
    }

    /// Runs the per-file phase (if not yet done) and the aggregation, and
    /// returns a single-pass iterator over the resulting commits.
    pub fn commits(&mut self, progress: &dyn Progress) -> Result<CommitIter<'_>> {
        self.require_validated("commits")?;
        if self.state == ReaderState::Iterating {
            return Err(Error::InvalidState {
                operation: "commits",
                state: self.state.as_str(),
            });
        }

        let policy = ClusterPolicy::from(&self.config);
        let cancel = self.cancel.clone();
        let analysis = self.analysis(progress)?;
        let failures = std::mem::take(&mut analysis.failures);
        let events: Vec<ChangeEvent> = analysis
            .files
            .iter()
            .flat_map(|f| f.history.events.iter().cloned())
            .collect();
        let total_events = events.len();
        let commits = aggregate(events, &policy, &cancel, progress)?;
        tracing::info!(events = total_events, commits = commits.len(), "aggregated change events");
        self.state = ReaderState::Iterating;

        let CvsReader { analysis, cache, .. } = self;
        let analysis: &Option<Analysis> = analysis;
        let files: &[ParsedFile] = analysis.as_ref().map(|a| a.files.as_slice()).unwrap_or(&[]);
        let index = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.as_str(), i))
            .collect();
        Ok(CommitIter {
            files,
            index,
            cache,
            pending: commits.into_iter(),
            failures,
            broken: HashSet::new(),
        })
    }

    /// Branch symbols of all files, merged by name.
    pub fn branches(&mut self) -> Result<Vec<Branch>> {
        self.require_validated("branches")?;
        Ok(self.analysis(&NoProgress)?.symbols.branches())
    }

    /// Tag symbols of all files, merged by name.
    pub fn tags(&mut self) -> Result<Vec<Tag>> {
        self.require_validated("tags")?;
        Ok(self.analysis(&NoProgress)?.symbols.tags())
    }

    /// CVS usernames found in the history.
    pub fn authors(&mut self) -> Result<Vec<String>> {
        self.require_validated("authors")?;
        Ok(self.analysis(&NoProgress)?.authors.list())
    }

    /// Releases parsed files and reconstructed content.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ReaderState::Closed {
            return Err(Error::ClosedRepository);
        }
        self.analysis = None;
        self.cache.clear();
        self.state = ReaderState::Closed;
        Ok(())
    }
}

/// Commits in ascending timestamp order, with file contents filled in.
///
/// Files whose history cannot be reconstructed are dropped from the stream
/// and reported through `failures` and `into_result`.
pub struct CommitIter<'r> {
    files: &'r [ParsedFile],
    index: HashMap<&'r str, usize>,
    cache: &'r mut HashMap<usize, ContentCache>,
    pending: std::vec::IntoIter<AtomicCommit>,
    failures: Vec<FileFailure>,
    broken: HashSet<usize>,
}

impl CommitIter<'_> {
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn failures(&self) -> &[FileFailure] {
        &self.failures
    }

    /// `Err(Error::FileFailures)` if any file was left out of the migration.
    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::FileFailures(self.failures))
        }
    }

    fn materialize(&mut self, atomic: AtomicCommit) -> Commit {
        let mut files = Vec::with_capacity(atomic.changes.len());
        for change in atomic.changes {
            let Some(&idx) = self.index.get(change.path.as_str()) else {
                continue;
            };
            if self.broken.contains(&idx) {
                continue;
            }
            let content = match change.action {
                Action::Delete => None,
                Action::Add | Action::Modify => {
                    let file = &self.files[idx];
                    let cache = self.cache.entry(idx).or_default();
                    match graph::reconstruct(&file.rcs, &change.revision, cache) {
                        Ok(content) => Some(content),
                        Err(error) => {
                            tracing::error!(path = %file.path, revision = %change.revision, %error, "dropping file from migration");
                            self.broken.insert(idx);
                            self.cache.remove(&idx);
                            self.failures.push(FileFailure {
                                path: file.source.clone(),
                                error,
                            });
                            continue;
                        }
                    }
                }
            };
            files.push(FileChange {
                path: change.path,
                revision: change.revision,
                action: change.action,
                executable: change.executable,
                content,
            });
        }
        Commit {
            id: atomic.id,
            author: atomic.author,
            timestamp: atomic.timestamp,
            branch: atomic.branch,
            message: atomic.message,
            files,
        }
    }
}

impl Iterator for CommitIter<'_> {
    type Item = Commit;

    fn next(&mut self) -> Option<Commit> {
        loop {
            let atomic = self.pending.next()?;
            let commit = self.materialize(atomic);
            if !commit.files.is_empty() {
                return Some(commit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_before_validate_are_rejected() {
        let mut reader = CvsReader::new("/nonexistent", MigrationConfig::default());
        assert!(matches!(
            reader.commits(&NoProgress),
            Err(Error::InvalidState { operation: "commits", .. })
        ));
        assert!(matches!(reader.branches(), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn closed_reader_rejects_everything() {
        let mut reader = CvsReader::new("/nonexistent", MigrationConfig::default());
        reader.close().unwrap();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(matches!(reader.validate(), Err(Error::ClosedRepository)));
        assert!(matches!(reader.tags(), Err(Error::ClosedRepository)));
        assert!(matches!(reader.close(), Err(Error::ClosedRepository)));
    }

    #[test]
    fn invalid_root_stays_unopened() {
        let mut reader = CvsReader::new("/nonexistent/path", MigrationConfig::default());
        assert!(matches!(reader.validate(), Err(Error::InvalidRepository { .. })));
        assert_eq!(reader.state(), ReaderState::Unopened);
    }
}
