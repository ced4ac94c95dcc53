// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed RCS header at byte {offset}: {reason}")]
    MalformedHeader { offset: usize, reason: String },

    #[error("malformed RCS delta at byte {offset}: {reason}")]
    MalformedDelta { offset: usize, reason: String },

    #[error("broken revision chain at {revision}: {reason}")]
    BrokenChain { revision: String, reason: String },

    #[error("cannot apply diff of revision {revision}: {reason}")]
    InvalidDiff { revision: String, reason: String },

    /// Only ever reported as a warning; the events are kept with an empty branch name.
    #[error("no branch symbol for branch head {revision}")]
    UnresolvedBranch { revision: String },

    #[error("invalid CVS repository {}: {reason}", path.display())]
    InvalidRepository { path: PathBuf, reason: String },

    #[error("repository reader is closed")]
    ClosedRepository,

    #[error("{operation} is not allowed while the reader is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("migration cancelled")]
    Cancelled,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("target repository error: {0}")]
    Target(#[from] git2::Error),

    #[error("{} file(s) could not be migrated", .0.len())]
    FileFailures(Vec<FileFailure>),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that exclude one file but leave the rest of the migration intact.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader { .. }
                | Error::MalformedDelta { .. }
                | Error::BrokenChain { .. }
                | Error::InvalidDiff { .. }
                | Error::Io { .. }
        )
    }
}

/// One RCS file excluded from the migration, with the reason.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

impl std::fmt::Display for FileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_errors_are_distinguished_from_global_ones() {
        let parse = Error::MalformedDelta {
            offset: 12,
            reason: "expected ';'".into(),
        };
        assert!(parse.is_per_file());
        assert!(!Error::ClosedRepository.is_per_file());
        assert!(!Error::Cancelled.is_per_file());
    }

    #[test]
    fn aggregate_message_counts_failures() {
        let failures = vec![
            FileFailure {
                path: "a,v".into(),
                error: Error::ClosedRepository,
            },
            FileFailure {
                path: "b,v".into(),
                error: Error::Cancelled,
            },
        ];
        let err = Error::FileFailures(failures);
        assert_eq!(err.to_string(), "2 file(s) could not be migrated");
    }
}
