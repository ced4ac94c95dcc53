// src/lib.rs

pub mod aggregate;
pub mod analyzer;
pub mod authors;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod model;
pub mod progress;
pub mod rcs;
pub mod reader;
pub mod revision;
pub mod symbols;
pub mod writer;

pub use config::MigrationConfig;
pub use error::{Error, FileFailure, Result};
pub use model::{Action, AtomicCommit, Branch, ChangeEvent, Commit, FileChange, Tag};
pub use reader::{CommitIter, CvsReader, ReaderState};
pub use revision::{RevisionId, RevisionKind};
pub use writer::{GitWriter, TargetWriter};
