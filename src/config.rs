// src/config.rs

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_EMAIL_DOMAIN: &str = "users.noreply.cvs.example.org";

/// Which event of a cluster dates the resulting commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitTime {
    #[default]
    Earliest,
    Latest,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Largest gap, in seconds, between consecutive events of one commit
    pub fuse_window_secs: u64,
    /// Keep events of different branches apart
    pub branch_in_key: bool,
    /// Group by CVS commitid where both events carry one
    pub use_commitid: bool,
    pub commit_time: CommitTime,
    /// Commits touching more files than this are logged for review
    pub large_commit_threshold: usize,
    /// Per-file worker threads, 0 for one per core
    pub workers: usize,
    pub trunk_branch: String,
    pub default_email_domain: String,
    /// CVS username to `Full Name <email>`
    pub authors: BTreeMap<String, String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            fuse_window_secs: 300,
            branch_in_key: true,
            use_commitid: true,
            commit_time: CommitTime::Earliest,
            large_commit_threshold: 1000,
            workers: 0,
            trunk_branch: "master".to_string(),
            default_email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            authors: BTreeMap::new(),
        }
    }
}

impl MigrationConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: format!("failed to read: {e}"),
        })?;
        Self::from_toml(&contents).map_err(|reason| Error::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_toml(contents: &str) -> std::result::Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    pub fn fuse_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.fuse_window_secs.min(u32::MAX as u64) as i64)
    }
}
