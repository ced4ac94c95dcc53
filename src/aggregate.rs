// src/aggregate.rs
//
// Clusters the repository-wide stream of change events into atomic commits.
// Two independent commits by one author with the same message inside the
// fuse window cannot be told apart from one commit and are merged.

use crate::config::{CommitTime, MigrationConfig};
use crate::error::Result;
use crate::model::{Action, AtomicCommit, ChangeEvent, Timestamp};
use crate::progress::{CancelToken, Progress};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct ClusterPolicy {
    pub fuse_window: chrono::Duration,
    pub branch_in_key: bool,
    pub use_commitid: bool,
    pub commit_time: CommitTime,
    pub large_commit_threshold: usize,
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        ClusterPolicy::from(&MigrationConfig::default())
    }
}

impl From<&MigrationConfig> for ClusterPolicy {
    fn from(config: &MigrationConfig) -> Self {
        ClusterPolicy {
            fuse_window: config.fuse_window(),
            branch_in_key: config.branch_in_key,
            use_commitid: config.use_commitid,
            commit_time: config.commit_time,
            large_commit_threshold: config.large_commit_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClusterKey {
    author: String,
    branch: Option<String>,
    message: String,
    commitid: Option<String>,
}

impl ClusterKey {
    fn of(event: &ChangeEvent, policy: &ClusterPolicy) -> Self {
        ClusterKey {
            author: event.author.clone(),
            branch: policy.branch_in_key.then(|| event.branch.clone()),
            message: event.message.clone(),
            commitid: if policy.use_commitid {
                event.commitid.clone()
            } else {
                None
            },
        }
    }
}

struct Cluster {
    seq: usize,
    last: Timestamp,
    events: Vec<ChangeEvent>,
    /// Path to whether it was deleted in this cluster
    deletes: HashMap<String, bool>,
}

impl Cluster {
    /// A deletion and a non-deletion of the same path never share a commit.
    fn conflicts(&self, event: &ChangeEvent) -> bool {
        self.deletes
            .get(&event.path)
            .is_some_and(|&deleted| deleted != (event.action == Action::Delete))
    }

    fn push(&mut self, event: ChangeEvent) {
        self.last = self.last.max(event.timestamp);
        self.deletes
            .insert(event.path.clone(), event.action == Action::Delete);
        self.events.push(event);
    }
}

/// Orders events by time, breaking ties on author, path and revision.
pub fn sort_events(events: &mut [ChangeEvent]) {
    events.sort_by(|a, b| {
        (a.timestamp, &a.author, &a.path, &a.revision).cmp(&(b.timestamp, &b.author, &b.path, &b.revision))
    });
}

struct Aggregator<'a> {
    policy: &'a ClusterPolicy,
    cancel: &'a CancelToken,
    progress: &'a dyn Progress,
    open: HashMap<ClusterKey, Cluster>,
    /// Open clusters by (last event time, creation order)
    by_last: BTreeMap<(Timestamp, usize), ClusterKey>,
    closed: Vec<(usize, AtomicCommit)>,
    next_seq: usize,
}

impl<'a> Aggregator<'a> {
    fn close(&mut self, key: &ClusterKey) -> Result<()> {
        self.cancel.check()?;
        let Some(cluster) = self.open.remove(key) else {
            return Ok(());
        };
        self.by_last.remove(&(cluster.last, cluster.seq));

        let timestamp = match self.policy.commit_time {
            CommitTime::Earliest => cluster.events.iter().map(|e| e.timestamp).min(),
            CommitTime::Latest => cluster.events.iter().map(|e| e.timestamp).max(),
        }
        .unwrap_or(cluster.last);
        let first = &cluster.events[0];
        if cluster.events.len() > self.policy.large_commit_threshold {
            tracing::info!(
                author = %first.author,
                files = cluster.events.len(),
                %timestamp,
                "unusually large commit; check that the fuse window did not merge unrelated commits"
            );
        }
        let commit = AtomicCommit {
            id: String::new(),
            author: first.author.clone(),
            timestamp,
            branch: first.branch.clone(),
            message: first.message.clone(),
            changes: cluster.events,
        };
        self.closed.push((cluster.seq, commit));
        self.progress.advance(1);
        Ok(())
    }

    /// Closes, oldest first, every cluster the fuse window has moved past.
    fn expire(&mut self, now: Timestamp) -> Result<()> {
        while let Some((&(last, _), key)) = self.by_last.first_key_value() {
            if last + self.policy.fuse_window >= now {
                break;
            }
            let key = key.clone();
            self.close(&key)?;
        }
        Ok(())
    }

    fn add(&mut self, event: ChangeEvent) -> Result<()> {
        self.expire(event.timestamp)?;
        let key = ClusterKey::of(&event, self.policy);
        if self.open.get(&key).is_some_and(|c| c.conflicts(&event)) {
            self.close(&key)?;
        }

        let seq = self.next_seq;
        let started = event.timestamp;
        let cluster = self.open.entry(key.clone()).or_insert_with(|| Cluster {
            seq,
            last: started,
            events: Vec::new(),
            deletes: HashMap::new(),
        });
        if cluster.seq == seq {
            self.next_seq += 1;
        } else {
            self.by_last.remove(&(cluster.last, cluster.seq));
        }
        cluster.push(event);
        self.by_last.insert((cluster.last, cluster.seq), key);
        Ok(())
    }
}

/// Groups change events into atomic commits, returned in ascending timestamp order.
pub fn aggregate(
    mut events: Vec<ChangeEvent>,
    policy: &ClusterPolicy,
    cancel: &CancelToken,
    progress: &dyn Progress,
) -> Result<Vec<AtomicCommit>> {
    sort_events(&mut events);
    progress.describe("Grouping changes into commits");

    let mut aggregator = Aggregator {
        policy,
        cancel,
        progress,
        open: HashMap::new(),
        by_last: BTreeMap::new(),
        closed: Vec::new(),
        next_seq: 0,
    };
    for event in events {
        aggregator.add(event)?;
    }
    while let Some((_, key)) = aggregator.by_last.first_key_value() {
        let key = key.clone();
        aggregator.close(&key)?;
    }

    let mut closed = aggregator.closed;
    closed.sort_by_key(|(seq, commit)| (commit.timestamp, *seq));
    Ok(closed
        .into_iter()
        .enumerate()
        .map(|(i, (_, mut commit))| {
            commit.id = format!("cvs-{:06}", i + 1);
            commit
        })
        .collect())
}
