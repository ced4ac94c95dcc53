// src/extract.rs

use crate::error::{Error, Result};
use crate::model::{Action, ChangeEvent, Delta, RcsFile};
use crate::revision::RevisionId;
use crate::symbols;
use std::collections::HashSet;

/// Change events of one file, plus recoverable problems met on the way.
#[derive(Debug, Default)]
pub struct FileHistory {
    pub events: Vec<ChangeEvent>,
    pub warnings: Vec<Error>,
}

struct Visit {
    revision: RevisionId,
    branch: String,
    /// The delta this one was reached from along a branch.
    from: Option<RevisionId>,
}

fn action(file: &RcsFile, delta: &Delta, from: Option<&RevisionId>) -> Option<Action> {
    let predecessor = if delta.revision.is_trunk() {
        delta.next.as_ref()
    } else {
        from
    };
    let existed = predecessor
        .and_then(|rev| file.delta(rev))
        .is_some_and(|prev| !prev.is_dead());
    match (delta.is_dead(), existed) {
        // Removing a file that never existed here, e.g. the dead 1.1 CVS
        // writes for a file first added on a branch.
        (true, false) => None,
        (true, true) => Some(Action::Delete),
        (false, false) => Some(Action::Add),
        (false, true) => Some(Action::Modify),
    }
}

/// Walks the revision tree depth first from the head, each delta before its
/// branches and the branches before `next`.
pub fn extract(path: &str, file: &RcsFile, executable: bool) -> Result<FileHistory> {
    let mut history = FileHistory::default();
    let Some(head) = file.header.head.clone() else {
        return Ok(history);
    };

    let mut seen = HashSet::new();
    let mut stack = vec![Visit {
        revision: head,
        branch: String::new(),
        from: None,
    }];

    while let Some(visit) = stack.pop() {
        if !seen.insert(visit.revision.clone()) {
            return Err(Error::BrokenChain {
                revision: visit.revision.to_string(),
                reason: "revision reached twice; the graph has a cycle".into(),
            });
        }
        let delta = file.delta(&visit.revision).ok_or_else(|| Error::BrokenChain {
            revision: visit
                .from
                .as_ref()
                .unwrap_or(&visit.revision)
                .to_string(),
            reason: format!("points to missing revision {}", visit.revision),
        })?;

        if let Some(action) = action(file, delta, visit.from.as_ref()) {
            history.events.push(ChangeEvent {
                path: path.to_string(),
                revision: delta.revision.clone(),
                author: delta.author.clone(),
                timestamp: delta.date,
                message: String::from_utf8_lossy(&delta.log).into_owned(),
                branch: visit.branch.clone(),
                action,
                commitid: delta.commitid.clone(),
                executable,
            });
        }

        if let Some(next) = &delta.next {
            let from = (!next.is_trunk()).then(|| delta.revision.clone());
            stack.push(Visit {
                revision: next.clone(),
                branch: visit.branch.clone(),
                from,
            });
        }
        for branch_head in delta.branches.iter().rev() {
            let name = match symbols::branch_name(&file.header, branch_head) {
                Some(name) => name.to_string(),
                None => {
                    tracing::warn!(path, revision = %branch_head, "branch has no symbol, migrating it as trunk");
                    history.warnings.push(Error::UnresolvedBranch {
                        revision: branch_head.to_string(),
                    });
                    String::new()
                }
            };
            stack.push(Visit {
                revision: branch_head.clone(),
                branch: name,
                from: Some(delta.revision.clone()),
            });
        }
    }
    Ok(history)
}
