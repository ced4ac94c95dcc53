// src/graph.rs
//
// Revision graph walks and content reconstruction. The head revision stores
// full text; every other trunk revision stores a reverse diff from the newer
// revision, and branch revisions store forward diffs from their predecessor.

use crate::error::{Error, Result};
use crate::model::{Delta, RcsFile};
use crate::revision::RevisionId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Reconstructed file contents of one RCS file, keyed by revision.
pub type ContentCache = HashMap<RevisionId, Arc<[u8]>>;

fn broken(revision: &RevisionId, reason: impl Into<String>) -> Error {
    Error::BrokenChain {
        revision: revision.to_string(),
        reason: reason.into(),
    }
}

fn invalid(revision: &RevisionId, reason: impl Into<String>) -> Error {
    Error::InvalidDiff {
        revision: revision.to_string(),
        reason: reason.into(),
    }
}

fn lookup<'f>(file: &'f RcsFile, revision: &RevisionId, from: &RevisionId) -> Result<&'f Delta> {
    file.delta(revision)
        .ok_or_else(|| broken(from, format!("points to missing revision {revision}")))
}

/// Splits into lines that keep their terminating `\n`; the last one may lack it.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

fn parse_command(line: &[u8]) -> Option<(u8, usize, usize)> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let (&op, rest) = line.split_first()?;
    let rest = std::str::from_utf8(rest).ok()?;
    let mut fields = rest.split(' ');
    let at = fields.next()?.parse().ok()?;
    let count = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((op, at, count))
}

/// Applies an RCS edit script to `source`.
///
/// Line numbers in `aL N` and `dL N` refer to `source`, and commands come in
/// ascending line order, so they are replayed with a single cursor over the
/// source lines.
pub fn apply_diff(source: &[u8], script: &[u8], revision: &RevisionId) -> Result<Vec<u8>> {
    let src = split_lines(source);
    let mut out = Vec::with_capacity(source.len() + script.len());
    let mut cursor = 0;
    let mut commands = split_lines(script).into_iter();

    while let Some(line) = commands.next() {
        let Some((op, at, count)) = parse_command(line) else {
            return Err(invalid(
                revision,
                format!("bad edit command '{}'", String::from_utf8_lossy(line).trim_end()),
            ));
        };
        match op {
            b'd' => {
                let start = at.checked_sub(1).filter(|&start| start >= cursor);
                let end = start
                    .and_then(|start| start.checked_add(count))
                    .filter(|&end| end <= src.len());
                let (Some(start), Some(end)) = (start, end) else {
                    return Err(invalid(
                        revision,
                        format!("d{at} {count} out of range (cursor {cursor}, {} lines)", src.len()),
                    ));
                };
                for l in &src[cursor..start] {
                    out.extend_from_slice(l);
                }
                cursor = end;
            }
            b'a' => {
                if at < cursor || at > src.len() {
                    return Err(invalid(
                        revision,
                        format!("a{at} {count} out of range (cursor {cursor}, {} lines)", src.len()),
                    ));
                }
                for l in &src[cursor..at] {
                    out.extend_from_slice(l);
                }
                cursor = at;
                for _ in 0..count {
                    let Some(inserted) = commands.next() else {
                        return Err(invalid(revision, format!("a{at} {count} runs past end of script")));
                    };
                    out.extend_from_slice(inserted);
                }
            }
            other => {
                return Err(invalid(revision, format!("unknown edit command '{}'", other as char)));
            }
        }
    }
    for l in &src[cursor..] {
        out.extend_from_slice(l);
    }
    Ok(out)
}

/// The revisions whose texts must be applied, in order, to get `target`:
/// head first, then down the trunk, then out along each enclosing branch.
pub fn path_to(file: &RcsFile, target: &RevisionId) -> Result<Vec<RevisionId>> {
    let head = file
        .header
        .head
        .as_ref()
        .ok_or_else(|| broken(target, "file has no head revision"))?;

    match target.containing_branch() {
        None if target.is_trunk() => {
            let mut path = Vec::new();
            let mut seen = HashSet::new();
            let mut current = head.clone();
            loop {
                if !seen.insert(current.clone()) {
                    return Err(broken(&current, "cycle in next chain"));
                }
                let delta = lookup(file, &current, path.last().unwrap_or(head))?;
                path.push(current.clone());
                if current == *target {
                    return Ok(path);
                }
                match &delta.next {
                    Some(next) => current = next.clone(),
                    None => return Err(broken(target, "not reachable from head")),
                }
            }
        }
        None => Err(broken(target, "not a revision number")),
        Some(branch) => {
            let point = target
                .branch_point()
                .ok_or_else(|| broken(target, "branch without branch point"))?;
            let mut path = path_to(file, &point)?;
            let start = lookup(file, &point, &point)?
                .branches
                .iter()
                .find(|b| b.containing_branch().as_ref() == Some(&branch))
                .cloned()
                .ok_or_else(|| broken(&point, format!("no branch {branch} listed")))?;

            let mut seen = HashSet::new();
            let mut current = start;
            let mut from = point;
            loop {
                if !seen.insert(current.clone()) {
                    return Err(broken(&current, "cycle in branch chain"));
                }
                let delta = lookup(file, &current, &from)?;
                path.push(current.clone());
                if current == *target {
                    return Ok(path);
                }
                match &delta.next {
                    Some(next) => {
                        from = current;
                        current = next.clone();
                    }
                    None => return Err(broken(target, format!("not reachable along branch {branch}"))),
                }
            }
        }
    }
}

/// Full content of `target`, reusing and filling `cache`.
pub fn reconstruct(file: &RcsFile, target: &RevisionId, cache: &mut ContentCache) -> Result<Arc<[u8]>> {
    if let Some(content) = cache.get(target) {
        return Ok(content.clone());
    }
    let path = path_to(file, target)?;
    let start = path.iter().rposition(|rev| cache.contains_key(rev));

    let (mut content, rest) = match start {
        Some(i) => (cache[&path[i]].clone(), &path[i + 1..]),
        None => {
            let head = &path[0];
            let text: Arc<[u8]> = Arc::from(lookup(file, head, head)?.text.as_slice());
            cache.insert(head.clone(), text.clone());
            (text, &path[1..])
        }
    };
    for rev in rest {
        let delta = lookup(file, rev, rev)?;
        content = Arc::from(apply_diff(&content, &delta.text, rev)?);
        cache.insert(rev.clone(), content.clone());
    }
    Ok(content)
}

/// Replays every revision once without keeping the results, so a file whose
/// graph or diffs are corrupt is rejected before any of it is migrated.
pub fn verify(file: &RcsFile) -> Result<usize> {
    let Some(head) = file.header.head.clone() else {
        return Ok(0);
    };
    let head_text: Arc<[u8]> = Arc::from(lookup(file, &head, &head)?.text.as_slice());

    let mut seen = HashSet::new();
    let mut stack: Vec<(RevisionId, RevisionId, Option<Arc<[u8]>>)> = vec![(head.clone(), head, None)];
    while let Some((rev, from, parent)) = stack.pop() {
        if !seen.insert(rev.clone()) {
            return Err(broken(&rev, "revision reached twice; the graph has a cycle"));
        }
        let delta = lookup(file, &rev, &from)?;
        let content = match parent {
            None => head_text.clone(),
            Some(parent) => Arc::from(apply_diff(&parent, &delta.text, &rev)?),
        };
        if let Some(next) = &delta.next {
            stack.push((next.clone(), rev.clone(), Some(content.clone())));
        }
        for branch in delta.branches.iter().rev() {
            stack.push((branch.clone(), rev.clone(), Some(content.clone())));
        }
    }
    Ok(seen.len())
}
