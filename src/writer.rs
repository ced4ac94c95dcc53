// src/writer.rs

use crate::authors::AuthorMap;
use crate::error::Result;
use crate::model::{Branch, Commit, Tag};
use crate::revision::RevisionId;
use git2::{IndexEntry, IndexTime, ObjectType, Oid, Repository, Signature, TreeWalkMode, TreeWalkResult};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Consumes the commit stream and materializes it in a target repository.
pub trait TargetWriter {
    /// Declares a branch so its first commit can fork from the right place.
    fn create_branch(&mut self, branch: &Branch) -> Result<()>;
    fn apply_commit(&mut self, commit: &Commit) -> Result<()>;
    /// Called once all commits have been applied.
    fn create_tag(&mut self, tag: &Tag) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

type Snapshot = BTreeMap<String, (Oid, bool)>;

#[derive(Debug, Default, Clone)]
struct Head {
    tip: Option<Oid>,
    files: Snapshot,
}

pub struct GitWriter {
    repo: Repository,
    authors: AuthorMap,
    trunk: String,
    /// Keyed by CVS branch name, `""` for trunk
    heads: HashMap<String, Head>,
    declared: BTreeMap<String, Branch>,
    /// File revision to (application order, commit)
    applied: HashMap<(String, RevisionId), (usize, Oid)>,
    sequence: usize,
}

/// Replaces characters git does not accept in ref names.
pub fn sanitize_ref(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.replace("..", "__").replace("@{", "_{");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '/').to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else if cleaned.ends_with(".lock") {
        format!("{cleaned}_")
    } else {
        cleaned
    }
}

impl GitWriter {
    pub fn init(path: &Path, authors: AuthorMap, trunk: &str) -> Result<Self> {
        let repo = Repository::init(path)?;
        repo.set_head(&format!("refs/heads/{}", sanitize_ref(trunk)))?;
        Ok(GitWriter {
            repo,
            authors,
            trunk: trunk.to_string(),
            heads: HashMap::new(),
            declared: BTreeMap::new(),
            applied: HashMap::new(),
            sequence: 0,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn ref_for(&self, branch: &str) -> String {
        if branch.is_empty() {
            format!("refs/heads/{}", sanitize_ref(&self.trunk))
        } else {
            format!("refs/heads/{}", sanitize_ref(branch))
        }
    }

    /// The most recently applied commit containing any of the given file revisions.
    fn latest_containing<'a>(&self, revisions: impl IntoIterator<Item = (&'a String, &'a RevisionId)>) -> Option<Oid> {
        revisions
            .into_iter()
            .filter_map(|(path, rev)| self.applied.get(&(path.clone(), rev.clone())))
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, oid)| *oid)
    }

    fn snapshot(&self, oid: Oid) -> Result<Snapshot> {
        let tree = self.repo.find_commit(oid)?.tree()?;
        let mut files = Snapshot::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    files.insert(format!("{root}{name}"), (entry.id(), entry.filemode() == 0o100755));
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(files)
    }

    /// Where a branch without commits so far starts.
    fn fork_point(&self, branch: &str) -> Result<Head> {
        let trunk = self.heads.get("").cloned().unwrap_or_default();
        if branch.is_empty() {
            return Ok(trunk);
        }
        let fork = self
            .declared
            .get(branch)
            .and_then(|b| self.latest_containing(&b.points));
        match fork {
            Some(oid) => Ok(Head {
                tip: Some(oid),
                files: self.snapshot(oid)?,
            }),
            None => {
                tracing::debug!(branch, "no fork point known, branching from the trunk tip");
                Ok(trunk)
            }
        }
    }

    fn write_tree(&self, files: &Snapshot) -> Result<Oid> {
        let mut index = git2::Index::new()?;
        for (path, (oid, executable)) in files {
            index.add(&IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: if *executable { 0o100755 } else { 0o100644 },
                uid: 0,
                gid: 0,
                file_size: 0,
                id: *oid,
                flags: path.len().min(0xfff) as u16,
                flags_extended: 0,
                path: path.as_bytes().to_vec(),
            })?;
        }
        Ok(index.write_tree_to(&self.repo)?)
    }
}

impl TargetWriter for GitWriter {
    fn create_branch(&mut self, branch: &Branch) -> Result<()> {
        self.declared.insert(branch.name.clone(), branch.clone());
        Ok(())
    }

    fn apply_commit(&mut self, commit: &Commit) -> Result<()> {
        let mut head = match self.heads.remove(&commit.branch) {
            Some(head) => head,
            None => self.fork_point(&commit.branch)?,
        };
        for file in &commit.files {
            match &file.content {
                Some(content) => {
                    let oid = self.repo.blob(content)?;
                    head.files.insert(file.path.clone(), (oid, file.executable));
                }
                None => {
                    head.files.remove(&file.path);
                }
            }
        }

        let tree = self.repo.find_tree(self.write_tree(&head.files)?)?;
        let (name, email) = self.authors.get(&commit.author);
        let signature = Signature::new(&name, &email, &git2::Time::new(commit.timestamp.timestamp(), 0))?;
        let parent = head.tip.map(|oid| self.repo.find_commit(oid)).transpose()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(None, &signature, &signature, &commit.message, &tree, &parents)?;
        self.repo
            .reference(&self.ref_for(&commit.branch), oid, true, "cvs import")?;

        self.sequence += 1;
        for file in &commit.files {
            self.applied
                .insert((file.path.clone(), file.revision.clone()), (self.sequence, oid));
        }
        head.tip = Some(oid);
        self.heads.insert(commit.branch.clone(), head);
        tracing::debug!(id = %commit.id, %oid, branch = %commit.branch, "wrote commit");
        Ok(())
    }

    fn create_tag(&mut self, tag: &Tag) -> Result<()> {
        match self.latest_containing(&tag.revisions) {
            Some(oid) => {
                self.repo
                    .reference(&format!("refs/tags/{}", sanitize_ref(&tag.name)), oid, true, "cvs tag")?;
            }
            None => tracing::warn!(tag = %tag.name, "no migrated commit carries this tag, skipping"),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let empty: Vec<String> = self
            .declared
            .keys()
            .filter(|name| !self.heads.contains_key(*name))
            .cloned()
            .collect();
        for name in empty {
            match self.fork_point(&name)?.tip {
                Some(oid) => {
                    self.repo.reference(&self.ref_for(&name), oid, true, "cvs branch")?;
                }
                None => tracing::warn!(branch = %name, "branch has no commits and no fork point, skipping"),
            }
        }
        Ok(())
    }
}
