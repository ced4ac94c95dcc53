// src/revision.rs

use std::fmt;
use std::str::FromStr;

/// Where a revision number sits in the RCS numbering scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionKind {
    Trunk,
    Branch,
    Tag,
}

/// A dotted-decimal RCS revision number, kept as its parsed components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionId(Vec<u32>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRevisionError(pub String);

impl fmt::Display for ParseRevisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid revision number '{}'", self.0)
    }
}

impl std::error::Error for ParseRevisionError {}

impl RevisionId {
    pub fn new(components: Vec<u32>) -> Self {
        RevisionId(components)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn dots(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// CVS placeholder form `x.y.0.z` for a branch without commits.
    pub fn is_magic(&self) -> bool {
        let n = self.0.len();
        n >= 4 && n % 2 == 0 && self.0[n - 2] == 0
    }

    /// `Trunk` for exactly one dot, `Branch` for a `.0.` component or three
    /// or more dots, `Tag` for everything else.
    pub fn classify(&self) -> RevisionKind {
        let has_zero = self.0.len() > 2 && self.0[1..self.0.len() - 1].contains(&0);
        if has_zero || self.dots() >= 3 {
            RevisionKind::Branch
        } else if self.dots() == 1 {
            RevisionKind::Trunk
        } else {
            RevisionKind::Tag
        }
    }

    pub fn is_trunk(&self) -> bool {
        self.0.len() == 2
    }

    /// Whether a symbol pointing here names a branch rather than a tag: a magic
    /// number, or a branch number proper (odd component count, e.g. `1.1.1`).
    pub fn is_branch_symbol(&self) -> bool {
        self.is_magic() || (self.0.len() >= 3 && self.0.len() % 2 == 1)
    }

    /// The branch number a symbol designates: `1.2.0.2` and `1.2.2` both give `1.2.2`.
    pub fn branch_number(&self) -> Option<RevisionId> {
        if self.is_magic() {
            let n = self.0.len();
            let mut parts = self.0[..n - 2].to_vec();
            parts.push(self.0[n - 1]);
            Some(RevisionId(parts))
        } else if self.0.len() >= 3 && self.0.len() % 2 == 1 {
            Some(self.clone())
        } else {
            None
        }
    }

    /// The branch a revision lives on: `1.2.2.1` is on `1.2.2`. Trunk revisions have none.
    pub fn containing_branch(&self) -> Option<RevisionId> {
        if self.0.len() >= 4 && self.0.len() % 2 == 0 {
            Some(RevisionId(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    /// The revision a branch sprouts from: `1.2` for both `1.2.2` and `1.2.2.1`.
    pub fn branch_point(&self) -> Option<RevisionId> {
        match self.0.len() {
            n if n >= 3 && n % 2 == 1 => Some(RevisionId(self.0[..n - 1].to_vec())),
            n if n >= 4 => Some(RevisionId(self.0[..n - 2].to_vec())),
            _ => None,
        }
    }

    /// Component-wise prefix test: `1.2.2` is a prefix of `1.2.2.1`, not of `1.2.22.1`.
    pub fn is_prefix_of(&self, other: &RevisionId) -> bool {
        self.0.len() <= other.0.len() && other.0.starts_with(&self.0)
    }
}

impl FromStr for RevisionId {
    type Err = ParseRevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseRevisionError(s.to_string()));
        }
        s.split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(RevisionId)
            .map_err(|_| ParseRevisionError(s.to_string()))
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
