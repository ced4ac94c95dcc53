// src/authors.rs

use crate::config::DEFAULT_EMAIL_DOMAIN;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Splits `Full Name <email>` into its parts.
pub fn parse_author(entry: &str) -> Option<(String, String)> {
    let entry = entry.trim();
    let open = entry.find('<')?;
    let close = entry.rfind('>')?;
    if close != entry.len() - 1 || close < open {
        return None;
    }
    let name = entry[..open].trim();
    let email = entry[open + 1..close].trim();
    if name.is_empty() || email.is_empty() || !email.contains('@') {
        return None;
    }
    Some((name.to_string(), email.to_string()))
}

/// Maps CVS usernames to a display name and email.
#[derive(Debug, Clone)]
pub struct AuthorMap {
    mapping: HashMap<String, (String, String)>,
    default_domain: String,
}

impl Default for AuthorMap {
    fn default() -> Self {
        AuthorMap::new(&BTreeMap::new(), DEFAULT_EMAIL_DOMAIN)
    }
}

impl AuthorMap {
    /// Entries that do not parse fall back to the default identity.
    pub fn new(entries: &BTreeMap<String, String>, default_domain: &str) -> Self {
        let mut mapping = HashMap::new();
        for (username, entry) in entries {
            match parse_author(entry) {
                Some(identity) => {
                    mapping.insert(username.clone(), identity);
                }
                None => tracing::warn!(username = %username, entry = %entry, "ignoring author entry, expected 'Name <email>'"),
            }
        }
        AuthorMap {
            mapping,
            default_domain: default_domain.to_string(),
        }
    }

    pub fn get(&self, username: &str) -> (String, String) {
        match self.mapping.get(username) {
            Some((name, email)) => (name.clone(), email.clone()),
            None => (username.to_string(), format!("{username}@{}", self.default_domain)),
        }
    }
}

/// Every CVS username seen, for writing an author map template.
#[derive(Debug, Default)]
pub struct AuthorSet {
    authors: BTreeSet<String>,
}

impl AuthorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, username: &str) {
        if !self.authors.contains(username) {
            self.authors.insert(username.to_string());
        }
    }

    pub fn list(&self) -> Vec<String> {
        self.authors.iter().cloned().collect()
    }

    /// An `[authors]` table to paste into the configuration file.
    pub fn template(&self, default_domain: &str) -> String {
        let mut out = String::from("[authors]\n");
        for username in &self.authors {
            let key = if username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                username.clone()
            } else {
                format!("{username:?}")
            };
            out.push_str(&format!("{key} = \"{username} <{username}@{default_domain}>\"\n"));
        }
        out
    }
}
