// src/analyzer.rs

use crate::authors::AuthorSet;
use crate::config::MigrationConfig;
use crate::error::{Error, FileFailure, Result};
use crate::extract::{self, FileHistory};
use crate::graph;
use crate::model::RcsFile;
use crate::progress::{CancelToken, Progress};
use crate::rcs;
use crate::symbols::SymbolIndex;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// One RCS file, decoded and walked
#[derive(Debug)]
pub struct ParsedFile {
    /// Path of the working file, e.g. `src/main.c`
    pub path: String,
    /// Path of the `,v` file on disk
    pub source: PathBuf,
    pub rcs: RcsFile,
    pub history: FileHistory,
    pub executable: bool,
}

/// Everything the per-file phase produced for a repository
#[derive(Debug, Default)]
pub struct Analysis {
    pub files: Vec<ParsedFile>,
    pub failures: Vec<FileFailure>,
    pub symbols: SymbolIndex,
    pub authors: AuthorSet,
}

/// All `,v` files below `root` in path order, leaving out `CVSROOT/`.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_type().is_dir() && e.file_name() == "CVSROOT"));
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(source) => Error::io(path, source),
                None => Error::InvalidRepository {
                    path,
                    reason: "filesystem loop".into(),
                },
            }
        })?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(",v") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Working-file path for an RCS file: `,v` dropped and an `Attic/` parent skipped.
pub fn logical_path(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if let Some(name) = parts.last_mut() {
        if let Some(stripped) = name.strip_suffix(",v") {
            *name = stripped.to_string();
        }
    }
    if parts.len() >= 2 && parts[parts.len() - 2] == "Attic" {
        parts.remove(parts.len() - 2);
    }
    parts.join("/")
}

/// Reads a file, retrying once on errors that may be transient.
pub fn read_with_retry(path: &Path) -> Result<Vec<u8>> {
    retry_once(path, |p| fs::read(p))
}

fn retry_once(path: &Path, read: impl Fn(&Path) -> io::Result<Vec<u8>>) -> Result<Vec<u8>> {
    match read(path) {
        Ok(data) => Ok(data),
        Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            tracing::warn!(path = %path.display(), error = %e, "read failed, retrying once");
            read(path).map_err(|e| Error::io(path, e))
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Whether `file` sits in an `Attic/` directory below `root`.
fn in_attic(root: &Path, file: &Path) -> bool {
    file.strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "Attic")
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

/// Decodes, verifies and walks one RCS file.
pub fn load_file(root: &Path, source: &Path) -> Result<ParsedFile> {
    let data = read_with_retry(source)?;
    let rcs = rcs::parse(&data)?;
    let revisions = graph::verify(&rcs)?;
    let path = logical_path(root, source);
    let executable = is_executable(source);
    let history = extract::extract(&path, &rcs, executable)?;
    tracing::debug!(%path, revisions, events = history.events.len(), "loaded RCS file");
    Ok(ParsedFile {
        path,
        source: source.to_path_buf(),
        rcs,
        history,
        executable,
    })
}

/// Checks that `root` is a directory holding at least one readable RCS file.
pub fn validate(root: &Path) -> Result<usize> {
    let invalid = |reason: &str| Error::InvalidRepository {
        path: root.to_path_buf(),
        reason: reason.to_string(),
    };
    if !root.is_dir() {
        return Err(invalid("not a directory"));
    }
    let files = discover(root)?;
    if files.is_empty() {
        return Err(invalid("no RCS (,v) files found"));
    }
    let parseable = files
        .iter()
        .any(|f| read_with_retry(f).and_then(|data| rcs::parse(&data)).is_ok());
    if !parseable {
        return Err(invalid("none of the RCS files could be parsed"));
    }
    Ok(files.len())
}

/// Runs the per-file phase over every RCS file in parallel. Files that fail
/// are collected in `failures`; the rest of the repository is still analyzed.
pub fn analyze(
    root: &Path,
    config: &MigrationConfig,
    progress: &dyn Progress,
    cancel: &CancelToken,
) -> Result<Analysis> {
    // 1. Collect all RCS files
    let sources = discover(root)?;
    tracing::info!(root = %root.display(), files = sources.len(), "analyzing CVS repository");
    progress.describe("Reading RCS files");

    // 2. Decode and walk them on the worker pool
    let run = || -> Vec<Result<ParsedFile>> {
        sources
            .par_iter()
            .map(|source| {
                cancel.check()?;
                let result = load_file(root, source);
                progress.advance(1);
                result
            })
            .collect()
    };
    let results = if config.workers > 0 {
        match rayon::ThreadPoolBuilder::new().num_threads(config.workers).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                tracing::warn!(error = %e, "could not build worker pool, using the global one");
                run()
            }
        }
    } else {
        run()
    };
    cancel.check()?;

    // 3. Merge per-file results, live copies ahead of Attic ones
    let mut merged: Vec<_> = sources.into_iter().zip(results).collect();
    merged.sort_by_key(|(source, _)| in_attic(root, source));
    let mut analysis = Analysis::default();
    let mut live: HashSet<String> = HashSet::new();
    for (source, result) in merged {
        match result {
            Ok(file) => {
                if !live.insert(file.path.clone()) {
                    tracing::warn!(path = %file.path, source = %source.display(), "file exists both live and in the Attic, skipping the Attic copy");
                    continue;
                }
                analysis.symbols.add_file(&file.path, &file.rcs.header);
                for event in &file.history.events {
                    analysis.authors.add(&event.author);
                }
                analysis.files.push(file);
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(error) => {
                tracing::error!(path = %source.display(), %error, "skipping file");
                analysis.failures.push(FileFailure { path: source, error });
            }
        }
    }
    tracing::info!(
        files = analysis.files.len(),
        failed = analysis.failures.len(),
        "per-file analysis complete"
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::cell::Cell;

    #[test]
    fn attic_and_suffix_are_removed() {
        let root = Path::new("/repo/module");
        assert_eq!(logical_path(root, Path::new("/repo/module/src/main.c,v")), "src/main.c");
        assert_eq!(logical_path(root, Path::new("/repo/module/src/Attic/old.c,v")), "src/old.c");
        assert_eq!(logical_path(root, Path::new("/repo/module/Attic/top,v")), "top");
    }

    #[test]
    fn discover_skips_cvsroot_and_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("CVSROOT")).unwrap();
        fs::create_dir_all(root.join("src/Attic")).unwrap();
        fs::write(root.join("CVSROOT/loginfo,v"), "").unwrap();
        fs::write(root.join("src/a.c,v"), "").unwrap();
        fs::write(root.join("src/Attic/b.c,v"), "").unwrap();
        fs::write(root.join("src/notes.txt"), "").unwrap();

        let found: Vec<_> = discover(root)
            .unwrap()
            .iter()
            .map(|p| logical_path(root, p))
            .collect();
        assert_eq!(found, ["src/b.c", "src/a.c"]);
    }

    const README: &str = "head 1.1;\naccess;\nsymbols;\nlocks;\n\n\
                          1.1\ndate 2001.01.01.00.00.00; author AUTHOR; state Exp;\nbranches;\nnext ;\n\n\
                          desc\n@@\n\n1.1\nlog\n@x@\ntext\n@readme\n@\n";

    #[test]
    fn live_copy_wins_over_attic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Attic")).unwrap();
        fs::write(root.join("README,v"), README.replace("AUTHOR", "live")).unwrap();
        fs::write(root.join("Attic/README,v"), README.replace("AUTHOR", "gone")).unwrap();

        let analysis = analyze(root, &MigrationConfig::default(), &NoProgress, &CancelToken::new()).unwrap();
        assert_eq!(analysis.files.len(), 1);
        assert!(!in_attic(root, &analysis.files[0].source));
        assert_eq!(analysis.files[0].history.events[0].author, "live");
        assert_eq!(analysis.authors.list(), ["live"]);
    }

    #[test]
    fn transient_read_errors_are_retried_once() {
        let calls = Cell::new(0);
        let data = retry_once(Path::new("f,v"), |_| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(io::Error::from(ErrorKind::Interrupted))
            } else {
                Ok(b"ok".to_vec())
            }
        })
        .unwrap();
        assert_eq!(data, b"ok");
        assert_eq!(calls.get(), 2);

        calls.set(0);
        let err = retry_once(Path::new("f,v"), |_| {
            calls.set(calls.get() + 1);
            Err(io::Error::from(ErrorKind::TimedOut))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(calls.get(), 2);

        calls.set(0);
        let err = retry_once(Path::new("f,v"), |_| {
            calls.set(calls.get() + 1);
            Err(io::Error::from(ErrorKind::NotFound))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn validate_rejects_missing_and_empty_roots() {
        assert!(matches!(
            validate(Path::new("/nonexistent/path")),
            Err(Error::InvalidRepository { .. })
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(validate(dir.path()), Err(Error::InvalidRepository { .. })));
        fs::write(dir.path().join("junk,v"), "not rcs").unwrap();
        assert!(matches!(validate(dir.path()), Err(Error::InvalidRepository { .. })));
    }
}
