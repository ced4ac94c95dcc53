// tests/migration.rs

use cvs_migrator::authors::AuthorMap;
use cvs_migrator::progress::NoProgress;
use cvs_migrator::{Action, CvsReader, Error, GitWriter, MigrationConfig, ReaderState, TargetWriter};
use std::fs;
use std::path::Path;

/// Trunk 1.1 -> 1.2 -> 1.3 with a FEATURE_X branch off 1.2.
const MAIN_C: &str = "head\t1.3;
access;
symbols
\tRELEASE_1_0:1.2
\tFEATURE_X:1.2.0.2;
locks; strict;
comment\t@ * @;


1.3
date\t2020.01.01.00.00.02;\tauthor alice;\tstate Exp;
branches;
next\t1.2;

1.2
date\t2020.01.01.00.00.01;\tauthor alice;\tstate Exp;
branches
\t1.2.2.1;
next\t1.1;

1.1
date\t2020.01.01.00.00.00;\tauthor alice;\tstate Exp;
branches;
next\t;

1.2.2.1
date\t2020.02.01.00.00.00;\tauthor bob;\tstate Exp;
branches;
next\t;


desc
@@


1.3
log
@fix
@
text
@a
b
c
@


1.2
log
@init
@
text
@d3 1
@


1.1
log
@init
@
text
@d2 1
@


1.2.2.1
log
@branch work
@
text
@a2 1
branch
@
";

/// Added with the first commit, removed later, so it lives in the Attic.
const OLD_C: &str = "head\t1.2;
access;
symbols;
locks; strict;


1.2
date\t2020.03.01.00.00.00;\tauthor alice;\tstate dead;
branches;
next\t1.1;

1.1
date\t2020.01.01.00.00.00;\tauthor alice;\tstate Exp;
branches;
next\t;


desc
@@


1.2
log
@remove old.c
@
text
@@


1.1
log
@init
@
text
@a0 1
old
@
";

fn fixture(root: &Path) {
    fs::create_dir_all(root.join("Attic")).unwrap();
    fs::create_dir_all(root.join("CVSROOT")).unwrap();
    fs::write(root.join("main.c,v"), MAIN_C).unwrap();
    fs::write(root.join("Attic/old.c,v"), OLD_C).unwrap();
    fs::write(root.join("CVSROOT/history,v"), "not an RCS file").unwrap();
}

fn read(repo: &git2::Repository, refname: &str, path: &str) -> Option<String> {
    let tree = repo.find_reference(refname).ok()?.peel_to_commit().ok()?.tree().ok()?;
    let entry = tree.get_path(Path::new(path)).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    Some(String::from_utf8_lossy(blob.content()).into_owned())
}

#[test]
fn reads_commits_branches_and_tags() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let mut reader = CvsReader::new(dir.path(), MigrationConfig::default());
    reader.validate().unwrap();
    assert_eq!(reader.state(), ReaderState::Validated);
    assert_eq!(reader.files_found(), 2);

    let branches = reader.branches().unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "FEATURE_X");
    assert_eq!(branches[0].points["main.c"].to_string(), "1.2");

    let tags = reader.tags().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "RELEASE_1_0");
    assert_eq!(reader.authors().unwrap(), ["alice", "bob"]);

    let mut commits = reader.commits(&NoProgress).unwrap();
    let all: Vec<_> = commits.by_ref().collect();
    assert!(commits.into_result().is_ok());

    let summary: Vec<(&str, &str, usize)> = all
        .iter()
        .map(|c| (c.message.as_str(), c.branch.as_str(), c.files.len()))
        .collect();
    assert_eq!(
        summary,
        [
            ("init\n", "", 3),
            ("fix\n", "", 1),
            ("branch work\n", "FEATURE_X", 1),
            ("remove old.c\n", "", 1),
        ]
    );
    assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["cvs-000001", "cvs-000002", "cvs-000003", "cvs-000004"]);

    let fix = &all[1].files[0];
    assert_eq!(fix.action, Action::Modify);
    assert_eq!(fix.content.as_deref(), Some(&b"a\nb\nc\n"[..]));
    let branch = &all[2].files[0];
    assert_eq!(branch.content.as_deref(), Some(&b"a\nb\nbranch\n"[..]));
    let removal = &all[3].files[0];
    assert_eq!(removal.path, "old.c");
    assert_eq!(removal.action, Action::Delete);
    assert!(removal.content.is_none());

    assert!(matches!(reader.commits(&NoProgress), Err(Error::InvalidState { .. })));
    reader.close().unwrap();
    assert!(matches!(reader.branches(), Err(Error::ClosedRepository)));
}

#[test]
fn corrupt_file_is_reported_and_others_migrate() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    fs::write(dir.path().join("broken.c,v"), "head\t1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate\tbogus;").unwrap();

    let mut reader = CvsReader::new(dir.path(), MigrationConfig::default());
    reader.validate().unwrap();
    assert_eq!(reader.prepare(&NoProgress).unwrap(), 1);

    let mut commits = reader.commits(&NoProgress).unwrap();
    assert_eq!(commits.by_ref().count(), 4);
    match commits.into_result() {
        Err(Error::FileFailures(failures)) => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].path.ends_with("broken.c,v"));
            assert!(failures[0].error.is_per_file());
        }
        other => panic!("expected file failures, got {other:?}"),
    }
}

#[test]
fn tight_window_splits_on_message() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.c,v"), MAIN_C).unwrap();
    let config = MigrationConfig::from_toml("fuse_window_secs = 5\n").unwrap();

    let mut reader = CvsReader::new(dir.path(), config);
    reader.validate().unwrap();
    let trunk: Vec<_> = reader
        .commits(&NoProgress)
        .unwrap()
        .filter(|c| c.branch.is_empty())
        .map(|c| (c.message, c.files.len()))
        .collect();
    assert_eq!(trunk, [("init\n".to_string(), 2), ("fix\n".to_string(), 1)]);
}

#[test]
fn migrates_into_git() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    fixture(source.path());

    let mut reader = CvsReader::new(source.path(), MigrationConfig::default());
    reader.validate().unwrap();
    let branches = reader.branches().unwrap();
    let tags = reader.tags().unwrap();

    let mut writer = GitWriter::init(target.path(), AuthorMap::default(), "master").unwrap();
    for branch in &branches {
        writer.create_branch(branch).unwrap();
    }
    let mut commits = reader.commits(&NoProgress).unwrap();
    for commit in commits.by_ref() {
        writer.apply_commit(&commit).unwrap();
    }
    commits.into_result().unwrap();
    for tag in &tags {
        writer.create_tag(tag).unwrap();
    }
    writer.finish().unwrap();
    reader.close().unwrap();

    let repo = writer.repository();
    assert_eq!(read(repo, "refs/heads/master", "main.c").as_deref(), Some("a\nb\nc\n"));
    assert_eq!(read(repo, "refs/heads/master", "old.c"), None);
    assert_eq!(read(repo, "refs/heads/FEATURE_X", "main.c").as_deref(), Some("a\nb\nbranch\n"));
    assert_eq!(read(repo, "refs/heads/FEATURE_X", "old.c").as_deref(), Some("old\n"));
    assert_eq!(read(repo, "refs/tags/RELEASE_1_0", "main.c").as_deref(), Some("a\nb\n"));

    let tip = repo.find_reference("refs/heads/master").unwrap().peel_to_commit().unwrap();
    assert_eq!(tip.message(), Some("remove old.c\n"));
    assert_eq!(tip.author().name(), Some("alice"));
}
