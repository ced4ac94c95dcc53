// tests/cli.rs

use assert_cmd::Command;
use cvs_migrator::MigrationConfig;
use std::fs;
use std::path::Path;

const FILE: &str = "head\t1.1;
access;
symbols;
locks; strict;


1.1
date\t2020.01.01.00.00.00;\tauthor alice;\tstate Exp;
branches;
next\t;


desc
@@


1.1
log
@init
@
text
@hello
@
";

fn migrator(source: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cvs-migrator"));
    cmd.arg("--source").arg(source).env("RUST_LOG", "off");
    cmd
}

#[test]
fn authors_template_output_is_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.c,v"), FILE).unwrap();

    let assert = migrator(dir.path()).arg("--authors-template").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let config = MigrationConfig::from_toml(&stdout).unwrap();
    assert_eq!(config.authors.len(), 1);
    assert!(config.authors["alice"].starts_with("alice <alice@"));
}

#[test]
fn authors_template_fails_when_a_file_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.c,v"), FILE).unwrap();
    fs::write(dir.path().join("broken.c,v"), "head 1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate bogus;").unwrap();

    let assert = migrator(dir.path()).arg("--authors-template").assert().failure();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(MigrationConfig::from_toml(&stdout).is_ok());
}

#[test]
fn dry_run_lists_commits_on_stdout_only() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.c,v"), FILE).unwrap();

    let assert = migrator(dir.path()).arg("--dry-run").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("cvs-000001 2020-01-01T00:00:00+00:00 alice"));
    assert!(lines[0].ends_with("1 file(s): init"));
}
