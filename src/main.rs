// src/main.rs

mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Args;
use cvs_migrator::authors::{AuthorMap, AuthorSet};
use cvs_migrator::{CvsReader, Error, GitWriter, MigrationConfig, TargetWriter};
use indicatif::ProgressBar;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<MigrationConfig> {
    let mut config = match &args.config {
        Some(path) => MigrationConfig::load(path)?,
        None => MigrationConfig::default(),
    };
    if let Some(secs) = args.fuse_window {
        config.fuse_window_secs = secs;
    }
    if let Some(trunk) = &args.trunk_branch {
        config.trunk_branch = trunk.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    Ok(config)
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let mut reader = CvsReader::new(&args.source, config.clone());
    reader
        .validate()
        .with_context(|| format!("cannot migrate {}", args.source.display()))?;

    // 1. Decode every RCS file
    let bar = ProgressBar::new(reader.files_found() as u64);
    bar.set_message("Reading RCS files");
    let failed = reader.prepare(&bar)?;
    bar.finish_with_message("Analysis complete");

    if args.authors_template {
        let mut authors = AuthorSet::new();
        for author in reader.authors()? {
            authors.add(&author);
        }
        print!("{}", authors.template(&config.default_email_domain));
        if failed > 0 {
            eprintln!("{failed} file(s) could not be read, the template may be incomplete");
            return Ok(ExitCode::FAILURE);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let branches = reader.branches()?;
    let tags = reader.tags()?;
    tracing::info!(
        files = reader.files_found(),
        unreadable = failed,
        branches = branches.len(),
        tags = tags.len(),
        "repository scanned"
    );

    // 2. Group the file changes into commits
    let spinner = ProgressBar::new_spinner();
    let mut commits = reader.commits(&spinner)?;
    spinner.finish_with_message(format!("{} commits", commits.remaining()));

    // 3. Write them out
    let mut writer = match (&args.target, args.dry_run) {
        (Some(target), false) => {
            let authors = AuthorMap::new(&config.authors, &config.default_email_domain);
            let mut writer = GitWriter::init(target, authors, &config.trunk_branch)
                .with_context(|| format!("cannot create git repository at {}", target.display()))?;
            for branch in &branches {
                writer.create_branch(branch)?;
            }
            Some(writer)
        }
        (None, false) => bail!("--target is required unless --dry-run is given"),
        (_, true) => None,
    };

    let bar = ProgressBar::new(commits.remaining() as u64);
    bar.set_message("Writing commits");
    for commit in commits.by_ref() {
        match writer.as_mut() {
            Some(writer) => writer.apply_commit(&commit)?,
            None => println!(
                "{} {} {:<12} {:<16} {} file(s): {}",
                commit.id,
                commit.timestamp.to_rfc3339(),
                commit.author,
                if commit.branch.is_empty() { &config.trunk_branch } else { &commit.branch },
                commit.files.len(),
                commit.message.lines().next().unwrap_or("")
            ),
        }
        bar.inc(1);
    }
    bar.finish_with_message("Commits written");
    let result = commits.into_result();

    if let Some(writer) = writer.as_mut() {
        for tag in &tags {
            writer.create_tag(tag)?;
        }
        writer.finish()?;
    }
    reader.close()?;

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(Error::FileFailures(failures)) => {
            eprintln!("{} file(s) could not be migrated:", failures.len());
            for failure in &failures {
                eprintln!("  {failure}");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    let start_time = Instant::now();

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error migrating repository: {e:#}");
            ExitCode::FAILURE
        }
    };

    eprintln!("Total time: {:.2?}", start_time.elapsed());
    code
}
