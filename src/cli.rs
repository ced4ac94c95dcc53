// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the CVS module directory (the one holding the ,v files)
    #[arg(short, long)]
    pub source: PathBuf,

    /// Directory in which to create the git repository
    #[arg(short, long, required_unless_present_any = ["dry_run", "authors_template"])]
    pub target: Option<PathBuf>,

    /// TOML file with migration settings and the author map
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest gap between file changes of one commit, in seconds
    #[arg(long)]
    pub fuse_window: Option<u64>,

    /// Name of the git branch that receives CVS trunk commits
    #[arg(long)]
    pub trunk_branch: Option<String>,

    /// Number of worker threads for reading RCS files
    #[arg(long)]
    pub workers: Option<usize>,

    /// Print the commits that would be written instead of writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print an [authors] template for every CVS user and exit
    #[arg(long)]
    pub authors_template: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
