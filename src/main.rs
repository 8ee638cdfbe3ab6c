//! # swarm-backup
//!
//! **swarm-backup** fetches a user's Swarm check-in history and keeps a
//! git-versioned backup of it.
//!
//! Each check-in is saved as one pretty-printed JSON file named from the
//! check-in's local timestamp and venue. The whole run is bracketed in a
//! git transaction: the destination must be clean before the fetch, and on
//! any failure the working tree is rolled back to its pre-run state.
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use swarm_backup::{BackupOpts, cmd_backup};

/// Command-line interface definition.
///
/// Parsed using `clap` derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "swarm-backup",
    version,
    about = "back up Swarm check-ins into a git repository"
)]
struct Cli {
    /// Backup destination; must be an existing writable directory
    output: PathBuf,

    /// Fetch check-ins but skip the commit and push
    #[arg(long)]
    no_commit: bool,

    /// Path to the credentials file
    #[arg(long, default_value = "credentials.json")]
    credentials: PathBuf,
}

/// CLI entry point.
///
/// Parses arguments with `clap` and runs the backup. A returned error is
/// printed to stderr by `anyhow` and the process exits non-zero.
fn main() -> Result<()> {
    let cli = Cli::parse();

    cmd_backup(BackupOpts {
        output: cli.output,
        credentials: cli.credentials,
        no_commit: cli.no_commit,
    })
}
