use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::credentials::Credentials;
use crate::fetch::Api;
use crate::git;
use crate::git::Repository;

/// Options for one backup run, taken from the command line.
#[derive(Debug, Clone)]
pub struct BackupOpts {
    /// Backup destination; an existing writable directory that is (or will
    /// become) a git working tree.
    pub output: PathBuf,
    /// Path to the credentials file.
    pub credentials: PathBuf,
    /// Fetch and inspect, but skip the commit and push.
    pub no_commit: bool,
}

/// Run a full backup: fetch check-ins into the destination and commit+push
/// the result, rolling back the working tree on any failure.
///
/// # Errors
/// Returns an error on an invalid destination, unreadable credentials, a
/// dirty pre-existing working tree, a write failure during the fetch, or a
/// commit/push failure.
pub fn cmd_backup(opts: BackupOpts) -> Result<()> {
    let creds = Credentials::load(&opts.credentials)?;
    let api = Api::new(creds)?;
    run(&api, &opts)
}

/// The backup transaction itself, with the API client supplied by the caller
/// so tests can point it at a mock server.
pub(crate) fn run(api: &Api, opts: &BackupOpts) -> Result<()> {
    ensure_writable_dir(&opts.output)?;

    let repo = git::open_or_init(&opts.output)?;
    if git::is_dirty(&repo)? {
        bail!("repo is not in a clean state");
    }

    match run_protected(&repo, api, opts) {
        Ok(()) => {
            println!();
            println!("Backup completed!");
            Ok(())
        }
        Err(e) => {
            match git::rollback(&repo) {
                Ok(()) => eprintln!("Reset repo to clean state."),
                Err(re) => eprintln!("Rollback failed: {:#}", re),
            }
            Err(e)
        }
    }
}

/// Everything between the clean-state check and the final commit. Any error
/// returned from here triggers a rollback in [`run`].
fn run_protected(repo: &Repository, api: &Api, opts: &BackupOpts) -> Result<()> {
    println!("Backing up checkins...");
    api.run(&opts.output).context("backup failed")?;

    // The on-disk index can hold stale metadata after the fetch touched the
    // tree; reloading it is best-effort.
    git::refresh_index(repo);

    println!();
    println!("Status:");
    if git::is_new_repo(repo) {
        println!("(new repo, no status to show)");
    } else {
        let counts = git::change_counts(repo)?;
        println!("New: {}", counts.new);
        println!("Changed: {}", counts.changed);
        println!("Deleted: {}", counts.deleted);
    }

    println!();
    if !git::is_dirty(repo)? {
        println!("No changes to commit.");
    } else if opts.no_commit {
        println!("Skipping commit and push; --no-commit flag given.");
    } else {
        println!("Committing latest backup");
        git::commit_all(repo, "Backup")?;
        println!("Pushing changes");
        git::push_origin(repo)?;
    }
    Ok(())
}

fn ensure_writable_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!(
            "backup destination must be a writable directory: {}",
            dir.display()
        );
    }
    tempfile::Builder::new()
        .prefix(".probe")
        .tempfile_in(dir)
        .with_context(|| {
            format!(
                "backup destination must be a writable directory: {}",
                dir.display()
            )
        })?;
    Ok(())
}
