use anyhow::{Context, Result};
use git2::{
    Cred, IndexAddOption, PushOptions, RemoteCallbacks, Repository, ResetType, Signature, Status,
    StatusOptions,
};
use std::fs;
use std::path::Path;

/// Build a `PushOptions` with SSH-agent credentials enabled.
///
/// This allows the push to authenticate using the user's SSH agent.
/// If no SSH key is found, it falls back to default credentials.
fn push_opts_with_creds() -> PushOptions<'static> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(|_url, username_from_url, _allowed| {
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")).or_else(|_| Cred::default())
    });

    let mut po = PushOptions::new();
    po.remote_callbacks(cb);
    po
}

/// Open the repository rooted at `dir`, initializing a fresh one if no
/// `.git` directory exists yet.
///
/// # Errors
/// Returns an error if the directory cannot be opened or initialized as a
/// repository.
pub fn open_or_init(dir: &Path) -> Result<Repository> {
    if dir.join(".git").is_dir() {
        Repository::open(dir)
            .with_context(|| format!("failed to open repository at {}", dir.display()))
    } else {
        println!("Git repository not present in backup destination; initializing");
        Repository::init(dir)
            .with_context(|| format!("failed to initialize repository at {}", dir.display()))
    }
}

/// Whether the repository has no commits yet (unborn HEAD).
pub fn is_new_repo(repo: &Repository) -> bool {
    repo.head().is_err()
}

fn statuses(repo: &Repository) -> Result<git2::Statuses<'_>> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    repo.statuses(Some(&mut opts))
        .context("failed to read repository status")
}

/// Whether the working tree has any untracked, modified, added, or deleted
/// path relative to the last commit.
///
/// A repository with zero commits is dirty iff it has any untracked files,
/// there being no commit to diff against.
pub fn is_dirty(repo: &Repository) -> Result<bool> {
    Ok(!statuses(repo)?.is_empty())
}

/// Counts of pending working-tree changes, as shown after a fetch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCounts {
    pub new: usize,
    pub changed: usize,
    pub deleted: usize,
}

/// Count new, changed, and deleted paths relative to the last commit.
pub fn change_counts(repo: &Repository) -> Result<ChangeCounts> {
    let mut counts = ChangeCounts::default();
    for entry in statuses(repo)?.iter() {
        let s = entry.status();
        if s.intersects(Status::WT_NEW | Status::INDEX_NEW) {
            counts.new += 1;
        } else if s.intersects(
            Status::WT_MODIFIED
                | Status::INDEX_MODIFIED
                | Status::WT_RENAMED
                | Status::INDEX_RENAMED
                | Status::WT_TYPECHANGE
                | Status::INDEX_TYPECHANGE,
        ) {
            counts.changed += 1;
        } else if s.intersects(Status::WT_DELETED | Status::INDEX_DELETED) {
            counts.deleted += 1;
        }
    }
    Ok(counts)
}

/// Best-effort reload of the on-disk index, to avoid acting on stale cached
/// metadata. Failure here is swallowed; it does not affect the outcome.
pub fn refresh_index(repo: &Repository) {
    if let Ok(mut index) = repo.index() {
        let _ = index.read(true);
    }
}

/// Stage every change (additions, modifications, deletions) and create a
/// commit on HEAD with the given message.
///
/// Uses the repository signature if one is configured, otherwise a fixed
/// fallback identity, so the backup also works in environments without a
/// global git config.
///
/// # Errors
/// Returns an error if staging, tree writing, or commit creation fails.
pub fn commit_all(repo: &Repository, message: &str) -> Result<()> {
    let mut index = repo.index().context("failed to open index")?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write()?;

    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let sig = signature(repo)?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .context("failed to create commit")?;
    Ok(())
}

fn signature(repo: &Repository) -> Result<Signature<'static>> {
    repo.signature()
        .or_else(|_| Signature::now("swarm-backup", "swarm-backup@localhost"))
        .context("failed to build commit signature")
}

/// Push the current branch to the `origin` remote.
///
/// # Errors
/// Returns an error if there is no commit to push, no `origin` remote is
/// configured, or the push itself fails.
pub fn push_origin(repo: &Repository) -> Result<()> {
    let head = repo
        .head()
        .context("cannot push from a repository with no commits")?;
    let refname = head
        .name()
        .context("HEAD does not point at a named branch")?
        .to_string();

    let mut remote = repo
        .find_remote("origin")
        .context("no 'origin' remote configured")?;
    remote
        .push(
            &[format!("{refname}:{refname}")],
            Some(&mut push_opts_with_creds()),
        )
        .context("git push origin")?;
    Ok(())
}

/// Discard all working-tree changes and untracked files, restoring the last
/// committed state.
///
/// On a repository with commits this is a hard reset to HEAD followed by
/// removal of untracked files; on a zero-commit repository only the
/// untracked files are removed.
///
/// # Errors
/// Returns an error if the reset fails or the status listing needed to find
/// untracked files cannot be read.
pub fn rollback(repo: &Repository) -> Result<()> {
    if let Ok(head) = repo.head() {
        let commit = head.peel_to_commit()?;
        repo.reset(commit.as_object(), ResetType::Hard, None)
            .context("failed to reset working tree")?;
    }
    remove_untracked(repo)
}

fn remove_untracked(repo: &Repository) -> Result<()> {
    let workdir = repo
        .workdir()
        .context("repository has no working directory")?;
    for entry in statuses(repo)?.iter() {
        if entry.status().contains(Status::WT_NEW)
            && let Some(path) = entry.path()
        {
            let _ = fs::remove_file(workdir.join(path));
        }
    }
    Ok(())
}
