//! Git integration layer.
//!
//! This module wraps the actual backend implementation (`git2_backend`)
//! and re-exports only the stable public API used by the backup transaction.
//!
//! The idea is to hide internal implementation details (currently based on `git2` crate)
//! so that future backends or alternative implementations could be swapped in
//! without affecting the rest of the codebase.

mod git2_backend;

pub use git2_backend::{
    ChangeCounts, change_counts, commit_all, is_dirty, is_new_repo, open_or_init, push_origin,
    refresh_index, rollback,
};
pub use git2::Repository;
