//! Crate entry point for **swarm-backup**.
//!
//! This library provides the internal implementation for the `swarm-backup` CLI.
//! Each submodule encapsulates one responsibility (credentials, record naming,
//! fetching, git operations, the backup transaction).
//! The `pub use` re-exports make selected types and commands accessible directly
//! from the crate root.

mod backup;
mod checkin;
mod credentials;
mod fetch;
mod git;
mod watermark;

/// Re-export commonly used types and commands so they can be accessed from `swarm_backup::*`.
pub use backup::{BackupOpts, cmd_backup};
pub use checkin::Checkin;
pub use credentials::Credentials;
pub use fetch::Api;
pub use watermark::resume_watermark;
