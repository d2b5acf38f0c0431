//! Per-session file watcher and commit debouncer.
//!
//! Each active session gets a worker thread that subscribes recursively to
//! the session's worktree. Every observed write is auto-locked, logged to
//! the session's activity log, and resets the session's debounce timer;
//! when the timer elapses quietly the worker stages everything and commits
//! once. Commits are strictly serialised per session (they run on the
//! worker thread itself); across sessions they proceed in parallel.
//!
//! Filesystem events ride a bounded queue that drops on overflow — the
//! commit path re-derives reality from `git status`, so lost observations
//! cost nothing. Control messages (stop/flush/pause/resume) ride an
//! unbounded channel and are never dropped.

pub mod commit;
pub mod errors;
mod manager;
mod session;

pub use errors::WatcherError;
pub use manager::{WatchOptions, WatcherManager};
