//! Rebase watcher: per-session pollers that keep branches rebased against
//! their base when the remote advances.
//!
//! Only sessions with `rebase_frequency == on-demand` get a poller. A tick
//! fetches, computes ahead/behind against `origin/<base>`, and rebases when
//! behind — except on the very first tick after start, which never
//! auto-rebases so a freshly watched session cannot surprise the operator.
//! Conflicts pause the watcher; recovery requires an explicit resume after
//! the operator reconciles.

pub mod errors;
mod manager;
mod worker;

pub use errors::RebaseError;
pub use manager::{RebaseManager, RebaseWatchOptions};
