//! Cross-agent file lock manager.
//!
//! Per-repo lock tables live in memory and persist to the repo's
//! `locks.json`. The auto-lock path is authoritative for conflict
//! detection; the legacy session-granular declaration API is a recording
//! facade only.

pub mod errors;
pub mod filter;
pub mod legacy;
pub mod manager;

pub use errors::LockError;
pub use legacy::DeclarationStore;
pub use manager::{LockManager, LockOutcome, RepoLockSummary};
