//! Session recovery: reconcile persisted session files with the instance
//! store after a restart, and adopt or delete the orphans.

pub mod errors;
mod scanner;

pub use errors::RecoveryError;
pub use scanner::{RecoveryReport, RecoveryScanner};
