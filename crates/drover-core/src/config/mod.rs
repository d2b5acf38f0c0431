//! Configuration: tuning constants and the per-repo `config.json`.

pub mod types;

pub use types::RepoConfig;

use std::time::Duration;

/// Maximum age of an agent's last heartbeat before it is `!is_alive`.
pub const HEARTBEAT_TTL: Duration = Duration::from_secs(90);

/// How often the listener runs the registry liveness sweep.
pub const LIVENESS_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Inactivity after which an auto-lock expires.
pub const LOCK_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Coalescing window for state-directory file events.
pub const LISTENER_DEBOUNCE: Duration = Duration::from_millis(100);

/// Default seconds of quiet before a file-change burst commits.
pub const DEFAULT_COMMIT_INTERVAL_SECS: u32 = 30;
pub const MIN_COMMIT_INTERVAL_SECS: u32 = 10;
pub const MAX_COMMIT_INTERVAL_SECS: u32 = 300;

/// Default rebase watcher poll interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

/// How long the rebase watcher waits before re-checking a session whose
/// commit debouncer has a pending commit.
pub const REBASE_DEFER_INTERVAL: Duration = Duration::from_secs(5);

/// Bound on per-worker observation queues; overflow drops observations
/// (they are re-derived from disk), never control commands.
pub const OBSERVATION_QUEUE_BOUND: usize = 1024;

/// Grace period for in-flight git subprocesses during shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The commit interval is enforced as seconds at the public contract and
/// clamped to [10, 300].
pub fn clamp_commit_interval(secs: u32) -> u32 {
    secs.clamp(MIN_COMMIT_INTERVAL_SECS, MAX_COMMIT_INTERVAL_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_commit_interval() {
        assert_eq!(clamp_commit_interval(0), 10);
        assert_eq!(clamp_commit_interval(30), 30);
        assert_eq!(clamp_commit_interval(9999), 300);
    }
}
