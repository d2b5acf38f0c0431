use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use drover_protocol::{AgentType, FileConflict, FileLock, SessionId};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::errors::LockError;
use super::filter;
use crate::events::{Event, EventBus, LockChangeKind};
use crate::statedir::{StateDir, io};

/// Result of an auto-lock attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    /// The caller's session holds the lock (fresh or refreshed).
    Held,
    /// Another session holds it; the caller must not touch the path.
    Conflict(FileLock),
    /// The path is excluded from locking.
    Skipped,
}

/// Aggregate view of one repo's lock table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoLockSummary {
    pub total_locks: usize,
    pub locks_by_session: HashMap<SessionId, Vec<String>>,
}

#[derive(Default)]
struct RepoTable {
    locks: HashMap<String, FileLock>,
}

/// Per-repo file-lock tables with conflict detection and expiry.
///
/// All transitions on a single `(repo, path)` are linearisable: two racing
/// writers resolve to exactly one `Held` and one `Conflict`.
pub struct LockManager {
    tables: Mutex<HashMap<PathBuf, RepoTable>>,
    bus: Arc<EventBus>,
}

impl LockManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            bus,
        }
    }

    fn with_table<R>(
        &self,
        repo_path: &Path,
        f: impl FnOnce(&mut RepoTable) -> R,
    ) -> R {
        let mut tables = self.tables.lock().expect("lock manager poisoned");
        let table = tables
            .entry(repo_path.to_path_buf())
            .or_insert_with(|| load_table(repo_path));
        f(table)
    }

    /// Claim `file_path` for `session_id`, detecting cross-session conflicts.
    pub fn auto_lock_file(
        &self,
        repo_path: &Path,
        file_path: &Path,
        session_id: &SessionId,
        agent_type: AgentType,
        branch_name: Option<String>,
    ) -> Result<LockOutcome, LockError> {
        let Some(relative) = filter::normalize_relative(repo_path, file_path) else {
            return Ok(LockOutcome::Skipped);
        };
        if filter::is_filtered(&relative) {
            return Ok(LockOutcome::Skipped);
        }

        let now = Utc::now();
        let (outcome, persist, created) = self.with_table(repo_path, |table| {
            match table.locks.get_mut(&relative) {
                Some(existing) if existing.session_id == *session_id => {
                    existing.last_modified = now;
                    (LockOutcome::Held, true, false)
                }
                Some(existing) => (LockOutcome::Conflict(existing.clone()), false, false),
                None => {
                    table.locks.insert(
                        relative.clone(),
                        FileLock {
                            repo_path: repo_path.to_path_buf(),
                            file_path: relative.clone(),
                            session_id: session_id.clone(),
                            agent_type,
                            locked_at: now,
                            last_modified: now,
                            auto_locked: true,
                            branch_name,
                        },
                    );
                    (LockOutcome::Held, true, true)
                }
            }
        });

        if persist {
            self.persist(repo_path)?;
        }

        match &outcome {
            LockOutcome::Held => {
                debug!(
                    event = "core.locks.auto_lock_held",
                    repo = %repo_path.display(),
                    file = %relative,
                    session_id = %session_id,
                );
                // Refreshes only bump last_modified; the acquisition already
                // went out when the lock was created.
                if created {
                    self.bus.publish(Event::LockChanged {
                        repo_path: repo_path.to_path_buf(),
                        file_path: relative,
                        change: LockChangeKind::Acquired,
                        session_id: session_id.clone(),
                    });
                }
            }
            LockOutcome::Conflict(existing) => {
                warn!(
                    event = "core.locks.auto_lock_conflict",
                    repo = %repo_path.display(),
                    file = %relative,
                    attempted_by = %session_id,
                    held_by = %existing.session_id,
                );
                self.bus.publish(Event::ConflictDetected {
                    conflict: FileConflict {
                        file: relative.clone(),
                        conflicts_with: existing.agent_type,
                        session: existing.session_id.clone(),
                        reason: format!(
                            "{} is already editing this file",
                            existing.agent_type
                        ),
                        declared_at: now,
                    },
                });
                self.bus.publish(Event::LockChanged {
                    repo_path: repo_path.to_path_buf(),
                    file_path: relative,
                    change: LockChangeKind::Conflict,
                    session_id: session_id.clone(),
                });
            }
            LockOutcome::Skipped => {}
        }

        Ok(outcome)
    }

    /// Release every lock a session holds in a repo. Returns the count.
    pub fn release_session_locks(
        &self,
        repo_path: &Path,
        session_id: &SessionId,
    ) -> Result<usize, LockError> {
        let released: Vec<String> = self.with_table(repo_path, |table| {
            let paths: Vec<String> = table
                .locks
                .iter()
                .filter(|(_, lock)| lock.session_id == *session_id)
                .map(|(path, _)| path.clone())
                .collect();
            for path in &paths {
                table.locks.remove(path);
            }
            paths
        });

        if released.is_empty() {
            return Ok(0);
        }
        self.persist(repo_path)?;

        info!(
            event = "core.locks.session_released",
            repo = %repo_path.display(),
            session_id = %session_id,
            count = released.len(),
        );
        for path in &released {
            self.bus.publish(Event::LockChanged {
                repo_path: repo_path.to_path_buf(),
                file_path: path.clone(),
                change: LockChangeKind::Released,
                session_id: session_id.clone(),
            });
        }
        Ok(released.len())
    }

    /// Admin override: drop one lock regardless of owner.
    pub fn force_release_lock(
        &self,
        repo_path: &Path,
        file_path: &Path,
    ) -> Result<bool, LockError> {
        let Some(relative) = filter::normalize_relative(repo_path, file_path) else {
            return Ok(false);
        };
        let removed = self.with_table(repo_path, |table| table.locks.remove(&relative));

        let Some(lock) = removed else {
            return Ok(false);
        };
        self.persist(repo_path)?;
        info!(
            event = "core.locks.force_released",
            repo = %repo_path.display(),
            file = %relative,
            owner = %lock.session_id,
        );
        self.bus.publish(Event::LockChanged {
            repo_path: repo_path.to_path_buf(),
            file_path: relative,
            change: LockChangeKind::ForceReleased,
            session_id: lock.session_id,
        });
        Ok(true)
    }

    /// Read-only pre-flight: which of `files` would conflict for this caller?
    pub fn check_conflicts(
        &self,
        repo_path: &Path,
        files: &[PathBuf],
        exclude_session: Option<&SessionId>,
    ) -> Vec<FileConflict> {
        let now = Utc::now();
        self.with_table(repo_path, |table| {
            files
                .iter()
                .filter_map(|file| {
                    let relative = filter::normalize_relative(repo_path, file)?;
                    let lock = table.locks.get(&relative)?;
                    if exclude_session == Some(&lock.session_id) {
                        return None;
                    }
                    Some(FileConflict {
                        file: relative,
                        conflicts_with: lock.agent_type,
                        session: lock.session_id.clone(),
                        reason: format!("{} is already editing this file", lock.agent_type),
                        declared_at: now,
                    })
                })
                .collect()
        })
    }

    /// Aggregate view for `listLocks`.
    pub fn repo_locks(&self, repo_path: &Path) -> RepoLockSummary {
        self.with_table(repo_path, |table| {
            let mut locks_by_session: HashMap<SessionId, Vec<String>> = HashMap::new();
            for lock in table.locks.values() {
                locks_by_session
                    .entry(lock.session_id.clone())
                    .or_default()
                    .push(lock.file_path.clone());
            }
            for paths in locks_by_session.values_mut() {
                paths.sort();
            }
            RepoLockSummary {
                total_locks: table.locks.len(),
                locks_by_session,
            }
        })
    }

    /// The lock currently held on a path, if any.
    pub fn lock_for(&self, repo_path: &Path, file_path: &Path) -> Option<FileLock> {
        let relative = filter::normalize_relative(repo_path, file_path)?;
        self.with_table(repo_path, |table| table.locks.get(&relative).cloned())
    }

    /// Remove locks idle past `timeout`. Returns the count removed.
    pub fn cleanup_expired(
        &self,
        repo_path: &Path,
        timeout: Duration,
    ) -> Result<usize, LockError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::hours(24));

        let expired: Vec<FileLock> = self.with_table(repo_path, |table| {
            let paths: Vec<String> = table
                .locks
                .iter()
                .filter(|(_, lock)| lock.last_modified < cutoff)
                .map(|(path, _)| path.clone())
                .collect();
            paths
                .iter()
                .filter_map(|path| table.locks.remove(path))
                .collect()
        });

        if expired.is_empty() {
            return Ok(0);
        }
        self.persist(repo_path)?;

        info!(
            event = "core.locks.expired_swept",
            repo = %repo_path.display(),
            count = expired.len(),
        );
        for lock in &expired {
            self.bus.publish(Event::LockChanged {
                repo_path: repo_path.to_path_buf(),
                file_path: lock.file_path.clone(),
                change: LockChangeKind::Released,
                session_id: lock.session_id.clone(),
            });
        }
        Ok(expired.len())
    }

    /// Rewrite `locks.json` from the in-memory table. An empty table
    /// truncates the file rather than deleting it, so agents keep a stable
    /// path to watch.
    fn persist(&self, repo_path: &Path) -> Result<(), LockError> {
        let tables = self.tables.lock().expect("lock manager poisoned");
        let Some(table) = tables.get(repo_path) else {
            return Ok(());
        };
        let locks_file = StateDir::for_repo(repo_path).locks_file();
        if table.locks.is_empty() {
            io::write_string_atomic(&locks_file, "")?;
        } else {
            io::write_json_atomic(&locks_file, &table.locks)?;
        }
        Ok(())
    }
}

fn load_table(repo_path: &Path) -> RepoTable {
    let locks_file = StateDir::for_repo(repo_path).locks_file();
    let locks: HashMap<String, FileLock> =
        io::read_json_lenient(&locks_file).unwrap_or_default();
    if !locks.is_empty() {
        debug!(
            event = "core.locks.table_loaded",
            repo = %repo_path.display(),
            count = locks.len(),
        );
    }
    RepoTable { locks }
}
