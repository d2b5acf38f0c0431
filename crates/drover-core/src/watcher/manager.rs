use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use drover_protocol::{AgentType, SessionId};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use super::errors::WatcherError;
use super::session::{Ctrl, PatternSet, WorkerDeps, worker_loop};
use crate::config::{OBSERVATION_QUEUE_BOUND, RepoConfig};
use crate::events::EventBus;
use crate::locks::LockManager;
use crate::registry::Registry;
use crate::statedir::StateDir;

/// Parameters for one session's watcher.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub session_id: SessionId,
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub branch_name: String,
    pub agent_type: AgentType,
    pub commit_interval: Duration,
    pub auto_push: bool,
}

struct Handle {
    ctrl: mpsc::Sender<Ctrl>,
    thread: JoinHandle<()>,
    pending: Arc<AtomicBool>,
    _watcher: RecommendedWatcher,
}

/// Owns every per-session watcher worker.
pub struct WatcherManager {
    registry: Arc<Registry>,
    locks: Arc<LockManager>,
    bus: Arc<EventBus>,
    handles: Mutex<HashMap<SessionId, Handle>>,
}

impl WatcherManager {
    pub fn new(registry: Arc<Registry>, locks: Arc<LockManager>, bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            locks,
            bus,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Start watching a session's worktree. Idempotent per session.
    pub fn start(&self, opts: WatchOptions) -> Result<(), WatcherError> {
        {
            let handles = self.handles.lock().expect("watcher manager poisoned");
            if handles.contains_key(&opts.session_id) {
                return Ok(());
            }
        }
        if !opts.worktree_path.is_dir() {
            return Err(WatcherError::WorktreeMissing {
                path: opts.worktree_path.clone(),
            });
        }

        // Coordination bookkeeping must never enter the session's commits.
        let state_dir_pattern = format!("{}/", crate::statedir::STATE_DIR_NAME);
        if let Err(e) = crate::git::operations::ensure_excluded(
            &opts.worktree_path,
            &[state_dir_pattern.as_str(), ".devops-commit-*.msg"],
        ) {
            warn!(
                event = "core.watcher.exclude_setup_failed",
                session_id = %opts.session_id,
                error = %e,
            );
        }

        let repo_config = RepoConfig::load(&StateDir::for_repo(&opts.repo_path));
        let patterns =
            PatternSet::compile(&repo_config.watch_patterns, &repo_config.ignore_patterns);

        // Observation queue: bounded, drop-on-overflow. git status re-derives
        // anything a dropped event would have told us.
        let (fs_tx, fs_rx) = mpsc::sync_channel(OBSERVATION_QUEUE_BOUND);
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_for_watcher = dropped.clone();
        let session_for_watcher = opts.session_id.clone();
        let mut watcher = notify::recommended_watcher(move |res| {
            if let Err(TrySendError::Full(_)) = fs_tx.try_send(res) {
                let total = dropped_for_watcher.fetch_add(1, Ordering::Relaxed) + 1;
                if total == 1 || total % 1000 == 0 {
                    warn!(
                        event = "core.watcher.observation_overflow",
                        session_id = %session_for_watcher,
                        total_dropped = total,
                    );
                }
            }
        })
        .map_err(|e| WatcherError::WatchFailed {
            path: opts.worktree_path.clone(),
            message: e.to_string(),
        })?;
        watcher
            .watch(&opts.worktree_path, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: opts.worktree_path.clone(),
                message: e.to_string(),
            })?;

        let (ctrl_tx, ctrl_rx) = mpsc::channel();
        let pending = Arc::new(AtomicBool::new(false));
        let deps = WorkerDeps {
            session_id: opts.session_id.clone(),
            repo_path: opts.repo_path.clone(),
            worktree_path: opts.worktree_path.clone(),
            branch_name: opts.branch_name.clone(),
            agent_type: opts.agent_type,
            auto_push: opts.auto_push,
            registry: self.registry.clone(),
            locks: self.locks.clone(),
            bus: self.bus.clone(),
        };
        let interval = opts.commit_interval;
        let pending_for_worker = pending.clone();
        let thread = std::thread::Builder::new()
            .name(format!("session-watcher-{}", opts.session_id.short()))
            .spawn(move || {
                worker_loop(deps, interval, patterns, fs_rx, ctrl_rx, pending_for_worker)
            })
            .expect("spawn session watcher thread");

        self.handles.lock().expect("watcher manager poisoned").insert(
            opts.session_id.clone(),
            Handle {
                ctrl: ctrl_tx,
                thread,
                pending,
                _watcher: watcher,
            },
        );
        info!(
            event = "core.watcher.started",
            session_id = %opts.session_id,
            worktree = %opts.worktree_path.display(),
        );
        Ok(())
    }

    /// Stop a session's watcher, flushing any pending commit first.
    pub fn stop(&self, session_id: &SessionId) -> Result<(), WatcherError> {
        let handle = self
            .handles
            .lock()
            .expect("watcher manager poisoned")
            .remove(session_id)
            .ok_or_else(|| WatcherError::NotWatching {
                session_id: session_id.to_string(),
            })?;

        let _ = handle.ctrl.send(Ctrl::Stop { flush: true });
        let _ = handle.thread.join();
        Ok(())
    }

    pub fn pause(&self, session_id: &SessionId) -> Result<(), WatcherError> {
        self.send(session_id, Ctrl::Pause)
    }

    pub fn resume(&self, session_id: &SessionId) -> Result<(), WatcherError> {
        self.send(session_id, Ctrl::Resume)
    }

    fn send(&self, session_id: &SessionId, cmd: Ctrl) -> Result<(), WatcherError> {
        let handles = self.handles.lock().expect("watcher manager poisoned");
        let handle = handles
            .get(session_id)
            .ok_or_else(|| WatcherError::NotWatching {
                session_id: session_id.to_string(),
            })?;
        let _ = handle.ctrl.send(cmd);
        Ok(())
    }

    /// Whether the session's debounce timer is armed. The rebase watcher
    /// defers while this is true so the two never touch the worktree
    /// concurrently.
    pub fn has_pending_commit(&self, session_id: &SessionId) -> bool {
        self.handles
            .lock()
            .expect("watcher manager poisoned")
            .get(session_id)
            .is_some_and(|h| h.pending.load(Ordering::SeqCst))
    }

    pub fn watched_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self
            .handles
            .lock()
            .expect("watcher manager poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Stop every watcher with flush. Called on shutdown.
    pub fn stop_all(&self) {
        let ids = self.watched_sessions();
        for session_id in ids {
            let _ = self.stop(&session_id);
        }
    }
}

impl Drop for WatcherManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{self, test_support};
    use crate::statedir::io;
    use chrono::Utc;
    use drover_protocol::{AgentId, SessionReport, SessionStatus};

    fn make_session(repo: &std::path::Path, id: &str, branch: &str) -> SessionReport {
        SessionReport {
            session_id: SessionId::new(id),
            agent_id: AgentId::new("claude-1"),
            agent_type: AgentType::Claude,
            task: "task".to_string(),
            branch_name: branch.to_string(),
            base_branch: "main".to_string(),
            worktree_path: repo.to_path_buf(),
            repo_path: repo.to_path_buf(),
            status: SessionStatus::Watching,
            created: Utc::now(),
            updated: Utc::now(),
            commit_count: 0,
            last_commit: None,
        }
    }

    struct Fixture {
        registry: Arc<Registry>,
        locks: Arc<LockManager>,
        bus: Arc<EventBus>,
        manager: WatcherManager,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(EventBus::new());
        let registry = Arc::new(Registry::new(bus.clone()));
        let locks = Arc::new(LockManager::new(bus.clone()));
        let manager = WatcherManager::new(registry.clone(), locks.clone(), bus.clone());
        Fixture {
            registry,
            locks,
            bus,
            manager,
        }
    }

    fn watch_opts(repo: &std::path::Path, id: &str, interval: Duration) -> WatchOptions {
        WatchOptions {
            session_id: SessionId::new(id),
            repo_path: repo.to_path_buf(),
            worktree_path: repo.to_path_buf(),
            branch_name: "main".to_string(),
            agent_type: AgentType::Claude,
            commit_interval: interval,
            auto_push: false,
        }
    }

    /// A burst of writes produces exactly one commit containing all files,
    /// increments the session's commit count, and leaves locks assigned.
    #[test]
    fn test_burst_commits_once_with_all_files() {
        let repo = test_support::init_repo();
        let f = fixture();
        f.registry
            .ingest_session_report(make_session(repo.path(), "sess_abcdef12", "main"));
        let session = SessionId::new("sess_abcdef12");

        f.manager
            .start(watch_opts(repo.path(), "sess_abcdef12", Duration::from_secs(2)))
            .unwrap();

        std::fs::create_dir_all(repo.path().join("src")).unwrap();
        std::fs::write(repo.path().join("src/a.ts"), "a v1\n").unwrap();
        std::thread::sleep(Duration::from_millis(500));
        std::fs::write(repo.path().join("src/b.ts"), "b v1\n").unwrap();
        std::thread::sleep(Duration::from_millis(700));
        std::fs::write(repo.path().join("src/a.ts"), "a v2\n").unwrap();

        // Wait out the debounce plus slack.
        std::thread::sleep(Duration::from_secs(4));

        let history = git::operations::commit_history(repo.path(), 10).unwrap();
        assert_eq!(history.len(), 2, "exactly one auto-commit on top of init");
        assert!(history[0].subject.contains("auto-commit"));

        let report = f.registry.get_session(&session).unwrap();
        assert_eq!(report.commit_count, 1);
        assert!(report.last_commit.is_some());

        let summary = f.locks.repo_locks(repo.path());
        let held = summary.locks_by_session.get(&session).unwrap();
        assert!(held.contains(&"src/a.ts".to_string()));
        assert!(held.contains(&"src/b.ts".to_string()));

        f.manager.stop(&session).unwrap();
    }

    /// A burst fully reverted before the deadline commits nothing.
    #[test]
    fn test_reverted_burst_is_noop() {
        let repo = test_support::init_repo();
        let f = fixture();
        f.registry
            .ingest_session_report(make_session(repo.path(), "sess_abcdef12", "main"));
        let session = SessionId::new("sess_abcdef12");

        f.manager
            .start(watch_opts(repo.path(), "sess_abcdef12", Duration::from_secs(2)))
            .unwrap();

        std::fs::write(repo.path().join("temp.ts"), "x\n").unwrap();
        std::thread::sleep(Duration::from_millis(400));
        std::fs::remove_file(repo.path().join("temp.ts")).unwrap();

        std::thread::sleep(Duration::from_secs(4));

        let history = git::operations::commit_history(repo.path(), 10).unwrap();
        assert_eq!(history.len(), 1, "only the initial commit");
        assert_eq!(
            f.registry.get_session(&session).unwrap().commit_count,
            0
        );

        f.manager.stop(&session).unwrap();
    }

    /// A path locked by another session is excluded from this session's
    /// commit and surfaces a conflict event.
    #[test]
    fn test_conflicted_path_stays_out_of_commit() {
        let repo = test_support::init_repo();
        let f = fixture();
        f.registry
            .ingest_session_report(make_session(repo.path(), "sess_bbbbbbbb", "main"));
        let watcher_session = SessionId::new("sess_bbbbbbbb");
        let other_session = SessionId::new("sess_aaaaaaaa");

        // Another session already owns src/shared.ts.
        std::fs::create_dir_all(repo.path().join("src")).unwrap();
        f.locks
            .auto_lock_file(
                repo.path(),
                std::path::Path::new("src/shared.ts"),
                &other_session,
                AgentType::Cursor,
                None,
            )
            .unwrap();

        let sub = f.bus.subscribe();
        f.manager
            .start(watch_opts(repo.path(), "sess_bbbbbbbb", Duration::from_secs(2)))
            .unwrap();

        std::fs::write(repo.path().join("src/mine.ts"), "mine\n").unwrap();
        std::fs::write(repo.path().join("src/shared.ts"), "theirs, contested\n").unwrap();

        std::thread::sleep(Duration::from_secs(4));

        let conflicts = sub.drain_filtered(|e| e.name() == "conflict-detected");
        assert!(!conflicts.is_empty());

        // The auto-commit exists and excludes the contested path.
        let history = git::operations::commit_history(repo.path(), 10).unwrap();
        assert_eq!(history.len(), 2);
        let diff = git::operations::commit_diff(repo.path(), &history[0].hash).unwrap();
        assert!(diff.contains("src/mine.ts"));
        assert!(!diff.contains("src/shared.ts"));

        f.manager.stop(&watcher_session).unwrap();
    }

    /// The agent-authored commit message file wins over the fallback.
    #[test]
    fn test_agent_commit_message_is_used() {
        let repo = test_support::init_repo();
        let f = fixture();
        f.registry
            .ingest_session_report(make_session(repo.path(), "sess_abcdef12", "main"));
        let session = SessionId::new("sess_abcdef12");

        io::write_string_atomic(
            &StateDir::commit_msg_file(repo.path(), session.short()),
            "feat(core): add session pipeline\n",
        )
        .unwrap();

        f.manager
            .start(watch_opts(repo.path(), "sess_abcdef12", Duration::from_secs(2)))
            .unwrap();
        std::fs::write(repo.path().join("pipeline.ts"), "x\n").unwrap();
        std::thread::sleep(Duration::from_secs(4));

        let history = git::operations::commit_history(repo.path(), 10).unwrap();
        assert_eq!(history[0].subject, "feat(core): add session pipeline");

        f.manager.stop(&session).unwrap();
    }

    #[test]
    fn test_stop_flushes_pending_commit() {
        let repo = test_support::init_repo();
        let f = fixture();
        f.registry
            .ingest_session_report(make_session(repo.path(), "sess_abcdef12", "main"));
        let session = SessionId::new("sess_abcdef12");

        f.manager
            .start(watch_opts(repo.path(), "sess_abcdef12", Duration::from_secs(120)))
            .unwrap();
        std::fs::write(repo.path().join("pending.ts"), "x\n").unwrap();
        std::thread::sleep(Duration::from_millis(600));
        assert!(f.manager.has_pending_commit(&session));

        // Long debounce still pending — stop must flush it.
        f.manager.stop(&session).unwrap();
        let history = git::operations::commit_history(repo.path(), 10).unwrap();
        assert_eq!(history.len(), 2);
        assert!(!f.manager.has_pending_commit(&session));
    }

    #[test]
    fn test_start_is_idempotent_and_checks_worktree() {
        let repo = test_support::init_repo();
        let f = fixture();
        let opts = watch_opts(repo.path(), "sess_abcdef12", Duration::from_secs(60));
        f.manager.start(opts.clone()).unwrap();
        f.manager.start(opts).unwrap();
        assert_eq!(f.manager.watched_sessions().len(), 1);

        let missing = watch_opts(
            std::path::Path::new("/nonexistent/worktree"),
            "sess_ffffffff",
            Duration::from_secs(60),
        );
        assert!(matches!(
            f.manager.start(missing),
            Err(WatcherError::WorktreeMissing { .. })
        ));
        f.manager.stop_all();
    }
}
