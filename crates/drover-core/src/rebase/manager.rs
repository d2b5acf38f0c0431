use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use drover_protocol::{RebaseFrequency, RebaseResult, RebaseWatchState, SessionId};
use tracing::info;

use super::errors::RebaseError;
use super::worker::{Ctrl, RebaseWorker};
use crate::events::EventBus;
use crate::git;
use crate::registry::Registry;
use crate::watcher::WatcherManager;

/// How long manager calls wait for a worker reply. Covers a full
/// fetch+rebase round at the slow git timeout.
const REPLY_TIMEOUT: Duration = Duration::from_secs(250);

#[derive(Debug, Clone)]
pub struct RebaseWatchOptions {
    pub session_id: SessionId,
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub base_branch: String,
    pub rebase_frequency: RebaseFrequency,
    pub poll_interval: Duration,
}

struct Handle {
    ctrl: Sender<Ctrl>,
    thread: JoinHandle<()>,
    state: Arc<Mutex<RebaseWatchState>>,
}

/// Owns every per-session rebase poller.
pub struct RebaseManager {
    registry: Arc<Registry>,
    watchers: Arc<WatcherManager>,
    bus: Arc<EventBus>,
    handles: Mutex<HashMap<SessionId, Handle>>,
}

impl RebaseManager {
    pub fn new(
        registry: Arc<Registry>,
        watchers: Arc<WatcherManager>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            watchers,
            bus,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Start a poller for the session. Idempotent; sessions whose frequency
    /// does not activate the timer are skipped.
    pub fn start_watching(&self, opts: RebaseWatchOptions) -> Result<(), RebaseError> {
        if !opts.rebase_frequency.activates_watcher() {
            info!(
                event = "core.rebase.frequency_skips_watcher",
                session_id = %opts.session_id,
                frequency = ?opts.rebase_frequency,
            );
            return Ok(());
        }
        {
            let handles = self.handles.lock().expect("rebase manager poisoned");
            if handles.contains_key(&opts.session_id) {
                return Ok(());
            }
        }

        let current_branch = git::operations::current_branch(&opts.worktree_path)
            .unwrap_or_else(|_| "unknown".to_string());
        let state = Arc::new(Mutex::new(RebaseWatchState {
            session_id: opts.session_id.clone(),
            repo_path: opts.repo_path.clone(),
            base_branch: opts.base_branch.clone(),
            current_branch,
            rebase_frequency: opts.rebase_frequency,
            poll_interval_ms: opts.poll_interval.as_millis() as u64,
            is_watching: true,
            is_paused: false,
            is_rebasing: false,
            behind_count: 0,
            ahead_count: 0,
            last_checked: None,
            last_rebase_result: None,
        }));

        let (ctrl_tx, ctrl_rx) = mpsc::channel();
        let worker = RebaseWorker {
            session_id: opts.session_id.clone(),
            repo_path: opts.repo_path,
            worktree_path: opts.worktree_path,
            base_branch: opts.base_branch,
            poll_interval: opts.poll_interval,
            state: state.clone(),
            registry: self.registry.clone(),
            watchers: self.watchers.clone(),
            bus: self.bus.clone(),
        };
        let thread = std::thread::Builder::new()
            .name(format!("rebase-watcher-{}", opts.session_id.short()))
            .spawn(move || worker.run(ctrl_rx))
            .expect("spawn rebase watcher thread");

        self.handles.lock().expect("rebase manager poisoned").insert(
            opts.session_id.clone(),
            Handle {
                ctrl: ctrl_tx,
                thread,
                state,
            },
        );
        info!(
            event = "core.rebase.watcher_started",
            session_id = %opts.session_id,
        );
        Ok(())
    }

    pub fn stop_watching(&self, session_id: &SessionId) -> Result<(), RebaseError> {
        let handle = self
            .handles
            .lock()
            .expect("rebase manager poisoned")
            .remove(session_id)
            .ok_or_else(|| RebaseError::NotWatching {
                session_id: session_id.to_string(),
            })?;
        let _ = handle.ctrl.send(Ctrl::Stop);
        let _ = handle.thread.join();
        Ok(())
    }

    pub fn pause(&self, session_id: &SessionId) -> Result<(), RebaseError> {
        self.send(session_id, Ctrl::Pause)
    }

    pub fn resume(&self, session_id: &SessionId) -> Result<(), RebaseError> {
        self.send(session_id, Ctrl::Resume)
    }

    /// Immediate fetch + delta, plus a rebase when behind and not paused.
    pub fn force_check(&self, session_id: &SessionId) -> Result<RebaseWatchState, RebaseError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(session_id, Ctrl::ForceCheck(reply_tx))?;
        reply_rx
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|e| RebaseError::ForceCheckFailed {
                session_id: session_id.to_string(),
                message: e.to_string(),
            })
    }

    /// Manually run a rebase now.
    ///
    /// Refused with `{success:false}` while one is already in flight or the
    /// watcher is paused.
    pub fn trigger_rebase(&self, session_id: &SessionId) -> Result<RebaseResult, RebaseError> {
        {
            let handles = self.handles.lock().expect("rebase manager poisoned");
            let handle = handles
                .get(session_id)
                .ok_or_else(|| RebaseError::NotWatching {
                    session_id: session_id.to_string(),
                })?;
            if handle.state.lock().expect("rebase state poisoned").is_rebasing {
                return Ok(RebaseResult::failed("rebase already in progress"));
            }
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(session_id, Ctrl::Trigger(reply_tx))?;
        reply_rx
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|e| RebaseError::WorkerUnresponsive {
                session_id: session_id.to_string(),
                message: e.to_string(),
            })
    }

    pub fn status(&self, session_id: &SessionId) -> Option<RebaseWatchState> {
        self.handles
            .lock()
            .expect("rebase manager poisoned")
            .get(session_id)
            .map(|h| h.state.lock().expect("rebase state poisoned").clone())
    }

    pub fn watched_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self
            .handles
            .lock()
            .expect("rebase manager poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Stop every poller. Called on shutdown.
    pub fn dispose(&self) {
        for session_id in self.watched_sessions() {
            let _ = self.stop_watching(&session_id);
        }
    }

    fn send(&self, session_id: &SessionId, cmd: Ctrl) -> Result<(), RebaseError> {
        let handles = self.handles.lock().expect("rebase manager poisoned");
        let handle = handles
            .get(session_id)
            .ok_or_else(|| RebaseError::NotWatching {
                session_id: session_id.to_string(),
            })?;
        let _ = handle.ctrl.send(cmd);
        Ok(())
    }
}

impl Drop for RebaseManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
