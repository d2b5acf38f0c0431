use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use drover_protocol::{ActivityKind, RebaseResult, RebaseWatchState, SessionId};
use tracing::{info, warn};

use crate::activity;
use crate::config::REBASE_DEFER_INTERVAL;
use crate::events::{Event, EventBus};
use crate::git::{self, GitError};
use crate::registry::Registry;
use crate::watcher::WatcherManager;

pub(super) enum Ctrl {
    Pause,
    Resume,
    ForceCheck(Sender<RebaseWatchState>),
    Trigger(Sender<RebaseResult>),
    Stop,
}

pub(super) struct RebaseWorker {
    pub session_id: SessionId,
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub base_branch: String,
    pub poll_interval: Duration,
    pub state: Arc<Mutex<RebaseWatchState>>,
    pub registry: Arc<Registry>,
    pub watchers: Arc<WatcherManager>,
    pub bus: Arc<EventBus>,
}

impl RebaseWorker {
    pub(super) fn run(mut self, ctrl_rx: Receiver<Ctrl>) {
        // Startup never auto-rebases: the operator sees the delta first.
        let mut first_tick = true;
        let mut next_wait = self.poll_interval;

        self.publish_status();

        loop {
            match ctrl_rx.recv_timeout(next_wait) {
                Ok(Ctrl::Pause) => {
                    self.set_paused(true);
                    next_wait = self.poll_interval;
                }
                Ok(Ctrl::Resume) => {
                    self.set_paused(false);
                    next_wait = self.poll_interval;
                }
                Ok(Ctrl::ForceCheck(reply)) => {
                    if !self.is_paused() {
                        self.tick(false);
                    } else {
                        // Paused watchers still report, they just never rebase.
                        self.check_remote(false);
                    }
                    let _ = reply.send(self.snapshot());
                    next_wait = self.poll_interval;
                }
                Ok(Ctrl::Trigger(reply)) => {
                    let result = if self.is_paused() {
                        RebaseResult::failed("watcher is paused; resume before rebasing")
                    } else {
                        self.attempt_rebase()
                    };
                    let _ = reply.send(result);
                    next_wait = self.poll_interval;
                }
                Ok(Ctrl::Stop) => {
                    {
                        let mut state = self.state.lock().expect("rebase state poisoned");
                        state.is_watching = false;
                    }
                    self.publish_status();
                    info!(
                        event = "core.rebase.watcher_stopped",
                        session_id = %self.session_id,
                    );
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_paused() || self.is_rebasing() {
                        next_wait = self.poll_interval;
                        continue;
                    }
                    let deferred = self.tick(first_tick);
                    first_tick = false;
                    next_wait = if deferred {
                        REBASE_DEFER_INTERVAL
                    } else {
                        self.poll_interval
                    };
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// One poll: fetch, compute the delta, maybe rebase.
    ///
    /// Returns `true` when a wanted rebase was deferred because the commit
    /// debouncer holds a pending commit for this session.
    fn tick(&mut self, skip_rebase: bool) -> bool {
        let Some(behind) = self.check_remote(true) else {
            return false;
        };
        if behind == 0 || skip_rebase {
            return false;
        }

        if self.watchers.has_pending_commit(&self.session_id) {
            // The worktree belongs to the commit pipeline right now; come
            // back shortly instead of racing it.
            info!(
                event = "core.rebase.deferred_pending_commit",
                session_id = %self.session_id,
            );
            return true;
        }

        self.attempt_rebase();
        false
    }

    /// Steps 1–2: fetch and store the ahead/behind counts.
    fn check_remote(&mut self, publish_delta: bool) -> Option<u32> {
        if let Err(e) = git::operations::fetch(&self.worktree_path, "origin") {
            warn!(
                event = "core.rebase.fetch_failed",
                session_id = %self.session_id,
                error = %e,
            );
            self.touch_checked();
            return None;
        }

        let delta = match git::operations::check_remote_changes(
            &self.worktree_path,
            &self.base_branch,
        ) {
            Ok(delta) => delta,
            Err(e) => {
                warn!(
                    event = "core.rebase.delta_failed",
                    session_id = %self.session_id,
                    base = %self.base_branch,
                    error = %e,
                );
                self.touch_checked();
                return None;
            }
        };

        {
            let mut state = self.state.lock().expect("rebase state poisoned");
            state.ahead_count = delta.ahead;
            state.behind_count = delta.behind;
            state.last_checked = Some(Utc::now());
        }
        self.publish_status();

        if publish_delta && delta.behind > 0 {
            self.bus.publish(Event::RebaseRemoteChangesDetected {
                session_id: self.session_id.clone(),
                ahead: delta.ahead,
                behind: delta.behind,
            });
        }
        Some(delta.behind)
    }

    /// Steps 3–4: run the rebase and fold the outcome into watcher state.
    fn attempt_rebase(&mut self) -> RebaseResult {
        {
            let mut state = self.state.lock().expect("rebase state poisoned");
            state.is_rebasing = true;
        }
        self.publish_status();

        let result = match git::operations::rebase(
            &self.worktree_path,
            &format!("origin/{}", self.base_branch),
        ) {
            Ok(()) => {
                let result =
                    RebaseResult::ok(format!("Rebased onto origin/{}", self.base_branch), true);
                {
                    let mut state = self.state.lock().expect("rebase state poisoned");
                    state.is_rebasing = false;
                    state.behind_count = 0;
                    state.last_rebase_result = Some(result.clone());
                }
                activity::append(
                    &self.registry,
                    &self.repo_path,
                    &self.session_id,
                    ActivityKind::Git,
                    format!("Rebased onto origin/{}", self.base_branch),
                    Default::default(),
                );
                self.bus.publish(Event::RebaseAutoCompleted {
                    session_id: self.session_id.clone(),
                    base_branch: self.base_branch.clone(),
                });
                result
            }
            Err(e) => {
                let message = rebase_failure_message(&e);
                let result = RebaseResult::failed(message.clone());
                {
                    let mut state = self.state.lock().expect("rebase state poisoned");
                    state.is_rebasing = false;
                    state.is_paused = true;
                    state.last_rebase_result = Some(result.clone());
                }
                warn!(
                    event = "core.rebase.paused_on_failure",
                    session_id = %self.session_id,
                    error = %e,
                );
                activity::append(
                    &self.registry,
                    &self.repo_path,
                    &self.session_id,
                    ActivityKind::Error,
                    format!("Rebase paused: {message}"),
                    Default::default(),
                );
                result
            }
        };

        self.publish_status();
        result
    }

    fn touch_checked(&self) {
        let mut state = self.state.lock().expect("rebase state poisoned");
        state.last_checked = Some(Utc::now());
    }

    fn is_paused(&self) -> bool {
        self.state.lock().expect("rebase state poisoned").is_paused
    }

    fn is_rebasing(&self) -> bool {
        self.state.lock().expect("rebase state poisoned").is_rebasing
    }

    fn set_paused(&self, paused: bool) {
        {
            let mut state = self.state.lock().expect("rebase state poisoned");
            state.is_paused = paused;
        }
        info!(
            event = "core.rebase.pause_changed",
            session_id = %self.session_id,
            paused = paused,
        );
        self.publish_status();
    }

    fn snapshot(&self) -> RebaseWatchState {
        self.state.lock().expect("rebase state poisoned").clone()
    }

    fn publish_status(&self) {
        self.bus.publish(Event::RebaseWatcherStatus {
            state: self.snapshot(),
        });
    }
}

fn rebase_failure_message(error: &GitError) -> String {
    match error {
        GitError::RebaseConflict { base_branch, .. } => format!(
            "merge conflicts rebasing onto {base_branch}; resolve manually and resume"
        ),
        other => other.to_string(),
    }
}
