use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use drover_protocol::{ActivityKind, AgentType, SessionId};
use glob::Pattern;
use notify::EventKind;
use tracing::{debug, info};

use super::commit::{self, CommitDisposition};
use crate::activity;
use crate::events::{Event, EventBus};
use crate::locks::{LockManager, LockOutcome};
use crate::registry::Registry;

/// Control messages; unbounded channel, never dropped.
pub(super) enum Ctrl {
    Pause,
    Resume,
    Stop { flush: bool },
}

/// Everything a session worker needs, owned for the thread's lifetime.
pub(super) struct WorkerDeps {
    pub session_id: SessionId,
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub branch_name: String,
    pub agent_type: AgentType,
    pub auto_push: bool,
    pub registry: Arc<Registry>,
    pub locks: Arc<LockManager>,
    pub bus: Arc<EventBus>,
}

/// Watch/ignore patterns compiled once per worker.
pub(super) struct PatternSet {
    watch: Vec<Pattern>,
    ignore: Vec<Pattern>,
}

impl PatternSet {
    pub fn compile(watch: &[String], ignore: &[String]) -> Self {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .filter_map(|p| match Pattern::new(p) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        tracing::warn!(
                            event = "core.watcher.bad_pattern",
                            pattern = %p,
                            error = %e,
                        );
                        None
                    }
                })
                .collect::<Vec<_>>()
        };
        Self {
            watch: compile(watch),
            ignore: compile(ignore),
        }
    }

    fn accepts(&self, relative: &str) -> bool {
        let watched =
            self.watch.is_empty() || self.watch.iter().any(|p| p.matches(relative));
        watched && !self.ignore.iter().any(|p| p.matches(relative))
    }
}

const IDLE_WAIT: Duration = Duration::from_millis(200);

/// The per-session worker: consumes fs events, assigns locks, and fires the
/// debounced commit. Runs until told to stop.
pub(super) fn worker_loop(
    deps: WorkerDeps,
    interval: Duration,
    patterns: PatternSet,
    fs_rx: Receiver<notify::Result<notify::Event>>,
    ctrl_rx: Receiver<Ctrl>,
    pending_flag: Arc<AtomicBool>,
) {
    let mut pending: BTreeSet<String> = BTreeSet::new();
    let mut conflicted: HashSet<String> = HashSet::new();
    let mut deadline: Option<Instant> = None;
    let mut paused = false;

    info!(
        event = "core.watcher.session_started",
        session_id = %deps.session_id,
        worktree = %deps.worktree_path.display(),
        interval_secs = interval.as_secs(),
    );

    loop {
        while let Ok(cmd) = ctrl_rx.try_recv() {
            match cmd {
                Ctrl::Pause => {
                    paused = true;
                    deadline = None;
                    pending_flag.store(false, Ordering::SeqCst);
                    info!(event = "core.watcher.paused", session_id = %deps.session_id);
                }
                Ctrl::Resume => {
                    paused = false;
                    if !pending.is_empty() {
                        deadline = Some(Instant::now() + interval);
                        pending_flag.store(true, Ordering::SeqCst);
                    }
                    info!(event = "core.watcher.resumed", session_id = %deps.session_id);
                }
                Ctrl::Stop { flush } => {
                    if flush && !pending.is_empty() && !paused {
                        let _ = commit::run_commit(&deps, &pending, !conflicted.is_empty());
                    }
                    pending_flag.store(false, Ordering::SeqCst);
                    info!(event = "core.watcher.session_stopped", session_id = %deps.session_id);
                    return;
                }
            }
        }

        let wait = match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()).min(IDLE_WAIT),
            None => IDLE_WAIT,
        };
        match fs_rx.recv_timeout(wait) {
            Ok(Ok(event)) => {
                if is_relevant_kind(&event.kind) {
                    for path in &event.paths {
                        if handle_file_event(&deps, &patterns, path, &mut pending, &mut conflicted)
                            && !paused
                        {
                            deadline = Some(Instant::now() + interval);
                            pending_flag.store(true, Ordering::SeqCst);
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    event = "core.watcher.fs_error",
                    session_id = %deps.session_id,
                    error = %e,
                );
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                pending_flag.store(false, Ordering::SeqCst);
                return;
            }
        }

        if let Some(d) = deadline
            && Instant::now() >= d
            && !paused
        {
            deadline = None;
            pending_flag.store(false, Ordering::SeqCst);
            match commit::run_commit(&deps, &pending, !conflicted.is_empty()) {
                CommitDisposition::Done => {
                    pending.clear();
                    conflicted.clear();
                }
                CommitDisposition::Defer => {
                    // Keep the pending set; the next burst re-arms the timer.
                }
                CommitDisposition::Pause => {
                    paused = true;
                }
            }
        }
    }
}

fn is_relevant_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Returns `true` when the event should reset the debounce timer.
fn handle_file_event(
    deps: &WorkerDeps,
    patterns: &PatternSet,
    path: &Path,
    pending: &mut BTreeSet<String>,
    conflicted: &mut HashSet<String>,
) -> bool {
    let Some(relative) = crate::locks::filter::normalize_relative(&deps.worktree_path, path)
    else {
        return false;
    };
    if crate::locks::filter::is_filtered(&relative) || !patterns.accepts(&relative) {
        return false;
    }

    let outcome = match deps.locks.auto_lock_file(
        &deps.repo_path,
        Path::new(&relative),
        &deps.session_id,
        deps.agent_type,
        Some(deps.branch_name.clone()),
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(
                event = "core.watcher.lock_error",
                session_id = %deps.session_id,
                file = %relative,
                error = %e,
            );
            return false;
        }
    };

    match outcome {
        LockOutcome::Held => {
            debug!(
                event = "core.watcher.file_changed",
                session_id = %deps.session_id,
                file = %relative,
            );
            pending.insert(relative.clone());
            activity::append(
                &deps.registry,
                &deps.repo_path,
                &deps.session_id,
                ActivityKind::File,
                format!("Modified {relative}"),
                activity::details([("path", serde_json::json!(relative))]),
            );
            deps.bus.publish(Event::FileChanged {
                session_id: deps.session_id.clone(),
                path: relative,
            });
            true
        }
        LockOutcome::Conflict(_) => {
            // Conflict events already went out via the lock manager. The
            // file stays out of this session's commit; keep observing.
            conflicted.insert(relative);
            false
        }
        LockOutcome::Skipped => false,
    }
}
