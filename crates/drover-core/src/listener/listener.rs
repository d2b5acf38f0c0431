use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use drover_protocol::{AgentId, AgentRecord, SessionId, SessionReport};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::errors::ListenerError;
use crate::config::{LISTENER_DEBOUNCE, LIVENESS_SWEEP_INTERVAL};
use crate::registry::Registry;
use crate::statedir::{PathCategory, StateDir, io};

enum Msg {
    Fs(notify::Result<notify::Event>),
    Stop,
}

/// Watches repo state directories and drives registry ingest.
pub struct AgentListener {
    registry: Arc<Registry>,
    repos: Arc<Mutex<Vec<StateDir>>>,
    watchers: Mutex<Vec<RecommendedWatcher>>,
    tx: Sender<Msg>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AgentListener {
    /// Start watching `repos`, reconciling each from disk before the
    /// background dispatcher takes over.
    pub fn start(registry: Arc<Registry>, repos: &[PathBuf]) -> Result<Self, ListenerError> {
        let (tx, rx) = mpsc::channel();
        let listener = Self {
            registry: registry.clone(),
            repos: Arc::new(Mutex::new(Vec::new())),
            watchers: Mutex::new(Vec::new()),
            tx,
            thread: Mutex::new(None),
        };

        for repo in repos {
            listener.add_repo(repo)?;
        }

        let registry_for_thread = registry;
        let repos_for_thread = listener.repos.clone();
        let handle = std::thread::Builder::new()
            .name("agent-listener".to_string())
            .spawn(move || dispatch_loop(rx, registry_for_thread, repos_for_thread))
            .expect("spawn agent-listener thread");
        *listener.thread.lock().expect("listener poisoned") = Some(handle);

        Ok(listener)
    }

    /// Watch one more repo and reconcile its current on-disk state.
    ///
    /// Idempotent per repo path.
    pub fn add_repo(&self, repo_path: &Path) -> Result<(), ListenerError> {
        let state_dir = StateDir::for_repo(repo_path);
        {
            let repos = self.repos.lock().expect("listener poisoned");
            if repos.iter().any(|sd| sd.repo_path() == repo_path) {
                return Ok(());
            }
        }

        // The root must exist to be watchable; subdirectories stay lazy.
        state_dir
            .ensure_dir(state_dir.root())
            .map_err(|e| ListenerError::WatchFailed {
                path: state_dir.root().to_path_buf(),
                message: e.to_string(),
            })?;

        let tx = self.tx.clone();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(Msg::Fs(res));
        })
        .map_err(|e| ListenerError::WatchFailed {
            path: state_dir.root().to_path_buf(),
            message: e.to_string(),
        })?;
        watcher
            .watch(state_dir.root(), RecursiveMode::Recursive)
            .map_err(|e| ListenerError::WatchFailed {
                path: state_dir.root().to_path_buf(),
                message: e.to_string(),
            })?;

        info!(
            event = "core.listener.repo_watched",
            repo = %repo_path.display(),
        );

        // Cold-start reconciliation: enumerate every file as if it had just
        // been created.
        reconcile_repo(&self.registry, &state_dir);

        self.watchers.lock().expect("listener poisoned").push(watcher);
        self.repos.lock().expect("listener poisoned").push(state_dir);
        Ok(())
    }

    /// Repos currently being watched.
    pub fn watched_repos(&self) -> Vec<PathBuf> {
        self.repos
            .lock()
            .expect("listener poisoned")
            .iter()
            .map(|sd| sd.repo_path().to_path_buf())
            .collect()
    }

    /// Stop the dispatcher and drop all watchers.
    pub fn stop(&self) {
        let _ = self.tx.send(Msg::Stop);
        if let Some(handle) = self.thread.lock().expect("listener poisoned").take() {
            let _ = handle.join();
        }
        self.watchers.lock().expect("listener poisoned").clear();
        info!(event = "core.listener.stopped");
    }
}

impl Drop for AgentListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch_loop(
    rx: mpsc::Receiver<Msg>,
    registry: Arc<Registry>,
    repos: Arc<Mutex<Vec<StateDir>>>,
) {
    // path → deadline; multiple events inside the window collapse to one read
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
    let mut next_sweep = Instant::now() + LIVENESS_SWEEP_INTERVAL;

    loop {
        let now = Instant::now();
        let wake_at = pending
            .values()
            .min()
            .copied()
            .unwrap_or(next_sweep)
            .min(next_sweep);
        let timeout = wake_at.saturating_duration_since(now).min(Duration::from_millis(500));

        match rx.recv_timeout(timeout) {
            Ok(Msg::Fs(Ok(event))) => {
                if is_relevant_kind(&event.kind) {
                    let deadline = Instant::now() + LISTENER_DEBOUNCE;
                    for path in event.paths {
                        pending.insert(path, deadline);
                    }
                }
            }
            Ok(Msg::Fs(Err(e))) => {
                warn!(event = "core.listener.watch_error", error = %e);
            }
            Ok(Msg::Stop) => {
                for path in std::mem::take(&mut pending).into_keys() {
                    dispatch_path(&registry, &repos, &path);
                }
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        let now = Instant::now();
        if now >= next_sweep {
            registry.sweep_liveness();
            next_sweep = now + LIVENESS_SWEEP_INTERVAL;
        }

        let due: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in due {
            pending.remove(&path);
            dispatch_path(&registry, &repos, &path);
        }
    }
}

fn is_relevant_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn dispatch_path(registry: &Registry, repos: &Arc<Mutex<Vec<StateDir>>>, path: &Path) {
    let state_dir = {
        let repos = repos.lock().expect("listener poisoned");
        repos
            .iter()
            .find(|sd| path.starts_with(sd.root()))
            .cloned()
    };
    let Some(state_dir) = state_dir else {
        return;
    };
    ingest_file(registry, &state_dir, path);
}

/// Route one file to the registry, re-reading it from disk.
fn ingest_file(registry: &Registry, state_dir: &StateDir, path: &Path) {
    let Some((category, name)) = PathCategory::classify(state_dir.root(), path) else {
        return;
    };

    match category {
        PathCategory::Agents => {
            let agent_id = AgentId::new(name);
            match io::read_json_lenient::<AgentRecord>(path) {
                Some(record) => {
                    if record.agent_id != agent_id {
                        warn!(
                            event = "core.listener.agent_id_mismatch",
                            file = %path.display(),
                            declared = %record.agent_id,
                        );
                    }
                    registry.ingest_agent_record(state_dir.repo_path().to_path_buf(), record);
                }
                None if !path.exists() => registry.remove_agent(&agent_id),
                None => {} // malformed but present: logged by the reader, dropped
            }
        }
        PathCategory::Sessions => {
            let session_id = SessionId::new(name);
            match io::read_json_lenient::<SessionReport>(path) {
                Some(report) => {
                    if report.session_id != session_id {
                        warn!(
                            event = "core.listener.session_id_mismatch",
                            file = %path.display(),
                            declared = %report.session_id,
                        );
                    }
                    registry.ingest_session_report(report);
                }
                None if !path.exists() => registry.remove_session(&session_id),
                None => {}
            }
        }
        PathCategory::Heartbeats => {
            if let Some(at) = heartbeat_instant(path) {
                registry.ingest_heartbeat(&AgentId::new(name), at);
            }
        }
        PathCategory::Activity => {
            if let Some(entry) = io::read_ndjson_lenient(path).into_iter().next_back() {
                registry.record_activity(entry);
            }
        }
        // Commands flow orchestrator → agent; locks and config are read
        // on demand by their owners.
        PathCategory::Commands | PathCategory::ActiveEdits | PathCategory::Locks
        | PathCategory::Config => {
            debug!(
                event = "core.listener.uningested_category",
                category = ?category,
                file = %path.display(),
            );
        }
    }
}

/// The heartbeat file's mtime is authoritative; the ISO-8601 body is a
/// portability fallback for filesystems with coarse timestamps.
fn heartbeat_instant(path: &Path) -> Option<DateTime<Utc>> {
    if let Ok(metadata) = std::fs::metadata(path)
        && let Ok(mtime) = metadata.modified()
    {
        return Some(DateTime::<Utc>::from(mtime));
    }
    let body = std::fs::read_to_string(path).ok()?;
    body.trim().parse::<DateTime<Utc>>().ok()
}

/// Enumerate every file under the state dir as a synthetic create event.
fn reconcile_repo(registry: &Registry, state_dir: &StateDir) {
    let mut count = 0usize;
    for entry in walkdir::WalkDir::new(state_dir.root())
        .max_depth(3)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        ingest_file(registry, state_dir, entry.path());
        count += 1;
    }
    info!(
        event = "core.listener.reconciled",
        repo = %state_dir.repo_path().display(),
        files = count,
    );
}
