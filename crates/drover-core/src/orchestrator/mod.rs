//! The orchestrator facade: wires every component together and implements
//! the inbound request surface.
//!
//! Components never hold pointers into each other's aggregates — they share
//! the event bus and the public contracts here. The settings store is an
//! explicit constructor dependency.

pub mod errors;
pub mod requests;
mod sessions;

pub use errors::SessionError;
pub use requests::Request;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use drover_protocol::SessionId;
use tracing::{info, warn};

use crate::events::EventBus;
use crate::instances::InstanceStore;
use crate::listener::AgentListener;
use crate::locks::{DeclarationStore, LockManager};
use crate::rebase::RebaseManager;
use crate::recovery::RecoveryScanner;
use crate::registry::Registry;
use crate::watcher::WatcherManager;

pub struct Orchestrator {
    store: Arc<InstanceStore>,
    bus: Arc<EventBus>,
    registry: Arc<Registry>,
    locks: Arc<LockManager>,
    declarations: DeclarationStore,
    watchers: Arc<WatcherManager>,
    rebase: RebaseManager,
    recovery: RecoveryScanner,
    listener: Mutex<Option<AgentListener>>,
}

impl Orchestrator {
    /// Wire the full engine around an opened settings store.
    pub fn new(store: Arc<InstanceStore>) -> Self {
        let bus = Arc::new(EventBus::new());
        let registry = Arc::new(Registry::new(bus.clone()));
        let locks = Arc::new(LockManager::new(bus.clone()));
        let watchers = Arc::new(WatcherManager::new(
            registry.clone(),
            locks.clone(),
            bus.clone(),
        ));
        let rebase = RebaseManager::new(registry.clone(), watchers.clone(), bus.clone());
        let recovery = RecoveryScanner::new(store.clone(), registry.clone(), bus.clone());

        Self {
            store,
            bus,
            registry,
            locks,
            declarations: DeclarationStore::new(),
            watchers,
            rebase,
            recovery,
            listener: Mutex::new(None),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn declarations(&self) -> &DeclarationStore {
        &self.declarations
    }

    pub fn watchers(&self) -> &Arc<WatcherManager> {
        &self.watchers
    }

    pub fn rebase(&self) -> &RebaseManager {
        &self.rebase
    }

    pub fn recovery(&self) -> &RecoveryScanner {
        &self.recovery
    }

    pub fn instances(&self) -> &Arc<InstanceStore> {
        &self.store
    }

    /// Supervisor startup: watch every recently-used repo, reconcile the
    /// registry from disk, announce orphans, and resume instances that were
    /// running when the process last stopped.
    pub fn start(&self) -> Result<(), crate::listener::ListenerError> {
        let repos: Vec<PathBuf> = self
            .store
            .recent_repos()
            .into_iter()
            .filter(|repo| repo.is_dir())
            .collect();
        let listener = AgentListener::start(self.registry.clone(), &repos)?;
        *self.listener.lock().expect("orchestrator poisoned") = Some(listener);

        self.recovery.startup_scan();
        self.resume_instances();
        info!(event = "core.orchestrator.started", repos = repos.len());
        Ok(())
    }

    /// Re-arm watchers for instances the last process run left active.
    fn resume_instances(&self) {
        for instance in self.store.list() {
            if instance.status != drover_protocol::InstanceStatus::Running {
                continue;
            }
            let Some(session_id) = instance.session_id.clone() else {
                continue;
            };
            if let Err(e) = self.start_watcher(&session_id) {
                warn!(
                    event = "core.orchestrator.resume_watcher_failed",
                    session_id = %session_id,
                    error = %e,
                );
            }
            if instance.config.rebase_frequency.activates_watcher()
                && let Err(e) = self.start_rebase_watcher(&session_id)
            {
                warn!(
                    event = "core.orchestrator.resume_rebase_failed",
                    session_id = %session_id,
                    error = %e,
                );
            }
        }
    }

    /// Make sure a repo is watched; used when sessions are created against a
    /// repo the listener has not seen yet.
    pub(crate) fn ensure_repo_watched(&self, repo_path: &std::path::Path) {
        let listener = self.listener.lock().expect("orchestrator poisoned");
        if let Some(listener) = listener.as_ref()
            && let Err(e) = listener.add_repo(repo_path)
        {
            warn!(
                event = "core.orchestrator.watch_repo_failed",
                repo = %repo_path.display(),
                error = %e,
            );
        }
    }

    /// Graceful shutdown: flush pending commits, cancel pollers, detach the
    /// listener.
    pub fn shutdown(&self) {
        info!(event = "core.orchestrator.shutdown_started");
        self.watchers.stop_all();
        self.rebase.dispose();
        if let Some(listener) = self.listener.lock().expect("orchestrator poisoned").take() {
            listener.stop();
        }
        info!(event = "core.orchestrator.shutdown_completed");
    }

    pub(crate) fn session_repo(&self, session_id: &SessionId) -> Option<PathBuf> {
        self.registry
            .get_session(session_id)
            .map(|s| s.repo_path)
            .or_else(|| {
                self.store
                    .find_by_session(session_id)
                    .map(|i| i.config.repo_path)
            })
    }
}
