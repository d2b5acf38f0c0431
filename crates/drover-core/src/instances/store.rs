use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use drover_protocol::{InstanceStatus, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::errors::InstanceError;
use super::types::AgentInstance;
use crate::statedir::io;

const STORE_DIR: &str = ".drover";
const STORE_FILE: &str = "instances.json";

/// Cap on the recently-used repo list.
const MAX_RECENT_REPOS: usize = 32;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreData {
    #[serde(default)]
    instances: HashMap<String, AgentInstance>,
    #[serde(default)]
    recent_repos: Vec<PathBuf>,
}

/// Process-wide settings store, serialised by a single in-process lock.
///
/// Every mutation persists atomically before returning.
#[derive(Debug)]
pub struct InstanceStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl InstanceStore {
    /// Open the store at its default location under the user's home.
    ///
    /// An unreadable store is fatal: returning the error aborts startup
    /// rather than silently orphaning every known instance.
    pub fn open_default() -> Result<Self, InstanceError> {
        let home = dirs::home_dir().ok_or(InstanceError::NoHomeDirectory)?;
        Self::open(&home.join(STORE_DIR).join(STORE_FILE))
    }

    pub fn open(path: &Path) -> Result<Self, InstanceError> {
        let data = match std::fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => StoreData::default(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| InstanceError::StoreUnreadable {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => {
                return Err(InstanceError::StoreUnreadable {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
            }
        };

        info!(
            event = "core.instances.store_opened",
            path = %path.display(),
            instances = data.instances.len(),
        );

        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }

    pub fn list(&self) -> Vec<AgentInstance> {
        let data = self.data.lock().expect("instance store poisoned");
        let mut instances: Vec<_> = data.instances.values().cloned().collect();
        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        instances
    }

    pub fn get(&self, id: &str) -> Option<AgentInstance> {
        self.data
            .lock()
            .expect("instance store poisoned")
            .instances
            .get(id)
            .cloned()
    }

    /// The instance owning a session, if any.
    pub fn find_by_session(&self, session_id: &SessionId) -> Option<AgentInstance> {
        self.data
            .lock()
            .expect("instance store poisoned")
            .instances
            .values()
            .find(|i| i.session_id.as_ref() == Some(session_id))
            .cloned()
    }

    pub fn upsert(&self, instance: AgentInstance) -> Result<(), InstanceError> {
        let mut data = self.data.lock().expect("instance store poisoned");
        data.instances.insert(instance.id.clone(), instance);
        self.persist(&data)
    }

    pub fn remove(&self, id: &str) -> Result<bool, InstanceError> {
        let mut data = self.data.lock().expect("instance store poisoned");
        let removed = data.instances.remove(id).is_some();
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }

    pub fn set_status(&self, id: &str, status: InstanceStatus) -> Result<(), InstanceError> {
        let mut data = self.data.lock().expect("instance store poisoned");
        let instance = data
            .instances
            .get_mut(id)
            .ok_or_else(|| InstanceError::NotFound { id: id.to_string() })?;
        instance.status = status;
        instance.updated_at = Utc::now();
        self.persist(&data)
    }

    /// Remember which session an instance is currently bound to.
    pub fn record_session(
        &self,
        id: &str,
        session_id: Option<SessionId>,
    ) -> Result<(), InstanceError> {
        let mut data = self.data.lock().expect("instance store poisoned");
        let instance = data
            .instances
            .get_mut(id)
            .ok_or_else(|| InstanceError::NotFound { id: id.to_string() })?;
        instance.session_id = session_id;
        instance.updated_at = Utc::now();
        self.persist(&data)
    }

    /// Promote a repo to the front of the recently-used list.
    pub fn add_recent_repo(&self, repo_path: &Path) -> Result<(), InstanceError> {
        let mut data = self.data.lock().expect("instance store poisoned");
        data.recent_repos.retain(|p| p != repo_path);
        data.recent_repos.insert(0, repo_path.to_path_buf());
        data.recent_repos.truncate(MAX_RECENT_REPOS);
        self.persist(&data)
    }

    pub fn recent_repos(&self) -> Vec<PathBuf> {
        self.data
            .lock()
            .expect("instance store poisoned")
            .recent_repos
            .clone()
    }

    fn persist(&self, data: &StoreData) -> Result<(), InstanceError> {
        io::write_json_atomic(&self.path, data).map_err(|e| {
            warn!(
                event = "core.instances.persist_failed",
                path = %self.path.display(),
                error = %e,
            );
            InstanceError::PersistFailed {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::types::AgentInstanceConfig;
    use drover_protocol::{AgentType, RebaseFrequency};

    fn config(repo: &Path) -> AgentInstanceConfig {
        AgentInstanceConfig {
            repo_path: repo.to_path_buf(),
            agent_type: AgentType::Claude,
            task_description: "Task".to_string(),
            branch_name: "feature/x".to_string(),
            base_branch: "main".to_string(),
            use_worktree: false,
            auto_commit: true,
            auto_push: false,
            commit_interval: 30,
            rebase_frequency: RebaseFrequency::OnDemand,
            system_prompt: None,
            context_preservation: false,
        }
    }

    #[test]
    fn test_missing_store_starts_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = InstanceStore::open(&tmp.path().join("instances.json")).unwrap();
        assert!(store.list().is_empty());
        assert!(store.recent_repos().is_empty());
    }

    #[test]
    fn test_corrupt_store_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("instances.json");
        std::fs::write(&path, "{ definitely broken").unwrap();
        let err = InstanceStore::open(&path).unwrap_err();
        assert!(matches!(err, InstanceError::StoreUnreadable { .. }));
    }

    #[test]
    fn test_upsert_persists_across_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("instances.json");
        let store = InstanceStore::open(&path).unwrap();

        let instance = AgentInstance::new(config(tmp.path()), InstanceStatus::Waiting);
        let id = instance.id.clone();
        store.upsert(instance).unwrap();
        store
            .record_session(&id, Some(SessionId::new("sess_abcdef12")))
            .unwrap();
        store.set_status(&id, InstanceStatus::Running).unwrap();

        let reopened = InstanceStore::open(&path).unwrap();
        let loaded = reopened.get(&id).unwrap();
        assert_eq!(loaded.status, InstanceStatus::Running);
        assert_eq!(
            loaded.session_id,
            Some(SessionId::new("sess_abcdef12"))
        );
        assert_eq!(
            reopened.find_by_session(&SessionId::new("sess_abcdef12")).unwrap().id,
            id
        );
    }

    #[test]
    fn test_recent_repos_dedupe_and_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = InstanceStore::open(&tmp.path().join("instances.json")).unwrap();

        store.add_recent_repo(Path::new("/repoA")).unwrap();
        store.add_recent_repo(Path::new("/repoB")).unwrap();
        store.add_recent_repo(Path::new("/repoA")).unwrap();

        assert_eq!(
            store.recent_repos(),
            vec![PathBuf::from("/repoA"), PathBuf::from("/repoB")]
        );
    }

    #[test]
    fn test_set_status_on_unknown_instance_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = InstanceStore::open(&tmp.path().join("instances.json")).unwrap();
        let err = store.set_status("inst_missing", InstanceStatus::Error).unwrap_err();
        assert!(matches!(err, InstanceError::NotFound { .. }));
    }
}
