use std::path::PathBuf;

use chrono::{DateTime, Utc};
use drover_protocol::{AgentType, InstanceStatus, RebaseFrequency, SessionId};
use serde::{Deserialize, Serialize};

fn default_auto_commit() -> bool {
    true
}

fn default_commit_interval() -> u32 {
    crate::config::DEFAULT_COMMIT_INTERVAL_SECS
}

/// Everything needed to (re)start a session with the same parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInstanceConfig {
    pub repo_path: PathBuf,
    pub agent_type: AgentType,
    pub task_description: String,
    pub branch_name: String,
    pub base_branch: String,
    #[serde(default)]
    pub use_worktree: bool,
    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,
    /// Push after each auto-commit. Push failures are warnings, never fatal.
    #[serde(default)]
    pub auto_push: bool,
    /// Debounce interval in seconds; clamped to [10, 300] at use sites.
    #[serde(default = "default_commit_interval")]
    pub commit_interval: u32,
    pub rebase_frequency: RebaseFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub context_preservation: bool,
}

/// A durable instance record: full config plus runtime state.
///
/// Holds the last observed `session_id`, never a session object — lookups
/// go through the registry on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInstance {
    pub id: String,
    pub config: AgentInstanceConfig,
    pub status: InstanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentInstance {
    pub fn new(config: AgentInstanceConfig, status: InstanceStatus) -> Self {
        let now = Utc::now();
        Self {
            id: format!("inst_{}", uuid::Uuid::new_v4().simple()),
            config,
            status,
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_gets_unique_prefixed_id() {
        let config = AgentInstanceConfig {
            repo_path: PathBuf::from("/tmp/repo"),
            agent_type: AgentType::Claude,
            task_description: "Ship the login form".to_string(),
            branch_name: "feature/login".to_string(),
            base_branch: "main".to_string(),
            use_worktree: true,
            auto_commit: true,
            auto_push: false,
            commit_interval: 30,
            rebase_frequency: RebaseFrequency::OnDemand,
            system_prompt: None,
            context_preservation: false,
        };
        let a = AgentInstance::new(config.clone(), InstanceStatus::Waiting);
        let b = AgentInstance::new(config, InstanceStatus::Waiting);
        assert!(a.id.starts_with("inst_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_config_defaults_fill_in() {
        let json = r#"{
            "repoPath": "/tmp/repo",
            "agentType": "claude",
            "taskDescription": "X",
            "branchName": "feature/x",
            "baseBranch": "main",
            "rebaseFrequency": "on-demand"
        }"#;
        let config: AgentInstanceConfig = serde_json::from_str(json).unwrap();
        assert!(config.auto_commit);
        assert_eq!(config.commit_interval, 30);
        assert!(!config.use_worktree);
    }
}
