//! On-disk wire types for the `.S9N_KIT_DevOpsAgent/` state directory.
//!
//! All JSON files use camelCase keys and UTF-8 with `\n` line endings.
//! Relative paths inside persisted structures use forward slashes on all
//! platforms. Timestamps are RFC3339 UTC.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ActivityKind, AgentId, AgentType, Capability, RebaseFrequency, SessionId, SessionStatus,
};

/// Schema of `agents/<agentId>.json` — one file per live agent process.
///
/// Derived fields (`lastHeartbeat`, `isAlive`) are never persisted here;
/// they live in the in-memory registry and decay from heartbeat files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_id: AgentId,
    pub agent_type: AgentType,
    pub agent_name: String,
    pub version: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

/// Schema of `sessions/<sessionId>.json` — one unit of work by one agent on
/// one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub agent_type: AgentType,
    pub task: String,
    pub branch_name: String,
    pub base_branch: String,
    /// Equals `repo_path` when the session runs without a worktree.
    pub worktree_path: PathBuf,
    pub repo_path: PathBuf,
    pub status: SessionStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub commit_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<String>,
}

/// One line of `activity/<sessionId>.log` (newline-delimited JSON, append-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// An exclusive claim on one relative file path in a repo.
///
/// `file_path` is repo-relative with forward slashes. At most one lock exists
/// per `(repo_path, file_path)`; the lock manager enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLock {
    pub repo_path: PathBuf,
    pub file_path: String,
    pub session_id: SessionId,
    pub agent_type: AgentType,
    pub locked_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub auto_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
}

/// Transient value surfaced when a session writes a path locked by another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConflict {
    pub file: String,
    /// Agent type of the lock holder.
    pub conflicts_with: AgentType,
    /// Session id of the lock holder.
    pub session: SessionId,
    pub reason: String,
    pub declared_at: DateTime<Utc>,
}

/// Orchestrator-to-agent command, one JSON object per line in
/// `commands/<sessionId>.cmd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum KanvasCommand {
    StartWatching,
    StopWatching,
    Commit { message: String },
    Push,
    Pause,
    Resume,
    Stop,
}

/// Legacy session-granular edit declaration,
/// `coordination/active-edits/<agentType>-<shortSessionId>.json`.
///
/// Compat-only: declarations are recorded for UI/debugging and do not
/// participate in conflict detection — `locks.json` is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDeclaration {
    pub agent: AgentType,
    pub session: SessionId,
    pub files: Vec<String>,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub declared_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
}

/// Reconstruction record for a session file with no owning agent instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedSession {
    pub session_id: SessionId,
    pub repo_path: PathBuf,
    pub session_file: PathBuf,
    pub report: SessionReport,
    pub has_matching_instance: bool,
    pub last_modified: DateTime<Utc>,
}

/// Outcome of the most recent rebase attempt for a watched session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseResult {
    pub success: bool,
    pub message: String,
    pub had_changes: bool,
}

impl RebaseResult {
    pub fn ok(message: impl Into<String>, had_changes: bool) -> Self {
        Self {
            success: true,
            message: message.into(),
            had_changes,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            had_changes: false,
        }
    }
}

/// Snapshot of one rebase watcher, published on every status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseWatchState {
    pub session_id: SessionId,
    pub repo_path: PathBuf,
    pub base_branch: String,
    pub current_branch: String,
    pub rebase_frequency: RebaseFrequency,
    pub poll_interval_ms: u64,
    pub is_watching: bool,
    pub is_paused: bool,
    pub is_rebasing: bool,
    pub behind_count: u32,
    pub ahead_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rebase_result: Option<RebaseResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> SessionReport {
        SessionReport {
            session_id: SessionId::new("sess_abcdef12"),
            agent_id: AgentId::new("claude-1234"),
            agent_type: AgentType::Claude,
            task: "Add login form validation".to_string(),
            branch_name: "feature/login-validation".to_string(),
            base_branch: "main".to_string(),
            worktree_path: PathBuf::from("/tmp/worktrees/login-validation"),
            repo_path: PathBuf::from("/tmp/repo"),
            status: SessionStatus::Active,
            created: "2026-03-01T10:00:00Z".parse().unwrap(),
            updated: "2026-03-01T10:05:00Z".parse().unwrap(),
            commit_count: 3,
            last_commit: Some("abc123".to_string()),
        }
    }

    #[test]
    fn test_agent_record_wire_keys_are_camel_case() {
        let record = AgentRecord {
            agent_id: AgentId::new("claude-1234"),
            agent_type: AgentType::Claude,
            agent_name: "Claude Code".to_string(),
            version: "2.1.0".to_string(),
            pid: 4242,
            started_at: "2026-03-01T09:00:00Z".parse().unwrap(),
            capabilities: vec![Capability::FileWatching, Capability::AutoCommit],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""agentId":"claude-1234""#));
        assert!(json.contains(r#""agentType":"claude""#));
        assert!(json.contains(r#""startedAt""#));
        assert!(json.contains(r#""file-watching""#));
    }

    #[test]
    fn test_agent_record_missing_capabilities_defaults_empty() {
        let json = r#"{
            "agentId": "aider-9",
            "agentType": "aider",
            "agentName": "Aider",
            "version": "0.40",
            "pid": 100,
            "startedAt": "2026-03-01T09:00:00Z"
        }"#;
        let record: AgentRecord = serde_json::from_str(json).unwrap();
        assert!(record.capabilities.is_empty());
    }

    #[test]
    fn test_session_report_roundtrip() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""sessionId":"sess_abcdef12""#));
        assert!(json.contains(r#""branchName":"feature/login-validation""#));
        assert!(json.contains(r#""commitCount":3"#));
        let back: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }

    #[test]
    fn test_activity_entry_type_key() {
        let entry = ActivityEntry {
            id: "e1".to_string(),
            session_id: SessionId::new("sess_abcdef12"),
            timestamp: "2026-03-01T10:00:00Z".parse().unwrap(),
            kind: ActivityKind::Commit,
            message: "Committed 2 files".to_string(),
            details: serde_json::Map::new(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""type":"commit""#));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_kanvas_command_wire_shape() {
        let cmd = KanvasCommand::Commit {
            message: "fix: typo".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"command":"commit","message":"fix: typo"}"#);

        let parsed: KanvasCommand = serde_json::from_str(r#"{"command":"start-watching"}"#).unwrap();
        assert_eq!(parsed, KanvasCommand::StartWatching);
    }

    #[test]
    fn test_file_lock_roundtrip() {
        let lock = FileLock {
            repo_path: PathBuf::from("/tmp/repo"),
            file_path: "src/shared.ts".to_string(),
            session_id: SessionId::new("sess_abcdef12"),
            agent_type: AgentType::Cursor,
            locked_at: "2026-03-01T10:00:00Z".parse().unwrap(),
            last_modified: "2026-03-01T10:01:00Z".parse().unwrap(),
            auto_locked: true,
            branch_name: Some("feature/x".to_string()),
        };
        let json = serde_json::to_string(&lock).unwrap();
        assert!(json.contains(r#""filePath":"src/shared.ts""#));
        assert!(json.contains(r#""autoLocked":true"#));
        let back: FileLock = serde_json::from_str(&json).unwrap();
        assert_eq!(lock, back);
    }

    #[test]
    fn test_orphaned_session_roundtrip() {
        let orphan = OrphanedSession {
            session_id: SessionId::new("sess_00000001"),
            repo_path: PathBuf::from("/repoB"),
            session_file: PathBuf::from(
                "/repoB/.S9N_KIT_DevOpsAgent/sessions/sess_00000001.json",
            ),
            report: sample_report(),
            has_matching_instance: false,
            last_modified: "2026-03-01T10:00:00Z".parse().unwrap(),
        };
        let json = serde_json::to_string(&orphan).unwrap();
        assert!(json.contains(r#""hasMatchingInstance":false"#));
        let back: OrphanedSession = serde_json::from_str(&json).unwrap();
        assert_eq!(orphan, back);
    }

    #[test]
    fn test_rebase_watch_state_serializes_counts() {
        let state = RebaseWatchState {
            session_id: SessionId::new("sess_abcdef12"),
            repo_path: PathBuf::from("/tmp/repo"),
            base_branch: "main".to_string(),
            current_branch: "feature/x".to_string(),
            rebase_frequency: RebaseFrequency::OnDemand,
            poll_interval_ms: 60_000,
            is_watching: true,
            is_paused: false,
            is_rebasing: false,
            behind_count: 3,
            ahead_count: 1,
            last_checked: None,
            last_rebase_result: Some(RebaseResult::ok("rebased onto main", true)),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""behindCount":3"#));
        assert!(json.contains(r#""rebaseFrequency":"on-demand""#));
        assert!(json.contains(r#""hadChanges":true"#));
    }
}
