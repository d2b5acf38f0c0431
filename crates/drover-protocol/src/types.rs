use serde::{Deserialize, Serialize};

/// Generate a newtype wrapper around `String` with standard trait impls.
///
/// Each generated type gets: `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`,
/// `Serialize`/`Deserialize` (transparent), `Display`, `Deref<Target=str>`,
/// `AsRef<str>`, `Borrow<str>`, `From<String>`, `From<&str>`.
macro_rules! newtype_string {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

newtype_string! {
    /// Opaque identifier an agent process chooses for itself, stable for the
    /// lifetime of that process (e.g. `"claude-a1b2c3d4"`).
    AgentId
}

newtype_string! {
    /// Opaque session identifier with the `sess_` prefix (e.g. `"sess_abcdef12"`).
    SessionId
}

impl SessionId {
    /// The `sess_` prefix every well-formed session id carries.
    pub const PREFIX: &'static str = "sess_";

    /// Whether the id carries the expected `sess_` prefix.
    pub fn is_well_formed(&self) -> bool {
        self.0.starts_with(Self::PREFIX) && self.0.len() > Self::PREFIX.len()
    }

    /// Short form: the last 8 characters of the id.
    ///
    /// Used in filenames written next to agent processes
    /// (`.devops-commit-<short>.msg`, `coordination/active-edits/<agentType>-<short>.json`)
    /// and by the orphan-cleanup heuristic that matches agent files.
    pub fn short(&self) -> &str {
        let len = self.0.len();
        &self.0[len.saturating_sub(8)..]
    }
}

/// The kinds of agent processes that can introduce themselves into a repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Claude,
    Cursor,
    Copilot,
    Cline,
    Aider,
    Warp,
    Custom,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Claude => "claude",
            AgentType::Cursor => "cursor",
            AgentType::Copilot => "copilot",
            AgentType::Cline => "cline",
            AgentType::Aider => "aider",
            AgentType::Warp => "warp",
            AgentType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(AgentType::Claude),
            "cursor" => Ok(AgentType::Cursor),
            "copilot" => Ok(AgentType::Copilot),
            "cline" => Ok(AgentType::Cline),
            "aider" => Ok(AgentType::Aider),
            "warp" => Ok(AgentType::Warp),
            "custom" => Ok(AgentType::Custom),
            other => Err(format!(
                "Unknown agent type '{other}'. Valid: claude, cursor, copilot, cline, aider, warp, custom"
            )),
        }
    }
}

/// Closed vocabulary of capabilities an agent may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    FileWatching,
    AutoCommit,
    CodeGeneration,
    CodeReview,
    Chat,
    TestExecution,
    Deployment,
}

/// Lifecycle status of a reported session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Active,
    Watching,
    Paused,
    Error,
    Closed,
}

impl SessionStatus {
    /// Closed sessions release their branch-name uniqueness claim and no
    /// longer require an existing worktree.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionStatus::Closed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Active => "active",
            SessionStatus::Watching => "watching",
            SessionStatus::Paused => "paused",
            SessionStatus::Error => "error",
            SessionStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Classification of an activity-log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Success,
    Error,
    Warning,
    Info,
    Commit,
    File,
    Git,
}

/// How often a session's branch should be rebased against its base.
///
/// Only `on-demand` activates the rebase watcher's poll timer; `manual`
/// sessions rebase exclusively through explicit trigger requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebaseFrequency {
    Manual,
    OnDemand,
}

impl RebaseFrequency {
    pub fn activates_watcher(&self) -> bool {
        matches!(self, RebaseFrequency::OnDemand)
    }
}

/// Runtime status of an orchestrator-owned agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Waiting,
    Running,
    Stopped,
    Error,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Waiting => "waiting",
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_short_form() {
        let id = SessionId::new("sess_abcdef12");
        assert_eq!(id.short(), "abcdef12");
        assert!(id.is_well_formed());
    }

    #[test]
    fn test_session_id_short_form_of_tiny_id() {
        let id = SessionId::new("sess_1");
        assert_eq!(id.short(), "sess_1");
        assert!(id.is_well_formed());
    }

    #[test]
    fn test_session_id_without_prefix_is_malformed() {
        let id = SessionId::new("abcdef12");
        assert!(!id.is_well_formed());
    }

    #[test]
    fn test_agent_type_serde_lowercase() {
        let json = serde_json::to_string(&AgentType::Claude).unwrap();
        assert_eq!(json, r#""claude""#);
        let parsed: AgentType = serde_json::from_str(r#""aider""#).unwrap();
        assert_eq!(parsed, AgentType::Aider);
    }

    #[test]
    fn test_agent_type_rejects_unknown() {
        let result: Result<AgentType, _> = serde_json::from_str(r#""devin""#);
        assert!(result.is_err());
        assert!("devin".parse::<AgentType>().is_err());
    }

    #[test]
    fn test_capability_kebab_case() {
        let json = serde_json::to_string(&Capability::AutoCommit).unwrap();
        assert_eq!(json, r#""auto-commit""#);
        let parsed: Capability = serde_json::from_str(r#""test-execution""#).unwrap();
        assert_eq!(parsed, Capability::TestExecution);
    }

    #[test]
    fn test_session_status_roundtrip() {
        for status in [
            SessionStatus::Idle,
            SessionStatus::Active,
            SessionStatus::Watching,
            SessionStatus::Paused,
            SessionStatus::Error,
            SessionStatus::Closed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: SessionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, back);
            assert_eq!(json.trim_matches('"'), status.to_string());
        }
    }

    #[test]
    fn test_rebase_frequency_wire_names() {
        assert_eq!(
            serde_json::to_string(&RebaseFrequency::OnDemand).unwrap(),
            r#""on-demand""#
        );
        assert!(RebaseFrequency::OnDemand.activates_watcher());
        assert!(!RebaseFrequency::Manual.activates_watcher());
    }
}
