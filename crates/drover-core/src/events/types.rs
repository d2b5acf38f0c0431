use std::path::PathBuf;

use chrono::{DateTime, Utc};
use drover_protocol::{
    ActivityEntry, AgentId, AgentRecord, FileConflict, OrphanedSession, RebaseWatchState,
    SessionId, SessionReport,
};
use serde::{Deserialize, Serialize};

/// What happened to a file lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockChangeKind {
    Acquired,
    Released,
    ForceReleased,
    Conflict,
}

/// All business events the core publishes.
///
/// Each variant describes _what happened_, not what should happen. Only
/// state changes produce events — failures travel on the `Result` channel
/// of the operation that hit them, plus an activity-log entry where a
/// session is affected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    /// An `agents/<id>.json` file appeared in a watched repo.
    AgentRegistered {
        repo_path: PathBuf,
        agent: AgentRecord,
    },
    /// The agent's file was removed.
    AgentUnregistered {
        repo_path: PathBuf,
        agent_id: AgentId,
    },
    /// The agent's heartbeat file was touched.
    AgentHeartbeat {
        agent_id: AgentId,
        at: DateTime<Utc>,
    },
    /// Derived liveness flipped (heartbeat decay or recovery).
    AgentStatusChanged {
        agent_id: AgentId,
        is_alive: bool,
    },
    /// A session file appeared.
    SessionReported { report: SessionReport },
    /// A session file changed.
    SessionUpdated { report: SessionReport },
    /// A session was closed or its file removed.
    SessionClosed { session_id: SessionId },
    /// A line was appended to a session's activity log.
    ActivityReported { entry: ActivityEntry },

    /// The session file watcher observed a change in a worktree.
    FileChanged {
        session_id: SessionId,
        path: String,
    },
    /// A debounce deadline elapsed and a commit attempt started.
    CommitTriggered {
        session_id: SessionId,
        file_count: usize,
    },
    /// An auto-commit landed.
    CommitCompleted {
        session_id: SessionId,
        hash: String,
        message: String,
        file_count: usize,
    },

    /// A session tried to write a path locked by another session.
    ConflictDetected { conflict: FileConflict },
    /// A lock was acquired, released, force-released, or contested.
    LockChanged {
        repo_path: PathBuf,
        file_path: String,
        change: LockChangeKind,
        session_id: SessionId,
    },

    /// A rebase watcher changed state (started, tick, paused, resumed, ...).
    RebaseWatcherStatus { state: RebaseWatchState },
    /// A poll observed the base branch ahead of the session branch.
    RebaseRemoteChangesDetected {
        session_id: SessionId,
        ahead: u32,
        behind: u32,
    },
    /// An automatic rebase finished cleanly.
    RebaseAutoCompleted {
        session_id: SessionId,
        base_branch: String,
    },

    /// Startup or on-demand scan found sessions with no owning instance.
    OrphanedSessionsFound { orphans: Vec<OrphanedSession> },
    /// An orphaned session was adopted into a fresh instance.
    InstanceRecovered {
        instance_id: String,
        session_id: SessionId,
    },
}

impl Event {
    /// The kebab-case wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::AgentRegistered { .. } => "agent-registered",
            Event::AgentUnregistered { .. } => "agent-unregistered",
            Event::AgentHeartbeat { .. } => "agent-heartbeat",
            Event::AgentStatusChanged { .. } => "agent-status-changed",
            Event::SessionReported { .. } => "session-reported",
            Event::SessionUpdated { .. } => "session-updated",
            Event::SessionClosed { .. } => "session-closed",
            Event::ActivityReported { .. } => "activity-reported",
            Event::FileChanged { .. } => "file-changed",
            Event::CommitTriggered { .. } => "commit-triggered",
            Event::CommitCompleted { .. } => "commit-completed",
            Event::ConflictDetected { .. } => "conflict-detected",
            Event::LockChanged { .. } => "lock-changed",
            Event::RebaseWatcherStatus { .. } => "rebase-watcher-status",
            Event::RebaseRemoteChangesDetected { .. } => "rebase-remote-changes-detected",
            Event::RebaseAutoCompleted { .. } => "rebase-auto-completed",
            Event::OrphanedSessionsFound { .. } => "orphaned-sessions-found",
            Event::InstanceRecovered { .. } => "instance-recovered",
        }
    }
}
