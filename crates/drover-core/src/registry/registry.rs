use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use drover_protocol::{
    ActivityEntry, AgentId, AgentRecord, AgentType, SessionId, SessionReport, SessionStatus,
};
use tracing::{debug, info, warn};

use crate::config::HEARTBEAT_TTL;
use crate::events::{Event, EventBus};
use crate::statedir::{StateDir, io};

/// One agent as the registry sees it: the on-disk record plus derived state.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEntry {
    pub record: AgentRecord,
    pub repo_path: PathBuf,
    pub last_heartbeat: DateTime<Utc>,
    pub is_alive: bool,
    /// Synthesised from a session report whose agent never introduced
    /// itself; replaced when a real `agents/<id>.json` arrives.
    pub provisional: bool,
}

/// Deterministic registry contents for round-trip comparisons.
///
/// Liveness booleans are time-dependent and excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub agents: Vec<AgentRecord>,
    pub sessions: Vec<SessionReport>,
}

#[derive(Default)]
struct Inner {
    agents: HashMap<AgentId, AgentEntry>,
    sessions: HashMap<SessionId, SessionReport>,
}

pub struct Registry {
    inner: Mutex<Inner>,
    bus: Arc<EventBus>,
}

impl Registry {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            bus,
        }
    }

    pub fn list_agents(&self) -> Vec<AgentEntry> {
        let inner = self.inner.lock().expect("registry poisoned");
        let mut agents: Vec<_> = inner.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.record.agent_id.cmp(&b.record.agent_id));
        agents
    }

    pub fn get_agent(&self, agent_id: &AgentId) -> Option<AgentEntry> {
        self.inner
            .lock()
            .expect("registry poisoned")
            .agents
            .get(agent_id)
            .cloned()
    }

    pub fn list_sessions(&self) -> Vec<SessionReport> {
        let inner = self.inner.lock().expect("registry poisoned");
        let mut sessions: Vec<_> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    pub fn get_session(&self, session_id: &SessionId) -> Option<SessionReport> {
        self.inner
            .lock()
            .expect("registry poisoned")
            .sessions
            .get(session_id)
            .cloned()
    }

    pub fn sessions_by_agent(&self, agent_id: &AgentId) -> Vec<SessionReport> {
        self.list_sessions()
            .into_iter()
            .filter(|s| &s.agent_id == agent_id)
            .collect()
    }

    pub fn sessions_by_agent_type(&self, agent_type: AgentType) -> Vec<SessionReport> {
        self.list_sessions()
            .into_iter()
            .filter(|s| s.agent_type == agent_type)
            .collect()
    }

    /// Upsert an agent from its `agents/<id>.json` contents.
    ///
    /// The file write itself counts as a liveness signal.
    pub fn ingest_agent_record(&self, repo_path: PathBuf, record: AgentRecord) {
        let now = Utc::now();
        let mut inner = self.inner.lock().expect("registry poisoned");

        match inner.agents.get_mut(&record.agent_id) {
            Some(entry) => {
                let was_provisional = entry.provisional;
                entry.record = record.clone();
                entry.repo_path = repo_path.clone();
                entry.last_heartbeat = now;
                entry.provisional = false;
                let revived = !entry.is_alive;
                entry.is_alive = true;
                drop(inner);
                if was_provisional {
                    info!(
                        event = "core.registry.agent_promoted",
                        agent_id = %record.agent_id,
                    );
                    self.bus.publish(Event::AgentRegistered { repo_path, agent: record });
                } else if revived {
                    self.bus.publish(Event::AgentStatusChanged {
                        agent_id: record.agent_id,
                        is_alive: true,
                    });
                }
            }
            None => {
                inner.agents.insert(
                    record.agent_id.clone(),
                    AgentEntry {
                        record: record.clone(),
                        repo_path: repo_path.clone(),
                        last_heartbeat: now,
                        is_alive: true,
                        provisional: false,
                    },
                );
                drop(inner);
                info!(
                    event = "core.registry.agent_registered",
                    agent_id = %record.agent_id,
                    agent_type = %record.agent_type,
                    repo = %repo_path.display(),
                );
                self.bus.publish(Event::AgentRegistered { repo_path, agent: record });
            }
        }
    }

    /// Upsert a session from its `sessions/<id>.json` contents.
    ///
    /// Unknown owning agents get a provisional registry entry so consumers
    /// always see a coherent agent/session pair; the listener reconciles it
    /// when the real agent file lands.
    pub fn ingest_session_report(&self, report: SessionReport) {
        let mut inner = self.inner.lock().expect("registry poisoned");

        // Branch names are exclusive among non-closed sessions of a repo.
        let duplicate_branch = !report.status.is_closed()
            && inner.sessions.values().any(|existing| {
                existing.session_id != report.session_id
                    && existing.repo_path == report.repo_path
                    && existing.branch_name == report.branch_name
                    && !existing.status.is_closed()
            });
        if duplicate_branch {
            drop(inner);
            warn!(
                event = "core.registry.session_branch_collision",
                session_id = %report.session_id,
                branch = %report.branch_name,
                repo = %report.repo_path.display(),
                "Dropping session report that reuses a live branch"
            );
            return;
        }

        let needs_provisional_agent = !inner.agents.contains_key(&report.agent_id);
        if needs_provisional_agent {
            let record = provisional_record(&report);
            inner.agents.insert(
                report.agent_id.clone(),
                AgentEntry {
                    record: record.clone(),
                    repo_path: report.repo_path.clone(),
                    last_heartbeat: Utc::now(),
                    is_alive: true,
                    provisional: true,
                },
            );
            debug!(
                event = "core.registry.provisional_agent_synthesised",
                agent_id = %report.agent_id,
                session_id = %report.session_id,
            );
        }

        let previous = inner.sessions.insert(report.session_id.clone(), report.clone());
        drop(inner);

        if needs_provisional_agent {
            self.bus.publish(Event::AgentRegistered {
                repo_path: report.repo_path.clone(),
                agent: provisional_record(&report),
            });
        }

        match previous {
            None => {
                info!(
                    event = "core.registry.session_reported",
                    session_id = %report.session_id,
                    branch = %report.branch_name,
                );
                self.bus.publish(Event::SessionReported { report });
            }
            Some(old) => {
                let closed_now = report.status.is_closed() && !old.status.is_closed();
                let session_id = report.session_id.clone();
                self.bus.publish(Event::SessionUpdated { report });
                if closed_now {
                    self.bus.publish(Event::SessionClosed { session_id });
                }
            }
        }
    }

    /// Mutate a session through the registry's single update path.
    ///
    /// The mutated report is persisted back to its session file (atomic) so
    /// a restart reconstructs the same registry. Returns the updated report,
    /// or `None` when the session is unknown.
    pub fn update_session(
        &self,
        session_id: &SessionId,
        mutate: impl FnOnce(&mut SessionReport),
    ) -> Option<SessionReport> {
        let mut inner = self.inner.lock().expect("registry poisoned");
        let report = inner.sessions.get_mut(session_id)?;
        mutate(report);
        report.updated = Utc::now();
        let report = report.clone();
        drop(inner);

        let state_dir = StateDir::for_repo(&report.repo_path);
        if let Err(e) = io::write_json_atomic(&state_dir.session_file(session_id), &report) {
            warn!(
                event = "core.registry.session_persist_failed",
                session_id = %session_id,
                error = %e,
            );
        }

        let closed = report.status.is_closed();
        self.bus.publish(Event::SessionUpdated {
            report: report.clone(),
        });
        if closed {
            self.bus.publish(Event::SessionClosed {
                session_id: session_id.clone(),
            });
        }
        Some(report)
    }

    /// Record a heartbeat instant for an agent.
    pub fn ingest_heartbeat(&self, agent_id: &AgentId, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("registry poisoned");
        let Some(entry) = inner.agents.get_mut(agent_id) else {
            debug!(
                event = "core.registry.heartbeat_for_unknown_agent",
                agent_id = %agent_id,
            );
            return;
        };
        if at > entry.last_heartbeat {
            entry.last_heartbeat = at;
        }
        let revived = !entry.is_alive && is_alive_at(entry.last_heartbeat, Utc::now());
        if revived {
            entry.is_alive = true;
        }
        drop(inner);

        self.bus.publish(Event::AgentHeartbeat {
            agent_id: agent_id.clone(),
            at,
        });
        if revived {
            self.bus.publish(Event::AgentStatusChanged {
                agent_id: agent_id.clone(),
                is_alive: true,
            });
        }
    }

    /// File-deletion driven removal.
    pub fn remove_agent(&self, agent_id: &AgentId) {
        let mut inner = self.inner.lock().expect("registry poisoned");
        let Some(entry) = inner.agents.remove(agent_id) else {
            return;
        };
        drop(inner);
        info!(event = "core.registry.agent_unregistered", agent_id = %agent_id);
        self.bus.publish(Event::AgentUnregistered {
            repo_path: entry.repo_path,
            agent_id: agent_id.clone(),
        });
    }

    /// File-deletion driven removal.
    pub fn remove_session(&self, session_id: &SessionId) {
        let mut inner = self.inner.lock().expect("registry poisoned");
        if inner.sessions.remove(session_id).is_none() {
            return;
        }
        drop(inner);
        info!(event = "core.registry.session_closed", session_id = %session_id);
        self.bus.publish(Event::SessionClosed {
            session_id: session_id.clone(),
        });
    }

    /// Flip `is_alive` for agents whose heartbeat aged past the TTL.
    ///
    /// Revival happens on the heartbeat path, never here.
    pub fn sweep_liveness(&self) {
        let now = Utc::now();
        let mut lost = Vec::new();
        {
            let mut inner = self.inner.lock().expect("registry poisoned");
            for entry in inner.agents.values_mut() {
                if entry.is_alive && !is_alive_at(entry.last_heartbeat, now) {
                    entry.is_alive = false;
                    lost.push(entry.record.agent_id.clone());
                }
            }
        }
        for agent_id in lost {
            info!(event = "core.registry.agent_liveness_lost", agent_id = %agent_id);
            self.bus.publish(Event::AgentStatusChanged {
                agent_id,
                is_alive: false,
            });
        }
    }

    /// Publish an activity entry; the caller has already appended it to the
    /// session's activity log.
    pub fn record_activity(&self, entry: ActivityEntry) {
        self.bus.publish(Event::ActivityReported { entry });
    }

    /// Deterministic contents for round-trip comparisons (liveness excluded).
    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.lock().expect("registry poisoned");
        let mut agents: Vec<_> = inner
            .agents
            .values()
            .filter(|e| !e.provisional)
            .map(|e| e.record.clone())
            .collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        let mut sessions: Vec<_> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        RegistrySnapshot { agents, sessions }
    }
}

fn is_alive_at(last_heartbeat: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let ttl = chrono::Duration::from_std(HEARTBEAT_TTL).unwrap_or(chrono::Duration::seconds(90));
    now.signed_duration_since(last_heartbeat) <= ttl
}

fn provisional_record(report: &SessionReport) -> AgentRecord {
    AgentRecord {
        agent_id: report.agent_id.clone(),
        agent_type: report.agent_type,
        agent_name: format!("{} (unregistered)", report.agent_type),
        version: "unknown".to_string(),
        pid: 0,
        started_at: report.created,
        capabilities: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_protocol::Capability;

    fn bus_and_registry() -> (Arc<EventBus>, Registry) {
        let bus = Arc::new(EventBus::new());
        let registry = Registry::new(bus.clone());
        (bus, registry)
    }

    fn agent_record(id: &str) -> AgentRecord {
        AgentRecord {
            agent_id: AgentId::new(id),
            agent_type: AgentType::Claude,
            agent_name: "Claude Code".to_string(),
            version: "2.0".to_string(),
            pid: 4242,
            started_at: Utc::now(),
            capabilities: vec![Capability::AutoCommit],
        }
    }

    fn session_report(id: &str, agent_id: &str, branch: &str) -> SessionReport {
        SessionReport {
            session_id: SessionId::new(id),
            agent_id: AgentId::new(agent_id),
            agent_type: AgentType::Claude,
            task: "task".to_string(),
            branch_name: branch.to_string(),
            base_branch: "main".to_string(),
            worktree_path: PathBuf::from("/tmp/wt"),
            repo_path: PathBuf::from("/tmp/repo"),
            status: SessionStatus::Active,
            created: Utc::now(),
            updated: Utc::now(),
            commit_count: 0,
            last_commit: None,
        }
    }

    #[test]
    fn test_agent_registration_emits_event() {
        let (bus, registry) = bus_and_registry();
        let sub = bus.subscribe();

        registry.ingest_agent_record(PathBuf::from("/tmp/repo"), agent_record("claude-1"));

        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.name(), "agent-registered");
        assert!(registry.get_agent(&AgentId::new("claude-1")).unwrap().is_alive);
    }

    #[test]
    fn test_session_with_unknown_agent_synthesises_provisional() {
        let (bus, registry) = bus_and_registry();
        let sub = bus.subscribe();

        registry.ingest_session_report(session_report("sess_00000001", "ghost-1", "feature/a"));

        let entry = registry.get_agent(&AgentId::new("ghost-1")).unwrap();
        assert!(entry.provisional);
        let names: Vec<_> = sub.drain().iter().map(|e| e.event.name()).collect();
        assert_eq!(names, vec!["agent-registered", "session-reported"]);

        // Real agent file arrives — provisional flag clears.
        registry.ingest_agent_record(PathBuf::from("/tmp/repo"), agent_record("ghost-1"));
        assert!(!registry.get_agent(&AgentId::new("ghost-1")).unwrap().provisional);
    }

    #[test]
    fn test_branch_collision_drops_report() {
        let (_bus, registry) = bus_and_registry();
        registry.ingest_session_report(session_report("sess_00000001", "a-1", "feature/x"));
        registry.ingest_session_report(session_report("sess_00000002", "a-2", "feature/x"));

        assert_eq!(registry.list_sessions().len(), 1);
    }

    #[test]
    fn test_closed_session_frees_branch_name() {
        let (_bus, registry) = bus_and_registry();
        let mut closed = session_report("sess_00000001", "a-1", "feature/x");
        closed.status = SessionStatus::Closed;
        registry.ingest_session_report(closed);
        registry.ingest_session_report(session_report("sess_00000002", "a-2", "feature/x"));

        assert_eq!(registry.list_sessions().len(), 2);
    }

    #[test]
    fn test_heartbeat_decay_and_revival() {
        let (bus, registry) = bus_and_registry();
        registry.ingest_agent_record(PathBuf::from("/tmp/repo"), agent_record("claude-1"));
        let id = AgentId::new("claude-1");

        // Age the heartbeat far past the TTL, then sweep.
        registry.ingest_heartbeat(&id, Utc::now() - chrono::Duration::seconds(600));
        // ingest_heartbeat never moves the clock backwards
        assert!(registry.get_agent(&id).unwrap().is_alive);

        {
            let mut inner = registry.inner.lock().unwrap();
            inner.agents.get_mut(&id).unwrap().last_heartbeat =
                Utc::now() - chrono::Duration::seconds(600);
        }
        let sub = bus.subscribe();
        registry.sweep_liveness();
        assert!(!registry.get_agent(&id).unwrap().is_alive);
        let names: Vec<_> = sub.drain().iter().map(|e| e.event.name()).collect();
        assert_eq!(names, vec!["agent-status-changed"]);

        // Fresh heartbeat revives.
        registry.ingest_heartbeat(&id, Utc::now());
        assert!(registry.get_agent(&id).unwrap().is_alive);
    }

    #[test]
    fn test_sweep_emits_once_per_loss() {
        let (bus, registry) = bus_and_registry();
        registry.ingest_agent_record(PathBuf::from("/tmp/repo"), agent_record("claude-1"));
        let id = AgentId::new("claude-1");
        {
            let mut inner = registry.inner.lock().unwrap();
            inner.agents.get_mut(&id).unwrap().last_heartbeat =
                Utc::now() - chrono::Duration::seconds(600);
        }
        let sub = bus.subscribe();
        registry.sweep_liveness();
        registry.sweep_liveness();
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn test_removal_is_file_deletion_driven() {
        let (bus, registry) = bus_and_registry();
        registry.ingest_agent_record(PathBuf::from("/tmp/repo"), agent_record("claude-1"));
        registry.ingest_session_report(session_report("sess_00000001", "claude-1", "feature/a"));

        let sub = bus.subscribe();
        registry.remove_session(&SessionId::new("sess_00000001"));
        registry.remove_agent(&AgentId::new("claude-1"));
        let names: Vec<_> = sub.drain().iter().map(|e| e.event.name()).collect();
        assert_eq!(names, vec!["session-closed", "agent-unregistered"]);
        assert!(registry.list_agents().is_empty());
        assert!(registry.list_sessions().is_empty());
    }

    #[test]
    fn test_queries_by_agent_and_type() {
        let (_bus, registry) = bus_and_registry();
        registry.ingest_session_report(session_report("sess_00000001", "a-1", "feature/a"));
        registry.ingest_session_report(session_report("sess_00000002", "a-1", "feature/b"));
        registry.ingest_session_report(session_report("sess_00000003", "a-2", "feature/c"));

        assert_eq!(registry.sessions_by_agent(&AgentId::new("a-1")).len(), 2);
        assert_eq!(
            registry.sessions_by_agent_type(AgentType::Claude).len(),
            3
        );
        assert_eq!(registry.sessions_by_agent_type(AgentType::Aider).len(), 0);
    }

    #[test]
    fn test_update_session_persists_to_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (_bus, registry) = bus_and_registry();
        let mut report = session_report("sess_00000001", "a-1", "feature/a");
        report.repo_path = tmp.path().to_path_buf();
        registry.ingest_session_report(report);

        let updated = registry
            .update_session(&SessionId::new("sess_00000001"), |s| {
                s.commit_count += 1;
                s.last_commit = Some("abc123".to_string());
            })
            .unwrap();
        assert_eq!(updated.commit_count, 1);

        let sd = StateDir::for_repo(tmp.path());
        let on_disk: SessionReport =
            io::read_json_lenient(&sd.session_file("sess_00000001")).unwrap();
        assert_eq!(on_disk.commit_count, 1);
        assert_eq!(on_disk.last_commit.as_deref(), Some("abc123"));
    }
}
