use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use drover_protocol::{OrphanedSession, SessionId, SessionReport};
use tracing::{info, warn};

use super::errors::RecoveryError;
use crate::events::{Event, EventBus};
use crate::instances::{AgentInstance, AgentInstanceConfig, InstanceStore};
use crate::registry::Registry;
use crate::statedir::{StateDir, io};

/// Outcome of a batch recovery.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub recovered: usize,
    pub failed: usize,
    pub sessions: Vec<SessionId>,
}

/// Reconstructs lost orchestrator state from on-disk session files.
pub struct RecoveryScanner {
    store: Arc<InstanceStore>,
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
}

impl RecoveryScanner {
    pub fn new(store: Arc<InstanceStore>, registry: Arc<Registry>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            registry,
            bus,
        }
    }

    /// Every session file in one repo, joined against the instance store.
    pub fn scan_repo_for_sessions(&self, repo_path: &Path) -> Vec<OrphanedSession> {
        let sessions_dir = StateDir::for_repo(repo_path).sessions_dir();
        let Ok(entries) = std::fs::read_dir(&sessions_dir) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(report) = io::read_json_lenient::<SessionReport>(&path) else {
                continue;
            };
            let last_modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or(report.updated);
            let has_matching_instance =
                self.store.find_by_session(&report.session_id).is_some();

            found.push(OrphanedSession {
                session_id: report.session_id.clone(),
                repo_path: repo_path.to_path_buf(),
                session_file: path,
                report,
                has_matching_instance,
                last_modified,
            });
        }
        found
    }

    /// True orphans across every recently-used repo, newest first.
    pub fn scan_all_repos_for_sessions(&self) -> Vec<OrphanedSession> {
        let mut orphans: Vec<OrphanedSession> = self
            .store
            .recent_repos()
            .iter()
            .flat_map(|repo| self.scan_repo_for_sessions(repo))
            .filter(|o| !o.has_matching_instance)
            .collect();
        orphans.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        orphans
    }

    /// Scan at startup and announce orphans once, if any exist.
    pub fn startup_scan(&self) -> Vec<OrphanedSession> {
        let orphans = self.scan_all_repos_for_sessions();
        if !orphans.is_empty() {
            info!(
                event = "core.recovery.orphans_found",
                count = orphans.len(),
            );
            self.bus.publish(Event::OrphanedSessionsFound {
                orphans: orphans.clone(),
            });
        }
        orphans
    }

    /// Adopt an orphaned session: synthesise a waiting instance from the
    /// session file and reattach the registry.
    pub fn recover_session(
        &self,
        session_id: &SessionId,
        repo_path: &Path,
    ) -> Result<AgentInstance, RecoveryError> {
        let session_file = StateDir::for_repo(repo_path).session_file(session_id);
        let report: SessionReport =
            io::read_json_lenient(&session_file).ok_or_else(|| RecoveryError::RecoverFailed {
                session_id: session_id.to_string(),
                message: format!("session file missing or unreadable: {}", session_file.display()),
            })?;

        let task_description = if report.task.trim().is_empty() {
            "Recovered session".to_string()
        } else {
            report.task.clone()
        };

        let config = AgentInstanceConfig {
            repo_path: repo_path.to_path_buf(),
            agent_type: report.agent_type,
            task_description,
            branch_name: report.branch_name.clone(),
            base_branch: report.base_branch.clone(),
            use_worktree: report.worktree_path != report.repo_path,
            auto_commit: true,
            auto_push: false,
            commit_interval: crate::config::DEFAULT_COMMIT_INTERVAL_SECS,
            // Recovered sessions never auto-rebase until the operator opts in.
            rebase_frequency: drover_protocol::RebaseFrequency::Manual,
            system_prompt: None,
            context_preservation: false,
        };

        let mut instance =
            AgentInstance::new(config, drover_protocol::InstanceStatus::Waiting);
        instance.session_id = Some(session_id.clone());
        self.store.upsert(instance.clone())?;
        self.store.add_recent_repo(repo_path)?;

        info!(
            event = "core.recovery.session_recovered",
            session_id = %session_id,
            instance_id = %instance.id,
            branch = %report.branch_name,
        );

        self.registry.ingest_session_report(report.clone());
        self.bus.publish(Event::SessionReported { report });
        self.bus.publish(Event::InstanceRecovered {
            instance_id: instance.id.clone(),
            session_id: session_id.clone(),
        });

        Ok(instance)
    }

    /// Fold [`Self::recover_session`] over a list, collecting tallies.
    pub fn recover_multiple_sessions(
        &self,
        sessions: &[(SessionId, PathBuf)],
    ) -> RecoveryReport {
        let mut report = RecoveryReport {
            recovered: 0,
            failed: 0,
            sessions: Vec::new(),
        };
        for (session_id, repo_path) in sessions {
            match self.recover_session(session_id, repo_path) {
                Ok(_) => {
                    report.recovered += 1;
                    report.sessions.push(session_id.clone());
                }
                Err(e) => {
                    warn!(
                        event = "core.recovery.recover_failed",
                        session_id = %session_id,
                        error = %e,
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Delete an orphan's session file plus any agent file matching the
    /// short-id compat heuristic. Idempotent.
    pub fn delete_orphaned_session(
        &self,
        session_id: &SessionId,
        repo_path: &Path,
    ) -> Result<(), RecoveryError> {
        let state_dir = StateDir::for_repo(repo_path);
        let session_file = state_dir.session_file(session_id);
        match std::fs::remove_file(&session_file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RecoveryError::DeleteFailed {
                    session_id: session_id.to_string(),
                    path: session_file,
                    message: e.to_string(),
                });
            }
        }

        // Compat heuristic: agents created by older clients name their file
        // after the session's last 8 characters.
        let short = session_id.short();
        if let Ok(entries) = std::fs::read_dir(state_dir.agents_dir()) {
            for entry in entries.flatten() {
                let path = entry.path();
                let matches_short = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| stem.ends_with(short));
                if matches_short && let Err(e) = std::fs::remove_file(&path) {
                    warn!(
                        event = "core.recovery.agent_file_delete_failed",
                        file = %path.display(),
                        error = %e,
                    );
                }
            }
        }

        info!(
            event = "core.recovery.orphan_deleted",
            session_id = %session_id,
            repo = %repo_path.display(),
        );
        self.registry.remove_session(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_protocol::{AgentId, AgentType, SessionStatus};

    struct Fixture {
        _tmp: tempfile::TempDir,
        repo: PathBuf,
        store: Arc<InstanceStore>,
        bus: Arc<EventBus>,
        scanner: RecoveryScanner,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::TempDir::new().unwrap();
        let repo = tmp.path().join("repoB");
        std::fs::create_dir_all(&repo).unwrap();
        let store =
            Arc::new(InstanceStore::open(&tmp.path().join("instances.json")).unwrap());
        store.add_recent_repo(&repo).unwrap();
        let bus = Arc::new(EventBus::new());
        let registry = Arc::new(Registry::new(bus.clone()));
        let scanner = RecoveryScanner::new(store.clone(), registry, bus.clone());
        Fixture {
            _tmp: tmp,
            repo,
            store,
            bus,
            scanner,
        }
    }

    fn write_session(repo: &Path, id: &str, task: &str, branch: &str) {
        let report = SessionReport {
            session_id: SessionId::new(id),
            agent_id: AgentId::new("claude-1"),
            agent_type: AgentType::Claude,
            task: task.to_string(),
            branch_name: branch.to_string(),
            base_branch: "main".to_string(),
            worktree_path: repo.to_path_buf(),
            repo_path: repo.to_path_buf(),
            status: SessionStatus::Idle,
            created: Utc::now(),
            updated: Utc::now(),
            commit_count: 0,
            last_commit: None,
        };
        io::write_json_atomic(
            &StateDir::for_repo(repo).session_file(id),
            &report,
        )
        .unwrap();
    }

    #[test]
    fn test_orphan_classification_and_recovery_roundtrip() {
        let f = fixture();
        write_session(&f.repo, "sess_00000001", "X", "feature/x");

        let orphans = f.scanner.scan_all_repos_for_sessions();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].session_id, SessionId::new("sess_00000001"));
        assert!(!orphans[0].has_matching_instance);

        let sub = f.bus.subscribe();
        let instance = f
            .scanner
            .recover_session(&SessionId::new("sess_00000001"), &f.repo)
            .unwrap();
        assert_eq!(instance.status, drover_protocol::InstanceStatus::Waiting);
        assert_eq!(instance.config.branch_name, "feature/x");
        assert_eq!(instance.config.task_description, "X");

        let names: Vec<_> = sub
            .drain()
            .iter()
            .map(|e| e.event.name().to_string())
            .collect();
        assert!(names.contains(&"session-reported".to_string()));
        assert!(names.contains(&"instance-recovered".to_string()));

        // Recovered sessions are no longer orphans.
        assert!(f.scanner.scan_all_repos_for_sessions().is_empty());
    }

    #[test]
    fn test_blank_task_gets_placeholder() {
        let f = fixture();
        write_session(&f.repo, "sess_00000002", "  ", "feature/y");
        let instance = f
            .scanner
            .recover_session(&SessionId::new("sess_00000002"), &f.repo)
            .unwrap();
        assert_eq!(instance.config.task_description, "Recovered session");
    }

    #[test]
    fn test_recover_missing_session_fails_with_code() {
        use crate::errors::DroverError;
        let f = fixture();
        let err = f
            .scanner
            .recover_session(&SessionId::new("sess_gone"), &f.repo)
            .unwrap_err();
        assert_eq!(err.error_code(), "RECOVER_SESSION_FAILED");
    }

    #[test]
    fn test_recover_multiple_tallies_failures() {
        let f = fixture();
        write_session(&f.repo, "sess_00000003", "A", "feature/a");
        let report = f.scanner.recover_multiple_sessions(&[
            (SessionId::new("sess_00000003"), f.repo.clone()),
            (SessionId::new("sess_missing"), f.repo.clone()),
        ]);
        assert_eq!(report.recovered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.sessions, vec![SessionId::new("sess_00000003")]);
    }

    #[test]
    fn test_startup_scan_announces_once() {
        let f = fixture();
        write_session(&f.repo, "sess_00000004", "D", "feature/d");
        let sub = f.bus.subscribe();
        let orphans = f.scanner.startup_scan();
        assert_eq!(orphans.len(), 1);

        let events = sub.drain_filtered(|e| e.name() == "orphaned-sessions-found");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_delete_orphan_is_idempotent_and_sweeps_agent_files() {
        let f = fixture();
        write_session(&f.repo, "sess_00000005", "E", "feature/e");
        let state_dir = StateDir::for_repo(&f.repo);
        std::fs::create_dir_all(state_dir.agents_dir()).unwrap();
        // Matches the last-8 heuristic of sess_00000005.
        std::fs::write(state_dir.agent_file("claude-00000005"), "{}").unwrap();
        std::fs::write(state_dir.agent_file("claude-other"), "{}").unwrap();

        let session = SessionId::new("sess_00000005");
        f.scanner.delete_orphaned_session(&session, &f.repo).unwrap();
        assert!(!state_dir.session_file("sess_00000005").exists());
        assert!(!state_dir.agent_file("claude-00000005").exists());
        assert!(state_dir.agent_file("claude-other").exists());

        // Second delete is a no-op.
        f.scanner.delete_orphaned_session(&session, &f.repo).unwrap();
    }

    #[test]
    fn test_scan_repo_includes_matched_sessions() {
        let f = fixture();
        write_session(&f.repo, "sess_00000006", "F", "feature/f");
        f.scanner
            .recover_session(&SessionId::new("sess_00000006"), &f.repo)
            .unwrap();

        // Repo-level scan reports every session file, flagged appropriately.
        let all = f.scanner.scan_repo_for_sessions(&f.repo);
        assert_eq!(all.len(), 1);
        assert!(all[0].has_matching_instance);
        assert!(f.store.find_by_session(&SessionId::new("sess_00000006")).is_some());
    }
}
