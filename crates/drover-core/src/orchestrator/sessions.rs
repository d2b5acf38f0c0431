//! Session lifecycle operations on the orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use drover_protocol::{
    AgentId, InstanceStatus, KanvasCommand, SessionId, SessionReport, SessionStatus,
};
use tracing::{info, warn};

use super::Orchestrator;
use super::errors::SessionError;
use crate::config::clamp_commit_interval;
use crate::git::{self, GitOptions};
use crate::instances::{AgentInstance, AgentInstanceConfig};
use crate::rebase::RebaseWatchOptions;
use crate::statedir::{StateDir, io};
use crate::watcher::WatchOptions;

/// Strip path-hostile characters from a branch name.
fn sanitize_for_path(s: &str) -> String {
    s.replace(['/', '\\', ':', ' '], "-")
}

/// Worktrees live outside the repo so agents never watch each other:
/// `~/.drover/worktrees/<repo-name>/<branch>`.
fn calculate_worktree_path(repo_path: &Path, branch: &str) -> PathBuf {
    let repo_name = repo_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo");
    let base = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".drover")
        .join("worktrees");
    base.join(repo_name).join(sanitize_for_path(branch))
}

fn mint_session_id() -> SessionId {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    SessionId::new(format!("sess_{}", &raw[..8]))
}

impl Orchestrator {
    /// Create a session: prepare the branch (and worktree when configured),
    /// persist the owning instance, write the initial session report, and
    /// arm the watchers.
    pub fn create_session(
        &self,
        config: AgentInstanceConfig,
    ) -> Result<AgentInstance, SessionError> {
        let repo_path = config.repo_path.clone();
        if git::run_git(
            &repo_path,
            &["rev-parse", "--git-dir"],
            &GitOptions::default(),
        )
        .is_err()
        {
            return Err(SessionError::RepoInvalid { path: repo_path });
        }

        // Branch exclusivity among live sessions of this repo.
        if let Some(existing) = self.registry().list_sessions().into_iter().find(|s| {
            s.repo_path == repo_path
                && s.branch_name == config.branch_name
                && !s.status.is_closed()
        }) {
            return Err(SessionError::BranchInUse {
                branch: config.branch_name,
                session_id: existing.session_id.into_inner(),
            });
        }

        let worktree_path = if config.use_worktree {
            let path = calculate_worktree_path(&repo_path, &config.branch_name);
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            git::worktree::create_worktree(
                &repo_path,
                &path,
                &config.branch_name,
                &config.base_branch,
            )?;
            path
        } else {
            ensure_branch(&repo_path, &config.branch_name, &config.base_branch)?;
            repo_path.clone()
        };

        let session_id = mint_session_id();
        let report = SessionReport {
            session_id: session_id.clone(),
            agent_id: AgentId::new(format!("{}-{}", config.agent_type, session_id.short())),
            agent_type: config.agent_type,
            task: config.task_description.clone(),
            branch_name: config.branch_name.clone(),
            base_branch: config.base_branch.clone(),
            worktree_path: worktree_path.clone(),
            repo_path: repo_path.clone(),
            status: SessionStatus::Idle,
            created: Utc::now(),
            updated: Utc::now(),
            commit_count: 0,
            last_commit: None,
        };
        if let Err(e) = io::write_json_atomic(
            &StateDir::for_repo(&repo_path).session_file(&session_id),
            &report,
        ) {
            warn!(
                event = "core.orchestrator.session_file_write_failed",
                session_id = %session_id,
                error = %e,
            );
        }
        self.registry().ingest_session_report(report);

        let mut instance = AgentInstance::new(config.clone(), InstanceStatus::Waiting);
        instance.session_id = Some(session_id.clone());
        self.instances().upsert(instance.clone())?;
        self.instances().add_recent_repo(&repo_path)?;
        self.ensure_repo_watched(&repo_path);

        if config.auto_commit {
            self.start_watcher(&session_id)?;
            self.instances()
                .set_status(&instance.id, InstanceStatus::Running)?;
            instance.status = InstanceStatus::Running;
        }
        if config.rebase_frequency.activates_watcher() {
            self.start_rebase_watcher(&session_id)?;
        }

        info!(
            event = "core.orchestrator.session_created",
            session_id = %session_id,
            instance_id = %instance.id,
            branch = %config.branch_name,
            worktree = %worktree_path.display(),
        );
        Ok(instance)
    }

    /// Close a session: stop its workers, release its locks, queue a stop
    /// command for the agent, and mark everything closed.
    pub fn close_session(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let repo_path =
            self.session_repo(session_id)
                .ok_or_else(|| SessionError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;

        if let Err(e) = self.watchers().stop(session_id) {
            // Not watching is fine during close.
            tracing::debug!(
                event = "core.orchestrator.close_watcher_skip",
                session_id = %session_id,
                reason = %e,
            );
        }
        let _ = self.rebase().stop_watching(session_id);

        let released = self
            .locks()
            .release_session_locks(&repo_path, session_id)
            .unwrap_or(0);

        if let Err(e) = crate::commands::send_command(&repo_path, session_id, KanvasCommand::Stop)
        {
            warn!(
                event = "core.orchestrator.stop_command_failed",
                session_id = %session_id,
                error = %e,
            );
        }

        self.registry().update_session(session_id, |report| {
            report.status = SessionStatus::Closed;
        });

        if let Some(instance) = self.instances().find_by_session(session_id) {
            self.instances()
                .set_status(&instance.id, InstanceStatus::Stopped)?;
        }

        info!(
            event = "core.orchestrator.session_closed",
            session_id = %session_id,
            locks_released = released,
        );
        Ok(())
    }

    /// Restart an instance with its stored parameters. The previous session
    /// file may be gone — a fresh session id is minted either way.
    pub fn restart_session(&self, instance_id: &str) -> Result<AgentInstance, SessionError> {
        let instance =
            self.instances()
                .get(instance_id)
                .ok_or_else(|| SessionError::InstanceNotFound {
                    instance_id: instance_id.to_string(),
                })?;

        if let Some(old_session) = instance.session_id.clone()
            && self.registry().get_session(&old_session).is_some()
        {
            self.close_session(&old_session)?;
        }
        self.instances().remove(instance_id)?;

        let recreated = self.create_session(instance.config)?;
        info!(
            event = "core.orchestrator.session_restarted",
            old_instance = instance_id,
            new_instance = %recreated.id,
        );
        Ok(recreated)
    }

    /// Arm the file watcher + commit debouncer for a known session.
    pub fn start_watcher(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let report =
            self.registry()
                .get_session(session_id)
                .ok_or_else(|| SessionError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;
        let (interval_secs, auto_push) = self
            .instances()
            .find_by_session(session_id)
            .map(|i| (i.config.commit_interval, i.config.auto_push))
            .unwrap_or((crate::config::DEFAULT_COMMIT_INTERVAL_SECS, false));

        self.watchers().start(WatchOptions {
            session_id: session_id.clone(),
            repo_path: report.repo_path.clone(),
            worktree_path: report.worktree_path.clone(),
            branch_name: report.branch_name.clone(),
            agent_type: report.agent_type,
            commit_interval: Duration::from_secs(clamp_commit_interval(interval_secs) as u64),
            auto_push,
        })?;

        self.registry().update_session(session_id, |report| {
            report.status = SessionStatus::Watching;
        });
        Ok(())
    }

    /// Detach a session's file watcher, flushing any pending commit.
    pub fn stop_watcher(&self, session_id: &SessionId) -> Result<(), SessionError> {
        self.watchers().stop(session_id)?;
        self.registry().update_session(session_id, |report| {
            if report.status == SessionStatus::Watching {
                report.status = SessionStatus::Idle;
            }
        });
        Ok(())
    }

    /// Arm the rebase poller for a known session.
    pub fn start_rebase_watcher(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let report =
            self.registry()
                .get_session(session_id)
                .ok_or_else(|| SessionError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;
        let (frequency, poll_interval) = self
            .instances()
            .find_by_session(session_id)
            .map(|i| {
                (
                    i.config.rebase_frequency,
                    Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
                )
            })
            .unwrap_or((
                drover_protocol::RebaseFrequency::OnDemand,
                Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
            ));

        self.rebase().start_watching(RebaseWatchOptions {
            session_id: session_id.clone(),
            repo_path: report.repo_path.clone(),
            worktree_path: report.worktree_path.clone(),
            base_branch: report.base_branch.clone(),
            rebase_frequency: frequency,
            poll_interval,
        })?;
        Ok(())
    }
}

fn ensure_branch(repo: &Path, branch: &str, base: &str) -> Result<(), SessionError> {
    git::validate_git_arg(branch, "branch name")?;
    git::validate_git_arg(base, "base branch")?;
    let existing = git::operations::list_branches(repo)?;
    if existing.iter().any(|b| b == branch) {
        return Ok(());
    }
    git::run_git(repo, &["branch", branch, base], &GitOptions::default())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support;
    use crate::instances::InstanceStore;
    use drover_protocol::{AgentType, RebaseFrequency};
    use std::sync::Arc;

    fn config(repo: &Path, branch: &str) -> AgentInstanceConfig {
        AgentInstanceConfig {
            repo_path: repo.to_path_buf(),
            agent_type: AgentType::Claude,
            task_description: "Build the thing".to_string(),
            branch_name: branch.to_string(),
            base_branch: "main".to_string(),
            use_worktree: false,
            auto_commit: false,
            auto_push: false,
            commit_interval: 30,
            rebase_frequency: RebaseFrequency::Manual,
            system_prompt: None,
            context_preservation: false,
        }
    }

    fn orchestrator(tmp: &Path) -> Orchestrator {
        let store = Arc::new(InstanceStore::open(&tmp.join("instances.json")).unwrap());
        Orchestrator::new(store)
    }

    #[test]
    fn test_create_session_mints_id_and_prepares_branch() {
        let repo = test_support::init_repo();
        let tmp = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(tmp.path());

        let instance = orch
            .create_session(config(repo.path(), "feature/build"))
            .unwrap();
        let session_id = instance.session_id.clone().unwrap();
        assert!(session_id.is_well_formed());

        // Branch exists, session file written, registry sees it.
        let branches = git::operations::list_branches(repo.path()).unwrap();
        assert!(branches.contains(&"feature/build".to_string()));
        assert!(
            StateDir::for_repo(repo.path())
                .session_file(&session_id)
                .exists()
        );
        assert_eq!(orch.registry().list_sessions().len(), 1);
    }

    #[test]
    fn test_create_session_rejects_non_repo() {
        let tmp = tempfile::TempDir::new().unwrap();
        let not_repo = tmp.path().join("plain-dir");
        std::fs::create_dir_all(&not_repo).unwrap();
        let orch = orchestrator(tmp.path());

        let err = orch.create_session(config(&not_repo, "feature/x")).unwrap_err();
        assert!(matches!(err, SessionError::RepoInvalid { .. }));
    }

    #[test]
    fn test_create_session_rejects_branch_in_use() {
        let repo = test_support::init_repo();
        let tmp = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(tmp.path());

        orch.create_session(config(repo.path(), "feature/dup"))
            .unwrap();
        let err = orch
            .create_session(config(repo.path(), "feature/dup"))
            .unwrap_err();
        assert!(matches!(err, SessionError::BranchInUse { .. }));
    }

    #[test]
    fn test_close_session_releases_and_marks_closed() {
        let repo = test_support::init_repo();
        let tmp = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(tmp.path());

        let instance = orch
            .create_session(config(repo.path(), "feature/close-me"))
            .unwrap();
        let session_id = instance.session_id.clone().unwrap();

        orch.locks()
            .auto_lock_file(
                repo.path(),
                Path::new("src/a.ts"),
                &session_id,
                AgentType::Claude,
                None,
            )
            .unwrap();

        orch.close_session(&session_id).unwrap();

        let report = orch.registry().get_session(&session_id).unwrap();
        assert_eq!(report.status, SessionStatus::Closed);
        assert_eq!(orch.locks().repo_locks(repo.path()).total_locks, 0);
        assert_eq!(
            orch.instances().find_by_session(&session_id).unwrap().status,
            InstanceStatus::Stopped
        );
        let queued = crate::commands::pending_commands(repo.path(), &session_id);
        assert_eq!(queued.last(), Some(&KanvasCommand::Stop));
    }

    #[test]
    fn test_restart_session_reuses_config_with_fresh_id() {
        let repo = test_support::init_repo();
        let tmp = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(tmp.path());

        let first = orch
            .create_session(config(repo.path(), "feature/restart"))
            .unwrap();
        let first_session = first.session_id.clone().unwrap();

        let second = orch.restart_session(&first.id).unwrap();
        let second_session = second.session_id.clone().unwrap();

        assert_ne!(first.id, second.id);
        assert_ne!(first_session, second_session);
        assert_eq!(second.config.branch_name, "feature/restart");
        assert!(orch.instances().get(&first.id).is_none());
    }

    #[test]
    fn test_worktree_sessions_get_isolated_checkout() {
        let repo = test_support::init_repo();
        let tmp = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(tmp.path());

        let mut cfg = config(repo.path(), "feature/isolated");
        cfg.use_worktree = true;
        let instance = orch.create_session(cfg).unwrap();
        let session_id = instance.session_id.unwrap();

        let report = orch.registry().get_session(&session_id).unwrap();
        assert_ne!(report.worktree_path, report.repo_path);
        assert!(report.worktree_path.join("README.md").exists());

        // Cleanup the global worktree location.
        let _ = git::worktree::remove_worktree(repo.path(), &report.worktree_path, true);
    }
}
