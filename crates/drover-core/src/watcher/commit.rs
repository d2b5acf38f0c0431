//! The commit pipeline a session worker runs when its debounce fires.

use std::path::Path;

use chrono::Utc;
use drover_protocol::{ActivityKind, SessionId, SessionStatus};
use tracing::{info, warn};

use crate::activity;
use crate::events::Event;
use crate::git::{self, CommitOutcome, GitError};
use crate::statedir::StateDir;

use super::session::WorkerDeps;

/// What the worker should do with its pending set after a commit attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum CommitDisposition {
    /// Commit landed (or tree was already clean) — clear pending.
    Done,
    /// Transient failure — keep pending, retry on the next burst.
    Defer,
    /// Auth/conflict/permanent failure — keep pending and pause the watcher.
    Pause,
}

/// Resolve the commit message: the agent-authored
/// `.devops-commit-<short>.msg` wins and is consumed; otherwise a generated
/// fallback names the branch and burst size.
pub(super) fn resolve_message(
    worktree_path: &Path,
    session_id: &SessionId,
    branch_name: &str,
    file_count: usize,
) -> String {
    let msg_file = StateDir::commit_msg_file(worktree_path, session_id.short());
    if let Ok(contents) = std::fs::read_to_string(&msg_file) {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            let message = trimmed.to_string();
            // Consume so the next burst falls back unless the agent writes again.
            if let Err(e) = std::fs::write(&msg_file, "") {
                warn!(
                    event = "core.watcher.commit_msg_consume_failed",
                    file = %msg_file.display(),
                    error = %e,
                );
            }
            return message;
        }
    }
    format!(
        "chore({branch_name}): auto-commit {file_count} file(s) [{}]",
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    )
}

/// Run one debounced commit for a session.
///
/// When the burst hit cross-session conflicts, staging is restricted to the
/// paths this session actually holds locks on; contested files must not end
/// up in this session's commit.
pub(super) fn run_commit(
    deps: &WorkerDeps,
    pending: &std::collections::BTreeSet<String>,
    has_conflicts: bool,
) -> CommitDisposition {
    let file_count = pending.len();
    deps.bus.publish(Event::CommitTriggered {
        session_id: deps.session_id.clone(),
        file_count,
    });

    let status = match git::operations::status(&deps.worktree_path) {
        Ok(status) => status,
        Err(e) => return handle_failure(deps, e),
    };
    if status.clean {
        // Burst was reverted before the deadline — drop the pending commit.
        info!(
            event = "core.watcher.commit_skipped_clean",
            session_id = %deps.session_id,
        );
        return CommitDisposition::Done;
    }

    let staged = if has_conflicts {
        let paths: Vec<&str> = pending.iter().map(String::as_str).collect();
        git::operations::stage_paths(&deps.worktree_path, &paths)
    } else {
        git::operations::stage_all(&deps.worktree_path)
    };
    if let Err(e) = staged {
        return handle_failure(deps, e);
    }

    let message = resolve_message(
        &deps.worktree_path,
        &deps.session_id,
        &deps.branch_name,
        file_count,
    );

    let hash = match git::operations::commit(&deps.worktree_path, &message) {
        Ok(CommitOutcome::Committed { hash }) => hash,
        Ok(CommitOutcome::NothingToCommit) => return CommitDisposition::Done,
        Err(e) => return handle_failure(deps, e),
    };

    deps.registry.update_session(&deps.session_id, |report| {
        report.commit_count += 1;
        report.last_commit = Some(hash.clone());
    });
    activity::append(
        &deps.registry,
        &deps.repo_path,
        &deps.session_id,
        ActivityKind::Commit,
        format!("Auto-committed {file_count} file(s): {message}"),
        activity::details([
            ("hash", serde_json::json!(hash)),
            ("fileCount", serde_json::json!(file_count)),
        ]),
    );
    deps.bus.publish(Event::CommitCompleted {
        session_id: deps.session_id.clone(),
        hash,
        message,
        file_count,
    });

    if deps.auto_push
        && let Err(e) = git::operations::push(&deps.worktree_path)
    {
        // Push failures are non-fatal; the commit already landed locally.
        warn!(
            event = "core.watcher.auto_push_failed",
            session_id = %deps.session_id,
            error = %e,
        );
        activity::append(
            &deps.registry,
            &deps.repo_path,
            &deps.session_id,
            ActivityKind::Warning,
            format!("Auto-push failed: {e}"),
            Default::default(),
        );
    }

    CommitDisposition::Done
}

fn handle_failure(deps: &WorkerDeps, error: GitError) -> CommitDisposition {
    match &error {
        GitError::Network { .. } | GitError::IndexLocked { .. } | GitError::Timeout { .. } => {
            activity::append(
                &deps.registry,
                &deps.repo_path,
                &deps.session_id,
                ActivityKind::Warning,
                format!("Commit deferred: {error}"),
                Default::default(),
            );
            CommitDisposition::Defer
        }
        GitError::AuthRequired { .. } | GitError::Conflict { .. }
        | GitError::RebaseConflict { .. } => {
            activity::append(
                &deps.registry,
                &deps.repo_path,
                &deps.session_id,
                ActivityKind::Error,
                format!("Commit blocked, watcher paused: {error}"),
                Default::default(),
            );
            CommitDisposition::Pause
        }
        _ => {
            // Permanent git failure: flag the session and require operator
            // intervention.
            deps.registry.update_session(&deps.session_id, |report| {
                report.status = SessionStatus::Error;
            });
            activity::append(
                &deps.registry,
                &deps.repo_path,
                &deps.session_id,
                ActivityKind::Error,
                format!("Commit failed, session flagged: {error}"),
                Default::default(),
            );
            CommitDisposition::Pause
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support;

    #[test]
    fn test_agent_message_wins_and_is_consumed() {
        let repo = test_support::init_repo();
        let session = SessionId::new("sess_abcdef12");
        let msg_file = StateDir::commit_msg_file(repo.path(), session.short());
        std::fs::write(&msg_file, "feat(auth): wire in login flow\n").unwrap();

        let message = resolve_message(repo.path(), &session, "feature/auth", 2);
        assert_eq!(message, "feat(auth): wire in login flow");
        assert_eq!(std::fs::read_to_string(&msg_file).unwrap(), "");

        // Consumed: next resolution falls back.
        let fallback = resolve_message(repo.path(), &session, "feature/auth", 2);
        assert!(fallback.starts_with("chore(feature/auth): auto-commit 2 file(s) ["));
    }

    #[test]
    fn test_fallback_without_message_file() {
        let repo = test_support::init_repo();
        let session = SessionId::new("sess_abcdef12");
        let message = resolve_message(repo.path(), &session, "feature/x", 3);
        assert!(message.contains("auto-commit 3 file(s)"));
    }
}
