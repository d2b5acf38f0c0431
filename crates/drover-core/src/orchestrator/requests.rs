//! Typed request surface.
//!
//! One schema per verb; invalid payloads are rejected at this edge and
//! never propagate inward. Every verb returns the
//! `{ success, data?, error? }` envelope with a stable error code — no
//! request ever raises across this boundary.

use std::path::PathBuf;

use drover_protocol::{EditDeclaration, Response, SessionId};
use serde::{Deserialize, Serialize};

use super::Orchestrator;
use crate::errors::DroverError;
use crate::instances::AgentInstanceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "camelCase")]
pub enum Request {
    CreateSession {
        config: AgentInstanceConfig,
    },
    CloseSession {
        session_id: SessionId,
    },
    ListSessions,
    RestartSession {
        instance_id: String,
    },
    StartWatcher {
        session_id: SessionId,
    },
    StopWatcher {
        session_id: SessionId,
    },
    DeclareFiles {
        repo_path: PathBuf,
        declaration: EditDeclaration,
    },
    ReleaseFiles {
        repo_path: PathBuf,
        session_id: SessionId,
    },
    CheckConflicts {
        repo_path: PathBuf,
        files: Vec<PathBuf>,
        #[serde(default)]
        exclude_session: Option<SessionId>,
    },
    ForceReleaseLock {
        repo_path: PathBuf,
        file_path: PathBuf,
    },
    ListLocks {
        repo_path: PathBuf,
    },
    StartRebaseWatcher {
        session_id: SessionId,
    },
    StopRebaseWatcher {
        session_id: SessionId,
    },
    PauseRebaseWatcher {
        session_id: SessionId,
    },
    ResumeRebaseWatcher {
        session_id: SessionId,
    },
    ForceCheck {
        session_id: SessionId,
    },
    TriggerRebase {
        session_id: SessionId,
    },
    ScanAllReposForSessions,
    RecoverSession {
        session_id: SessionId,
        repo_path: PathBuf,
    },
    RecoverMultipleSessions {
        sessions: Vec<(SessionId, PathBuf)>,
    },
    DeleteOrphanedSession {
        session_id: SessionId,
        repo_path: PathBuf,
    },
}

fn fail(error: impl DroverError) -> Response {
    Response::err(error.error_code(), error.to_string())
}

impl Orchestrator {
    /// Execute one request and fold any failure into the envelope.
    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::CreateSession { config } => match self.create_session(config) {
                Ok(instance) => Response::ok(instance),
                Err(e) => fail(e),
            },
            Request::CloseSession { session_id } => match self.close_session(&session_id) {
                Ok(()) => Response::ok_empty(),
                Err(e) => fail(e),
            },
            Request::ListSessions => Response::ok(self.registry().list_sessions()),
            Request::RestartSession { instance_id } => {
                match self.restart_session(&instance_id) {
                    Ok(instance) => Response::ok(instance),
                    Err(e) => fail(e),
                }
            }
            Request::StartWatcher { session_id } => match self.start_watcher(&session_id) {
                Ok(()) => Response::ok_empty(),
                Err(e) => fail(e),
            },
            Request::StopWatcher { session_id } => match self.stop_watcher(&session_id) {
                Ok(()) => Response::ok_empty(),
                Err(e) => fail(e),
            },
            Request::DeclareFiles {
                repo_path,
                declaration,
            } => match self.declarations().declare_files(&repo_path, declaration) {
                Ok(()) => Response::ok_empty(),
                Err(e) => fail(e),
            },
            Request::ReleaseFiles {
                repo_path,
                session_id,
            } => match self.declarations().release_files(&repo_path, &session_id) {
                Ok(released) => Response::ok(serde_json::json!({ "released": released })),
                Err(e) => fail(e),
            },
            Request::CheckConflicts {
                repo_path,
                files,
                exclude_session,
            } => Response::ok(self.locks().check_conflicts(
                &repo_path,
                &files,
                exclude_session.as_ref(),
            )),
            Request::ForceReleaseLock {
                repo_path,
                file_path,
            } => match self.locks().force_release_lock(&repo_path, &file_path) {
                Ok(released) => Response::ok(serde_json::json!({ "released": released })),
                Err(e) => fail(e),
            },
            Request::ListLocks { repo_path } => Response::ok(self.locks().repo_locks(&repo_path)),
            Request::StartRebaseWatcher { session_id } => {
                match self.start_rebase_watcher(&session_id) {
                    Ok(()) => Response::ok_empty(),
                    Err(e) => fail(e),
                }
            }
            Request::StopRebaseWatcher { session_id } => {
                match self.rebase().stop_watching(&session_id) {
                    Ok(()) => Response::ok_empty(),
                    Err(e) => fail(e),
                }
            }
            Request::PauseRebaseWatcher { session_id } => {
                match self.rebase().pause(&session_id) {
                    Ok(()) => Response::ok_empty(),
                    Err(e) => fail(e),
                }
            }
            Request::ResumeRebaseWatcher { session_id } => {
                match self.rebase().resume(&session_id) {
                    Ok(()) => Response::ok_empty(),
                    Err(e) => fail(e),
                }
            }
            Request::ForceCheck { session_id } => match self.rebase().force_check(&session_id) {
                Ok(state) => Response::ok(state),
                Err(e) => fail(e),
            },
            Request::TriggerRebase { session_id } => {
                match self.rebase().trigger_rebase(&session_id) {
                    Ok(result) => Response::ok(result),
                    Err(e) => fail(e),
                }
            }
            Request::ScanAllReposForSessions => {
                Response::ok(self.recovery().scan_all_repos_for_sessions())
            }
            Request::RecoverSession {
                session_id,
                repo_path,
            } => match self.recovery().recover_session(&session_id, &repo_path) {
                Ok(instance) => Response::ok(instance),
                Err(e) => fail(e),
            },
            Request::RecoverMultipleSessions { sessions } => {
                Response::ok(self.recovery().recover_multiple_sessions(&sessions))
            }
            Request::DeleteOrphanedSession {
                session_id,
                repo_path,
            } => match self
                .recovery()
                .delete_orphaned_session(&session_id, &repo_path)
            {
                Ok(()) => Response::ok_empty(),
                Err(e) => fail(e),
            },
        }
    }
}
