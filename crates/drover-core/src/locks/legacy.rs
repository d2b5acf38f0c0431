//! Legacy session-granular edit declarations.
//!
//! Older agents declare whole file sets up front via
//! `coordination/active-edits/<agentType>-<shortSessionId>.json` and expect
//! released declarations to move to `coordination/completed-edits/`. The
//! declarations are recorded for UI and debugging only; `locks.json` is the
//! sole input to conflict detection, and wins whenever the two disagree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use drover_protocol::{EditDeclaration, SessionId};
use tracing::{info, warn};

use super::errors::LockError;
use crate::statedir::{StateDir, io};

fn declaration_file_name(declaration: &EditDeclaration) -> String {
    format!(
        "{}-{}.json",
        declaration.agent,
        declaration.session.short()
    )
}

#[derive(Default)]
pub struct DeclarationStore {
    declarations: Mutex<HashMap<(PathBuf, SessionId), EditDeclaration>>,
}

impl DeclarationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration and write its active-edits file.
    pub fn declare_files(
        &self,
        repo_path: &Path,
        declaration: EditDeclaration,
    ) -> Result<(), LockError> {
        let state_dir = StateDir::for_repo(repo_path);
        let file = state_dir
            .active_edits_dir()
            .join(declaration_file_name(&declaration));

        io::write_json_atomic(&file, &declaration).map_err(|e| LockError::DeclareFailed {
            session_id: declaration.session.to_string(),
            message: e.to_string(),
        })?;

        info!(
            event = "core.locks.files_declared",
            session_id = %declaration.session,
            agent = %declaration.agent,
            files = declaration.files.len(),
        );

        self.declarations
            .lock()
            .expect("declaration store poisoned")
            .insert(
                (repo_path.to_path_buf(), declaration.session.clone()),
                declaration,
            );
        Ok(())
    }

    /// Move a session's declaration to completed-edits. Returns `false` when
    /// the session had no active declaration.
    pub fn release_files(
        &self,
        repo_path: &Path,
        session_id: &SessionId,
    ) -> Result<bool, LockError> {
        let removed = self
            .declarations
            .lock()
            .expect("declaration store poisoned")
            .remove(&(repo_path.to_path_buf(), session_id.clone()));

        let Some(declaration) = removed else {
            return Ok(false);
        };

        let state_dir = StateDir::for_repo(repo_path);
        let source = state_dir
            .active_edits_dir()
            .join(declaration_file_name(&declaration));
        let completed_dir = state_dir.completed_edits_dir();
        std::fs::create_dir_all(&completed_dir).map_err(|e| LockError::ReleaseFailed {
            session_id: session_id.to_string(),
            message: e.to_string(),
        })?;

        let destination = completed_dir.join(format!(
            "{}-{}.json",
            declaration_file_name(&declaration).trim_end_matches(".json"),
            Utc::now().format("%Y%m%dT%H%M%S"),
        ));

        match std::fs::rename(&source, &destination) {
            Ok(()) => {
                info!(
                    event = "core.locks.files_released",
                    session_id = %session_id,
                    destination = %destination.display(),
                );
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Already moved or cleaned up externally — the in-memory
                // removal is what matters.
                warn!(
                    event = "core.locks.release_missing_declaration_file",
                    session_id = %session_id,
                    source = %source.display(),
                );
                Ok(true)
            }
            Err(e) => Err(LockError::ReleaseFailed {
                session_id: session_id.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// All declarations currently on disk for a repo.
    pub fn list_declarations(&self, repo_path: &Path) -> Vec<EditDeclaration> {
        let dir = StateDir::for_repo(repo_path).active_edits_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut declarations: Vec<EditDeclaration> = entries
            .flatten()
            .filter(|e| {
                e.path().extension().and_then(|x| x.to_str()) == Some("json")
            })
            .filter_map(|e| io::read_json_lenient(&e.path()))
            .collect();
        declarations.sort_by(|a, b| a.declared_at.cmp(&b.declared_at));
        declarations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_protocol::AgentType;

    fn declaration(session: &str, files: &[&str]) -> EditDeclaration {
        EditDeclaration {
            agent: AgentType::Claude,
            session: SessionId::new(session),
            files: files.iter().map(|s| s.to_string()).collect(),
            operation: "edit".to_string(),
            reason: Some("refactoring auth".to_string()),
            declared_at: Utc::now(),
            estimated_duration: Some(30),
        }
    }

    #[test]
    fn test_declare_writes_active_edit_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = DeclarationStore::new();
        store
            .declare_files(tmp.path(), declaration("sess_abcdef12", &["src/a.ts"]))
            .unwrap();

        let expected = StateDir::for_repo(tmp.path())
            .active_edits_dir()
            .join("claude-abcdef12.json");
        assert!(expected.exists());

        let listed = store.list_declarations(tmp.path());
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].files, vec!["src/a.ts".to_string()]);
    }

    #[test]
    fn test_release_moves_to_completed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = DeclarationStore::new();
        let session = SessionId::new("sess_abcdef12");
        store
            .declare_files(tmp.path(), declaration("sess_abcdef12", &["src/a.ts"]))
            .unwrap();

        assert!(store.release_files(tmp.path(), &session).unwrap());
        assert!(store.list_declarations(tmp.path()).is_empty());

        let completed = StateDir::for_repo(tmp.path()).completed_edits_dir();
        let moved: Vec<_> = std::fs::read_dir(&completed).unwrap().flatten().collect();
        assert_eq!(moved.len(), 1);
    }

    #[test]
    fn test_release_without_declaration_is_false() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = DeclarationStore::new();
        assert!(
            !store
                .release_files(tmp.path(), &SessionId::new("sess_none"))
                .unwrap()
        );
    }
}
