//! Orchestrator-to-agent command queue.
//!
//! Commands are appended as JSON lines to `commands/<sessionId>.cmd`; the
//! agent process consumes and truncates the file. Command writes are never
//! dropped — unlike observations they cannot be re-derived.

use std::path::Path;

use drover_protocol::{KanvasCommand, SessionId};
use tracing::info;

use crate::statedir::{StateDir, StateDirError, io};

/// Queue one command for a session's agent.
pub fn send_command(
    repo_path: &Path,
    session_id: &SessionId,
    command: KanvasCommand,
) -> Result<(), StateDirError> {
    let file = StateDir::for_repo(repo_path).command_file(session_id);
    io::append_ndjson(&file, &command)?;
    info!(
        event = "core.commands.queued",
        session_id = %session_id,
        command = ?command,
    );
    Ok(())
}

/// Read the pending queue without consuming it (the agent owns consumption).
pub fn pending_commands(repo_path: &Path, session_id: &SessionId) -> Vec<KanvasCommand> {
    let file = StateDir::for_repo(repo_path).command_file(session_id);
    io::read_ndjson_lenient(&file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_append_in_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let session = SessionId::new("sess_abcdef12");

        send_command(tmp.path(), &session, KanvasCommand::StartWatching).unwrap();
        send_command(
            tmp.path(),
            &session,
            KanvasCommand::Commit {
                message: "checkpoint".to_string(),
            },
        )
        .unwrap();
        send_command(tmp.path(), &session, KanvasCommand::Stop).unwrap();

        let pending = pending_commands(tmp.path(), &session);
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0], KanvasCommand::StartWatching);
        assert_eq!(pending[2], KanvasCommand::Stop);
    }
}
