//! Plain-text table output for list commands.

use drover_core::SessionReport;
use drover_core::registry::AgentEntry;

/// Truncate to `max` characters with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

pub fn print_sessions(sessions: &[SessionReport]) {
    if sessions.is_empty() {
        println!("No sessions.");
        return;
    }
    println!(
        "{:<16} {:<8} {:<28} {:<9} {:>7}  {}",
        "SESSION", "AGENT", "BRANCH", "STATUS", "COMMITS", "TASK"
    );
    for session in sessions {
        println!(
            "{:<16} {:<8} {:<28} {:<9} {:>7}  {}",
            truncate(&session.session_id, 16),
            session.agent_type,
            truncate(&session.branch_name, 28),
            session.status,
            session.commit_count,
            truncate(&session.task, 40),
        );
    }
}

pub fn print_agents(agents: &[AgentEntry]) {
    if agents.is_empty() {
        println!("No agents.");
        return;
    }
    println!(
        "{:<24} {:<8} {:<7} {:<8} {:<9} {}",
        "AGENT", "TYPE", "ALIVE", "PID", "PROCESS", "REPO"
    );
    for entry in agents {
        let process = if drover_core::process::is_pid_running(entry.record.pid) {
            "running"
        } else {
            "gone"
        };
        println!(
            "{:<24} {:<8} {:<7} {:<8} {:<9} {}",
            truncate(&entry.record.agent_id, 24),
            entry.record.agent_type,
            if entry.is_alive { "yes" } else { "no" },
            entry.record.pid,
            process,
            entry.repo_path.display(),
        );
    }
}
