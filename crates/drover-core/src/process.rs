//! Process liveness lookups for display purposes.
//!
//! Agent liveness is *derived from heartbeats only* — this helper exists so
//! the CLI can show whether an agent's recorded pid still maps to a running
//! process, which is diagnostic signal, not registry state.

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Whether `pid` currently maps to a live OS process.
///
/// Pid 0 (used by provisional agent records) is never considered running.
pub fn is_pid_running(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    system.process(Pid::from_u32(pid)).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_pid_is_running() {
        assert!(is_pid_running(std::process::id()));
    }

    #[test]
    fn test_pid_zero_is_never_running() {
        assert!(!is_pid_running(0));
    }
}
