//! Classification of changed paths inside a state directory.
//!
//! The agent listener receives raw filesystem events and needs to know which
//! registry ingest path a file belongs to before re-reading it from disk.

use std::path::Path;

use super::{
    ACTIVE_EDITS_DIR, ACTIVITY_DIR, AGENTS_DIR, COMMANDS_DIR, CONFIG_FILE, COORDINATION_DIR,
    HEARTBEATS_DIR, LOCKS_FILE, SESSIONS_DIR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCategory {
    /// `agents/<agentId>.json`
    Agents,
    /// `sessions/<sessionId>.json`
    Sessions,
    /// `activity/<sessionId>.log`
    Activity,
    /// `heartbeats/<agentId>.beat`
    Heartbeats,
    /// `commands/<sessionId>.cmd`
    Commands,
    /// `coordination/active-edits/*.json`
    ActiveEdits,
    /// Top-level `locks.json`
    Locks,
    /// Top-level `config.json`
    Config,
}

impl PathCategory {
    /// Classify `path` relative to the state directory root.
    ///
    /// Returns `None` for paths outside the root, temp files mid-rename, and
    /// anything the listener has no ingest route for (`houserules.md`,
    /// `completed-edits/`, unknown names).
    pub fn classify(state_root: &Path, path: &Path) -> Option<(PathCategory, String)> {
        let rel = path.strip_prefix(state_root).ok()?;
        let mut components = rel
            .components()
            .map(|c| c.as_os_str().to_str().unwrap_or(""));

        let first = components.next()?;

        // In-flight atomic writes surface as `.tmp` create events; only the
        // final rename matters.
        let file_name = rel.file_name()?.to_str()?;
        if file_name.ends_with(".tmp") {
            return None;
        }

        match (first, components.next(), components.next()) {
            (AGENTS_DIR, Some(name), None) => Some((
                PathCategory::Agents,
                name.strip_suffix(".json")?.to_string(),
            )),
            (SESSIONS_DIR, Some(name), None) => Some((
                PathCategory::Sessions,
                name.strip_suffix(".json")?.to_string(),
            )),
            (ACTIVITY_DIR, Some(name), None) => Some((
                PathCategory::Activity,
                name.strip_suffix(".log")?.to_string(),
            )),
            (HEARTBEATS_DIR, Some(name), None) => Some((
                PathCategory::Heartbeats,
                name.strip_suffix(".beat")?.to_string(),
            )),
            (COMMANDS_DIR, Some(name), None) => Some((
                PathCategory::Commands,
                name.strip_suffix(".cmd")?.to_string(),
            )),
            (COORDINATION_DIR, Some(ACTIVE_EDITS_DIR), Some(name)) => Some((
                PathCategory::ActiveEdits,
                name.strip_suffix(".json")?.to_string(),
            )),
            (LOCKS_FILE, None, None) => Some((PathCategory::Locks, String::new())),
            (CONFIG_FILE, None, None) => Some((PathCategory::Config, String::new())),
            _ => None,
        }
    }
}
