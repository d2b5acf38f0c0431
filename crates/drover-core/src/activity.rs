//! Append-only per-session activity log.

use std::path::Path;

use chrono::Utc;
use drover_protocol::{ActivityEntry, ActivityKind, SessionId};
use tracing::warn;

use crate::registry::Registry;
use crate::statedir::{StateDir, io};

/// Append an entry to `activity/<sessionId>.log` and publish it.
///
/// Logging must never fail the operation that produced it; write errors
/// are reported and swallowed.
pub fn append(
    registry: &Registry,
    repo_path: &Path,
    session_id: &SessionId,
    kind: ActivityKind,
    message: impl Into<String>,
    details: serde_json::Map<String, serde_json::Value>,
) {
    let entry = ActivityEntry {
        id: uuid::Uuid::new_v4().simple().to_string(),
        session_id: session_id.clone(),
        timestamp: Utc::now(),
        kind,
        message: message.into(),
        details,
    };

    let log = StateDir::for_repo(repo_path).activity_log(session_id);
    if let Err(e) = io::append_ndjson(&log, &entry) {
        warn!(
            event = "core.activity.append_failed",
            session_id = %session_id,
            error = %e,
        );
    }
    registry.record_activity(entry);
}

/// Build a `details` map from string pairs.
pub fn details<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
