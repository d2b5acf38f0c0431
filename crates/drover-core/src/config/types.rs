//! Per-repo settings stored at `.S9N_KIT_DevOpsAgent/config.json`.

use serde::{Deserialize, Serialize};

use crate::statedir::{StateDir, io};

fn default_watch_patterns() -> Vec<String> {
    // Empty means watch everything; patterns narrow the set.
    Vec::new()
}

fn default_ignore_patterns() -> Vec<String> {
    Vec::new()
}

fn default_commit_interval() -> u32 {
    super::DEFAULT_COMMIT_INTERVAL_SECS
}

/// Per-repository watcher configuration.
///
/// Written by operators or agents; drover only reads it. Missing or
/// malformed files fall back to defaults — a bad config must not stop
/// coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    #[serde(default = "default_watch_patterns")]
    pub watch_patterns: Vec<String>,
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
    /// Default debounce interval (seconds) for sessions in this repo.
    #[serde(default = "default_commit_interval")]
    pub commit_interval: u32,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            watch_patterns: default_watch_patterns(),
            ignore_patterns: default_ignore_patterns(),
            commit_interval: default_commit_interval(),
        }
    }
}

impl RepoConfig {
    /// Load the repo's config, falling back to defaults when absent or bad.
    pub fn load(state_dir: &StateDir) -> Self {
        io::read_json_lenient(&state_dir.config_file()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sd = StateDir::for_repo(tmp.path());
        let config = RepoConfig::load(&sd);
        assert_eq!(config, RepoConfig::default());
        assert_eq!(config.commit_interval, 30);
    }

    #[test]
    fn test_load_partial_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sd = StateDir::for_repo(tmp.path());
        std::fs::create_dir_all(sd.root()).unwrap();
        std::fs::write(
            sd.config_file(),
            r#"{"ignorePatterns": ["*.generated.ts"], "commitInterval": 45}"#,
        )
        .unwrap();

        let config = RepoConfig::load(&sd);
        assert_eq!(config.ignore_patterns, vec!["*.generated.ts".to_string()]);
        assert_eq!(config.commit_interval, 45);
        assert!(config.watch_patterns.is_empty());
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sd = StateDir::for_repo(tmp.path());
        std::fs::create_dir_all(sd.root()).unwrap();
        std::fs::write(sd.config_file(), "not json at all").unwrap();
        assert_eq!(RepoConfig::load(&sd), RepoConfig::default());
    }
}
