//! Failure categorisation for git subprocess output.
//!
//! Callers rely on the category, never on raw stderr text: the patterns
//! below are the single place where git's wording is interpreted.

use super::errors::GitError;

const AUTH_PATTERNS: &[&str] = &[
    "authentication failed",
    "could not read username",
    "could not read password",
    "permission denied (publickey)",
    "terminal prompts disabled",
    "invalid credentials",
    "support for password authentication was removed",
];

const NETWORK_PATTERNS: &[&str] = &[
    "could not resolve host",
    "connection refused",
    "connection timed out",
    "network is unreachable",
    "operation timed out",
    "early eof",
    "the remote end hung up unexpectedly",
    "failed to connect",
];

const CONFLICT_PATTERNS: &[&str] = &[
    "conflict",
    "could not apply",
    "failed to merge",
    "needs merge",
    "you have unmerged files",
];

const INDEX_LOCK_PATTERNS: &[&str] = &["index.lock", ".lock': file exists"];

const CLEAN_NOOP_PATTERNS: &[&str] = &[
    "nothing to commit",
    "working tree clean",
    "no changes added to commit",
    "nothing added to commit",
];

fn matches_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

/// Map a failed invocation to its error category.
pub(crate) fn classify_failure(command: &str, code: i32, stderr: &str) -> GitError {
    let lowered = stderr.to_lowercase();
    let message = stderr.trim().to_string();
    let command = command.to_string();

    if matches_any(&lowered, AUTH_PATTERNS) {
        GitError::AuthRequired { command, message }
    } else if matches_any(&lowered, NETWORK_PATTERNS) {
        GitError::Network { command, message }
    } else if matches_any(&lowered, INDEX_LOCK_PATTERNS) {
        GitError::IndexLocked { command, message }
    } else if matches_any(&lowered, CONFLICT_PATTERNS) {
        GitError::Conflict { command, message }
    } else {
        GitError::CommandFailed {
            command,
            code,
            message,
        }
    }
}

/// Whether a failed `git commit` actually means "nothing changed".
///
/// git reports this on stdout with exit code 1, so both streams are checked.
pub(crate) fn is_clean_noop(stdout: &str, stderr: &str) -> bool {
    let combined = format!("{} {}", stdout.to_lowercase(), stderr.to_lowercase());
    matches_any(&combined, CLEAN_NOOP_PATTERNS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures() {
        let err = classify_failure("push", 128, "fatal: Authentication failed for 'https://...'");
        assert!(matches!(err, GitError::AuthRequired { .. }));

        let err = classify_failure(
            "fetch",
            128,
            "fatal: could not read Username for 'https://github.com': terminal prompts disabled",
        );
        assert!(matches!(err, GitError::AuthRequired { .. }));
    }

    #[test]
    fn test_network_failures() {
        let err = classify_failure("fetch", 128, "fatal: Could not resolve host: github.com");
        assert!(matches!(err, GitError::Network { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_index_lock_is_transient() {
        let err = classify_failure(
            "add",
            128,
            "fatal: Unable to create '/repo/.git/index.lock': File exists.",
        );
        assert!(matches!(err, GitError::IndexLocked { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_conflict_detection() {
        let err = classify_failure(
            "rebase",
            1,
            "CONFLICT (content): Merge conflict in src/shared.ts",
        );
        assert!(matches!(err, GitError::Conflict { .. }));

        let err = classify_failure("rebase", 1, "error: could not apply abc123... change things");
        assert!(matches!(err, GitError::Conflict { .. }));
    }

    #[test]
    fn test_unknown_failure_keeps_exit_code() {
        let err = classify_failure("status", 129, "usage: git status ...");
        match err {
            GitError::CommandFailed { code, .. } => assert_eq!(code, 129),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_clean_noop_detection() {
        assert!(is_clean_noop(
            "On branch main\nnothing to commit, working tree clean\n",
            ""
        ));
        assert!(!is_clean_noop("", "fatal: not a git repository"));
    }
}
