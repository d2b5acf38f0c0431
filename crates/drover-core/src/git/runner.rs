//! Single chokepoint for invoking the `git` binary.
//!
//! Every production git subprocess in drover-core runs through [`run_git`].
//! Each invocation validates arguments, enforces a timeout, logs a
//! structured terminal entry, and maps failures into [`GitError`]
//! categories. Network and index-lock failures are retried with backoff.
//!
//! git runs as a subprocess rather than through a library binding so that
//! fetch/rebase/push inherit the user's SSH agent and credential helpers
//! with zero auth code in drover.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::classify::classify_failure;
use super::errors::GitError;
use super::types::GitOutput;

/// Default timeout for local operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for operations that may touch the network (fetch/rebase/push).
pub const SLOW_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const LOGGED_OUTPUT_CAP: usize = 2000;

/// Options for one git invocation.
#[derive(Debug, Clone)]
pub struct GitOptions {
    pub timeout: Duration,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            env: Vec::new(),
            stdin: None,
        }
    }
}

impl GitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Options for network-bound commands.
    pub fn slow() -> Self {
        Self::with_timeout(SLOW_TIMEOUT)
    }
}

/// Validate a git argument to prevent injection.
///
/// Rejects values that start with `-` (option injection), contain control
/// characters, or contain `::` sequences (refspec injection).
pub fn validate_git_arg(value: &str, label: &str) -> Result<(), GitError> {
    if value.starts_with('-') {
        return Err(GitError::InvalidArgument {
            label: label.to_string(),
            message: format!("'{value}' must not start with '-'"),
        });
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(GitError::InvalidArgument {
            label: label.to_string(),
            message: "contains control characters".to_string(),
        });
    }
    if value.contains("::") {
        return Err(GitError::InvalidArgument {
            label: label.to_string(),
            message: "'::' sequences are not allowed".to_string(),
        });
    }
    Ok(())
}

fn git_binary() -> Result<&'static Path, GitError> {
    static GIT: OnceLock<Result<PathBuf, String>> = OnceLock::new();
    GIT.get_or_init(|| which::which("git").map_err(|e| e.to_string()))
        .as_deref()
        .map_err(|message| GitError::GitNotFound {
            message: message.clone(),
        })
}

/// Run git once. Spawn failures and timeouts are errors; a nonzero exit is
/// returned in the [`GitOutput`] for the caller to interpret.
pub fn run_git_raw(repo: &Path, args: &[&str], opts: &GitOptions) -> Result<GitOutput, GitError> {
    let command_name = args.first().copied().unwrap_or("git").to_string();
    let started = Instant::now();

    let mut command = Command::new(git_binary()?);
    command
        .current_dir(repo)
        .args(args)
        .stdin(if opts.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &opts.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| GitError::SpawnFailed {
        command: command_name.clone(),
        source,
    })?;

    if let Some(input) = &opts.stdin
        && let Some(mut stdin) = child.stdin.take()
    {
        // Ignore EPIPE: git may exit before consuming all input.
        let _ = stdin.write_all(input.as_bytes());
    }

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || read_pipe(stdout_pipe));
    let stderr_reader = std::thread::spawn(move || read_pipe(stderr_pipe));

    let deadline = started + opts.timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    warn!(
                        event = "core.git.runner.timeout",
                        command = %command_name,
                        cwd = %repo.display(),
                        timeout_ms = opts.timeout.as_millis() as u64,
                    );
                    return Err(GitError::Timeout {
                        command: command_name,
                        timeout_ms: opts.timeout.as_millis() as u64,
                        path: repo.to_path_buf(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = stdout_reader.join();
                let _ = stderr_reader.join();
                return Err(GitError::SpawnFailed {
                    command: command_name,
                    source,
                });
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    let duration = started.elapsed();
    let exit_code = status.code().unwrap_or(-1);

    let output_truncated = stdout.len() > LOGGED_OUTPUT_CAP || stderr.len() > LOGGED_OUTPUT_CAP;
    debug!(
        event = "core.git.runner.completed",
        command = %command_name,
        argv = %args.join(" "),
        cwd = %repo.display(),
        exit_code = exit_code,
        duration_ms = duration.as_millis() as u64,
        output_truncated = output_truncated,
        stderr = %truncate_for_log(&stderr),
    );

    Ok(GitOutput {
        stdout,
        stderr,
        exit_code,
        duration,
    })
}

/// Run git, classifying any nonzero exit into a [`GitError`] and retrying
/// transient failures (network, index lock) up to 3 times with exponential
/// backoff starting at 250 ms.
pub fn run_git(repo: &Path, args: &[&str], opts: &GitOptions) -> Result<GitOutput, GitError> {
    let command_name = args.first().copied().unwrap_or("git");
    let mut delay = RETRY_BASE_DELAY;

    for attempt in 1..=MAX_ATTEMPTS {
        let output = run_git_raw(repo, args, opts)?;
        if output.success() {
            return Ok(output);
        }

        let error = classify_failure(command_name, output.exit_code, &output.stderr);
        if error.is_transient() && attempt < MAX_ATTEMPTS {
            warn!(
                event = "core.git.runner.transient_retry",
                command = command_name,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
            );
            std::thread::sleep(delay);
            delay *= 2;
            continue;
        }
        return Err(error);
    }
    unreachable!("retry loop always returns")
}

fn read_pipe(pipe: Option<impl Read>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn truncate_for_log(s: &str) -> &str {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(LOGGED_OUTPUT_CAP) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}
