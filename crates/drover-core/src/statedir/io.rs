//! Atomic file I/O for state directory contents.
//!
//! Agents and drover read each other's files concurrently, so every write
//! goes to `X.tmp` first and is renamed into place. Reads are lenient:
//! malformed JSON is logged and dropped, never propagated into the registry.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::errors::StateDirError;

/// Rotate an append-only log once it crosses this size. Single generation:
/// the previous `.1` file is overwritten.
pub const LOG_ROTATE_BYTES: u64 = 8 * 1024 * 1024;

fn cleanup_temp_file(temp_file: &Path, original_error: &std::io::Error) {
    if let Err(cleanup_err) = fs::remove_file(temp_file) {
        warn!(
            event = "core.statedir.temp_file_cleanup_failed",
            temp_file = %temp_file.display(),
            original_error = %original_error,
            cleanup_error = %cleanup_err,
        );
    }
}

/// Serialize `value` as JSON and atomically replace `path` with it.
///
/// Parent directories are created as needed.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StateDirError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StateDirError::SerializeFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_string_atomic(path, &json)
}

/// Atomically replace `path` with `contents` via a `.tmp` sibling.
pub fn write_string_atomic(path: &Path, contents: &str) -> Result<(), StateDirError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StateDirError::CreateFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let temp_file = path.with_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_string(),
    });

    if let Err(e) = fs::write(&temp_file, contents) {
        cleanup_temp_file(&temp_file, &e);
        return Err(StateDirError::WriteFailed {
            path: temp_file,
            source: e,
        });
    }

    if let Err(e) = fs::rename(&temp_file, path) {
        cleanup_temp_file(&temp_file, &e);
        return Err(StateDirError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

/// Read and parse a JSON file, tolerating absence and corruption.
///
/// Returns `None` when the file is missing, empty, or fails to parse.
/// Parse failures are logged at warn level with the offending path — a bad
/// file must never poison in-memory state.
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(
                event = "core.statedir.read_failed",
                path = %path.display(),
                error = %e,
            );
            return None;
        }
    };

    if content.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                event = "core.statedir.invalid_json",
                path = %path.display(),
                error = %e,
                "Skipping malformed JSON file"
            );
            None
        }
    }
}

/// Append one JSON line to a newline-delimited log, rotating at the cap.
pub fn append_ndjson<T: Serialize>(path: &Path, value: &T) -> Result<(), StateDirError> {
    let line = serde_json::to_string(value).map_err(|e| StateDirError::SerializeFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StateDirError::CreateFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    rotate_if_oversized(path);

    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StateDirError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    writeln!(file, "{line}").map_err(|e| StateDirError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn rotate_if_oversized(path: &Path) {
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    if metadata.len() < LOG_ROTATE_BYTES {
        return;
    }

    let rotated = path.with_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.1"),
        None => "1".to_string(),
    });
    match fs::rename(path, &rotated) {
        Ok(()) => {
            tracing::info!(
                event = "core.statedir.log_rotated",
                path = %path.display(),
                rotated = %rotated.display(),
                bytes = metadata.len(),
            );
        }
        Err(e) => {
            warn!(
                event = "core.statedir.log_rotate_failed",
                path = %path.display(),
                error = %e,
            );
        }
    }
}

/// Read every JSON line of a newline-delimited log, skipping bad lines.
pub fn read_ndjson_lenient<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(value) => entries.push(value),
            Err(e) => {
                warn!(
                    event = "core.statedir.invalid_ndjson_line",
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                );
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("sample.json");
        let value = Sample {
            name: "a".to_string(),
            count: 7,
        };
        write_json_atomic(&path, &value).unwrap();
        let back: Sample = read_json_lenient(&path).unwrap();
        assert_eq!(back, value);
        // No stray temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result: Option<Sample> = read_json_lenient(&tmp.path().join("absent.json"));
        assert!(result.is_none());
    }

    #[test]
    fn test_read_malformed_json_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let result: Option<Sample> = read_json_lenient(&path);
        assert!(result.is_none());
    }

    #[test]
    fn test_read_empty_file_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty.json");
        fs::write(&path, "").unwrap();
        let result: Option<Sample> = read_json_lenient(&path);
        assert!(result.is_none());
    }

    #[test]
    fn test_append_ndjson_accumulates_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("log.log");
        for i in 0..3 {
            append_ndjson(
                &path,
                &Sample {
                    name: format!("entry-{i}"),
                    count: i,
                },
            )
            .unwrap();
        }
        let entries: Vec<Sample> = read_ndjson_lenient(&path);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].name, "entry-2");
    }

    #[test]
    fn test_read_ndjson_skips_bad_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("log.log");
        append_ndjson(
            &path,
            &Sample {
                name: "good".to_string(),
                count: 1,
            },
        )
        .unwrap();
        use std::io::Write;
        let mut f = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "garbage line").unwrap();
        drop(f);
        append_ndjson(
            &path,
            &Sample {
                name: "also good".to_string(),
                count: 2,
            },
        )
        .unwrap();

        let entries: Vec<Sample> = read_ndjson_lenient(&path);
        assert_eq!(entries.len(), 2);
    }
}
