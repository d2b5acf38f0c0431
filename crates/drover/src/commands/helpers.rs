use std::path::PathBuf;
use std::sync::Arc;

use clap::ArgMatches;
use drover_core::{InstanceStore, Orchestrator, Response};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the settings store and wire the engine. A broken store is fatal.
pub fn open_orchestrator() -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let store = InstanceStore::open_default().map_err(|e| {
        eprintln!("Fatal: {e}");
        e
    })?;
    Ok(Orchestrator::new(Arc::new(store)))
}

/// Engine with the registry reconciled from every recent repo — what the
/// one-shot query commands need.
pub fn bootstrapped_orchestrator() -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let orch = open_orchestrator()?;
    orch.start().map_err(|e| {
        eprintln!("Failed to start: {e}");
        e
    })?;
    Ok(orch)
}

/// Repo path from `--repo`, defaulting to the current directory.
pub fn repo_from(matches: &ArgMatches) -> PathBuf {
    let raw = matches
        .get_one::<String>("repo")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    raw.canonicalize().unwrap_or(raw)
}

/// Print one response envelope; non-success becomes a CLI error.
pub fn finish(response: Response, json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        if response.success {
            return Ok(());
        }
        return Err("request failed".into());
    }

    if response.success {
        if let Some(data) = &response.data {
            println!("{}", serde_json::to_string_pretty(data)?);
        } else {
            println!("OK");
        }
        Ok(())
    } else {
        let error = response
            .error
            .unwrap_or_else(|| drover_protocol::ErrorBody {
                code: "UNKNOWN".to_string(),
                message: "request failed".to_string(),
            });
        eprintln!("Error [{}]: {}", error.code, error.message);
        Err(error.message.into())
    }
}
