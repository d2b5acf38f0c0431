use std::path::PathBuf;

use clap::ArgMatches;
use drover_core::{Request, SessionId};

use super::helpers::{self, CliResult};

pub fn handle(matches: &ArgMatches, json: bool) -> CliResult {
    match matches.subcommand() {
        Some(("list", sub)) => {
            let orch = helpers::open_orchestrator()?;
            let response = orch.handle(Request::ListLocks {
                repo_path: helpers::repo_from(sub),
            });
            helpers::finish(response, json)
        }
        Some(("check", sub)) => {
            let files: Vec<PathBuf> = sub
                .get_many::<String>("files")
                .expect("required")
                .map(PathBuf::from)
                .collect();
            let orch = helpers::open_orchestrator()?;
            let response = orch.handle(Request::CheckConflicts {
                repo_path: helpers::repo_from(sub),
                files,
                exclude_session: sub.get_one::<String>("session").map(SessionId::new),
            });
            helpers::finish(response, json)
        }
        Some(("force-release", sub)) => {
            let orch = helpers::open_orchestrator()?;
            let response = orch.handle(Request::ForceReleaseLock {
                repo_path: helpers::repo_from(sub),
                file_path: PathBuf::from(sub.get_one::<String>("file").expect("required")),
            });
            helpers::finish(response, json)
        }
        Some(("release", sub)) => {
            let session_id =
                SessionId::new(sub.get_one::<String>("session").expect("required").clone());
            let repo_path = helpers::repo_from(sub);
            let orch = helpers::open_orchestrator()?;
            let released = orch
                .locks()
                .release_session_locks(&repo_path, &session_id)
                .map_err(|e| {
                    eprintln!("Error: {e}");
                    e
                })?;
            if json {
                println!("{}", serde_json::json!({ "released": released }));
            } else {
                println!("Released {released} lock(s) for {session_id}");
            }
            Ok(())
        }
        Some(("declarations", sub)) => {
            let orch = helpers::open_orchestrator()?;
            let declarations = orch.declarations().list_declarations(&helpers::repo_from(sub));
            println!("{}", serde_json::to_string_pretty(&declarations)?);
            Ok(())
        }
        Some(("expire", sub)) => {
            let repo_path = helpers::repo_from(sub);
            let orch = helpers::open_orchestrator()?;
            let removed = orch
                .locks()
                .cleanup_expired(&repo_path, drover_core::config::LOCK_EXPIRY)
                .map_err(|e| {
                    eprintln!("Error: {e}");
                    e
                })?;
            if json {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else {
                println!("Removed {removed} expired lock(s)");
            }
            Ok(())
        }
        _ => unreachable!("subcommand_required"),
    }
}
