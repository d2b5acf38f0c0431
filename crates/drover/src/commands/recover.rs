use std::path::PathBuf;

use clap::ArgMatches;
use drover_core::{Request, SessionId};

use super::helpers::{self, CliResult};

pub fn handle(matches: &ArgMatches, json: bool) -> CliResult {
    match matches.subcommand() {
        Some(("scan", _)) => {
            let orch = helpers::open_orchestrator()?;
            let orphans = orch.recovery().scan_all_repos_for_sessions();
            if json {
                println!("{}", serde_json::to_string_pretty(&orphans)?);
            } else if orphans.is_empty() {
                println!("No orphaned sessions.");
            } else {
                for orphan in &orphans {
                    println!(
                        "{:<16} {:<28} {:<24} {}",
                        orphan.session_id,
                        crate::table::truncate(&orphan.report.branch_name, 28),
                        orphan.last_modified.to_rfc3339(),
                        orphan.repo_path.display(),
                    );
                }
                println!(
                    "\n{} orphan(s). Adopt with: drover recover restore <session> --repo <path>",
                    orphans.len()
                );
            }
            Ok(())
        }
        Some(("restore", sub)) => {
            let orch = helpers::open_orchestrator()?;
            let response = orch.handle(Request::RecoverSession {
                session_id: SessionId::new(required(sub, "session")),
                repo_path: PathBuf::from(required(sub, "repo")),
            });
            helpers::finish(response, json)
        }
        Some(("delete", sub)) => {
            let orch = helpers::open_orchestrator()?;
            let response = orch.handle(Request::DeleteOrphanedSession {
                session_id: SessionId::new(required(sub, "session")),
                repo_path: PathBuf::from(required(sub, "repo")),
            });
            helpers::finish(response, json)
        }
        _ => unreachable!("subcommand_required"),
    }
}

fn required(matches: &ArgMatches, name: &str) -> String {
    matches.get_one::<String>(name).expect("required arg").clone()
}
