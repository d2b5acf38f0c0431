use clap::ArgMatches;
use drover_core::{AgentInstanceConfig, AgentType, RebaseFrequency, Request, SessionId};

use super::helpers::{self, CliResult};
use crate::table;

pub fn handle_create(matches: &ArgMatches, json: bool) -> CliResult {
    let branch = matches.get_one::<String>("branch").expect("required").clone();
    let agent_type: AgentType = matches
        .get_one::<String>("agent")
        .expect("defaulted")
        .parse()
        .map_err(|e: String| -> Box<dyn std::error::Error> { e.into() })?;
    let rebase_frequency = match matches.get_one::<String>("rebase").map(String::as_str) {
        Some("on-demand") => RebaseFrequency::OnDemand,
        _ => RebaseFrequency::Manual,
    };

    let config = AgentInstanceConfig {
        repo_path: helpers::repo_from(matches),
        agent_type,
        task_description: matches
            .get_one::<String>("task")
            .cloned()
            .unwrap_or_else(|| format!("Work on {branch}")),
        branch_name: branch,
        base_branch: matches.get_one::<String>("base").expect("defaulted").clone(),
        use_worktree: matches.get_flag("worktree"),
        auto_commit: !matches.get_flag("no-auto-commit"),
        auto_push: matches.get_flag("auto-push"),
        commit_interval: matches
            .get_one::<u32>("commit-interval")
            .copied()
            .unwrap_or(drover_core::config::DEFAULT_COMMIT_INTERVAL_SECS),
        rebase_frequency,
        system_prompt: None,
        context_preservation: false,
    };

    let orch = helpers::bootstrapped_orchestrator()?;
    let response = orch.handle(Request::CreateSession { config });
    let result = helpers::finish(response, json);
    orch.shutdown();
    result
}

pub fn handle_sessions(matches: &ArgMatches, json: bool) -> CliResult {
    match matches.subcommand() {
        Some(("list", _)) => {
            let orch = helpers::bootstrapped_orchestrator()?;
            let sessions = orch.registry().list_sessions();
            orch.shutdown();
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                table::print_sessions(&sessions);
            }
            Ok(())
        }
        Some(("close", sub)) => {
            let session_id = SessionId::new(required(sub, "session"));
            let orch = helpers::bootstrapped_orchestrator()?;
            let response = orch.handle(Request::CloseSession { session_id });
            let result = helpers::finish(response, json);
            orch.shutdown();
            result
        }
        Some(("restart", sub)) => {
            let instance_id = required(sub, "instance");
            let orch = helpers::bootstrapped_orchestrator()?;
            let response = orch.handle(Request::RestartSession { instance_id });
            let result = helpers::finish(response, json);
            orch.shutdown();
            result
        }
        _ => unreachable!("subcommand_required"),
    }
}

pub fn handle_agents(matches: &ArgMatches, json: bool) -> CliResult {
    match matches.subcommand() {
        Some(("list", _)) => {
            let orch = helpers::bootstrapped_orchestrator()?;
            let agents = orch.registry().list_agents();
            orch.shutdown();
            if json {
                let records: Vec<_> = agents.iter().map(|a| &a.record).collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                table::print_agents(&agents);
            }
            Ok(())
        }
        _ => unreachable!("subcommand_required"),
    }
}

pub fn handle_instances(matches: &ArgMatches, json: bool) -> CliResult {
    match matches.subcommand() {
        Some(("list", _)) => {
            let orch = helpers::open_orchestrator()?;
            let instances = orch.instances().list();
            if json {
                println!("{}", serde_json::to_string_pretty(&instances)?);
            } else if instances.is_empty() {
                println!("No instances.");
            } else {
                for instance in instances {
                    println!(
                        "{:<40} {:<8} {:<28} {:<8} {}",
                        instance.id,
                        instance.status,
                        table::truncate(&instance.config.branch_name, 28),
                        instance.config.agent_type,
                        instance
                            .session_id
                            .map(|s| s.into_inner())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
            Ok(())
        }
        _ => unreachable!("subcommand_required"),
    }
}

pub fn handle_watch(matches: &ArgMatches, json: bool) -> CliResult {
    let (name, sub) = matches.subcommand().expect("subcommand_required");
    let session_id = SessionId::new(required(sub, "session"));
    let request = match name {
        "start" => Request::StartWatcher { session_id },
        "stop" => Request::StopWatcher { session_id },
        _ => unreachable!("subcommand_required"),
    };

    let orch = helpers::bootstrapped_orchestrator()?;
    let response = orch.handle(request);
    let result = helpers::finish(response, json);
    orch.shutdown();
    result
}

fn required(matches: &ArgMatches, name: &str) -> String {
    matches.get_one::<String>(name).expect("required arg").clone()
}
