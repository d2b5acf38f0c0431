use clap::ArgMatches;

mod helpers;
mod locks;
mod rebase;
mod recover;
mod run;
mod sessions;

use helpers::CliResult;

pub fn run_command(matches: &ArgMatches) -> CliResult {
    let json = matches.get_flag("json");
    match matches.subcommand() {
        Some(("run", _)) => run::handle(),
        Some(("create", sub)) => sessions::handle_create(sub, json),
        Some(("sessions", sub)) => sessions::handle_sessions(sub, json),
        Some(("agents", sub)) => sessions::handle_agents(sub, json),
        Some(("instances", sub)) => sessions::handle_instances(sub, json),
        Some(("watch", sub)) => sessions::handle_watch(sub, json),
        Some(("locks", sub)) => locks::handle(sub, json),
        Some(("rebase", sub)) => rebase::handle(sub, json),
        Some(("recover", sub)) => recover::handle(sub, json),
        _ => unreachable!("subcommand_required"),
    }
}
