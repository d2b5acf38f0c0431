mod global;
mod locks;
mod rebase;
mod recover;
mod session;


use clap::Command;

pub fn build_cli() -> Command {
    global::root_command()
        .subcommand(global::run_command())
        .subcommand(session::create_command())
        .subcommand(session::sessions_command())
        .subcommand(session::agents_command())
        .subcommand(session::instances_command())
        .subcommand(session::watch_command())
        .subcommand(locks::locks_command())
        .subcommand(rebase::rebase_command())
        .subcommand(recover::recover_command())
}
