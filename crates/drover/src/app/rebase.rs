use clap::{Arg, Command};

fn session_arg() -> Arg {
    Arg::new("session")
        .help("Session id (sess_...)")
        .required(true)
        .index(1)
}

pub fn rebase_command() -> Command {
    Command::new("rebase")
        .about("Control per-session rebase watchers")
        .subcommand_required(true)
        .subcommand(
            Command::new("start")
                .about("Start the rebase poller for a session")
                .arg(session_arg()),
        )
        .subcommand(
            Command::new("stop")
                .about("Stop the rebase poller")
                .arg(session_arg()),
        )
        .subcommand(
            Command::new("pause")
                .about("Pause polling without tearing the watcher down")
                .arg(session_arg()),
        )
        .subcommand(
            Command::new("resume")
                .about("Resume a paused watcher (required after conflicts)")
                .arg(session_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Fetch now, report ahead/behind, rebase if behind")
                .arg(session_arg()),
        )
        .subcommand(
            Command::new("trigger")
                .about("Run a rebase immediately")
                .arg(session_arg()),
        )
}
