use clap::{Arg, Command};

fn repo_arg() -> Arg {
    Arg::new("repo")
        .long("repo")
        .short('r')
        .help("Repository path (default: current directory)")
}

pub fn locks_command() -> Command {
    Command::new("locks")
        .about("Inspect and manage cross-agent file locks")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("Show a repo's lock table grouped by session")
                .arg(repo_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Pre-flight: which of these files are locked by someone else?")
                .arg(repo_arg())
                .arg(
                    Arg::new("session")
                        .long("session")
                        .short('s')
                        .help("Session to exclude from conflict checks"),
                )
                .arg(
                    Arg::new("files")
                        .help("Files to check")
                        .required(true)
                        .num_args(1..),
                ),
        )
        .subcommand(
            Command::new("force-release")
                .about("Admin override: drop a lock regardless of owner")
                .arg(repo_arg())
                .arg(Arg::new("file").required(true).index(1)),
        )
        .subcommand(
            Command::new("release")
                .about("Release every lock a session holds")
                .arg(repo_arg())
                .arg(Arg::new("session").required(true).index(1)),
        )
        .subcommand(
            Command::new("declarations")
                .about("List legacy session-granular edit declarations")
                .arg(repo_arg()),
        )
        .subcommand(
            Command::new("expire")
                .about("Sweep locks idle past the expiry TTL")
                .arg(repo_arg()),
        )
}
