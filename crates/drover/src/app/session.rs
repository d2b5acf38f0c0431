use clap::{Arg, ArgAction, Command};

pub fn create_command() -> Command {
    Command::new("create")
        .about("Create a coordinated session on a branch of a repository")
        .arg(
            Arg::new("branch")
                .help("Branch name for the session")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("repo")
                .long("repo")
                .short('r')
                .help("Repository path (default: current directory)"),
        )
        .arg(
            Arg::new("agent")
                .long("agent")
                .short('a')
                .help("Agent type expected to work this session")
                .value_parser(["claude", "cursor", "copilot", "cline", "aider", "warp", "custom"])
                .default_value("claude"),
        )
        .arg(
            Arg::new("task")
                .long("task")
                .short('t')
                .help("What this session is for"),
        )
        .arg(
            Arg::new("base")
                .long("base")
                .short('b')
                .help("Base branch to branch from")
                .default_value("main"),
        )
        .arg(
            Arg::new("worktree")
                .long("worktree")
                .help("Give the session an isolated git worktree")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-auto-commit")
                .long("no-auto-commit")
                .help("Do not watch the worktree or auto-commit change bursts")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("auto-push")
                .long("auto-push")
                .help("Push after each auto-commit (failures are warnings)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("commit-interval")
                .long("commit-interval")
                .help("Debounce interval in seconds (clamped to 10-300)")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("rebase")
                .long("rebase")
                .help("Rebase policy against the base branch")
                .value_parser(["manual", "on-demand"])
                .default_value("manual"),
        )
}

pub fn sessions_command() -> Command {
    Command::new("sessions")
        .about("Inspect and manage reported sessions")
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List every session known to the registry"))
        .subcommand(
            Command::new("close")
                .about("Close a session: stop watchers, release locks, signal the agent")
                .arg(Arg::new("session").required(true).index(1)),
        )
        .subcommand(
            Command::new("restart")
                .about("Restart an instance with its stored parameters")
                .arg(Arg::new("instance").required(true).index(1)),
        )
}

pub fn agents_command() -> Command {
    Command::new("agents")
        .about("Inspect registered agents")
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List agents with liveness and process state"))
}

pub fn instances_command() -> Command {
    Command::new("instances")
        .about("Inspect orchestrator-owned instances")
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List durable instance records"))
}

pub fn watch_command() -> Command {
    Command::new("watch")
        .about("Control a session's file watcher + commit debouncer")
        .subcommand_required(true)
        .subcommand(
            Command::new("start")
                .about("Start watching a session's worktree")
                .arg(Arg::new("session").required(true).index(1)),
        )
        .subcommand(
            Command::new("stop")
                .about("Stop watching, flushing any pending commit")
                .arg(Arg::new("session").required(true).index(1)),
        )
}
