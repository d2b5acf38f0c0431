use clap::{Arg, ArgAction, Command};

pub fn root_command() -> Command {
    Command::new("drover")
        .about("Coordinate independent AI coding agents working on one or more git repositories")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .help("Emit info-level JSON logs on stderr")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .help("Print machine-readable JSON on stdout")
                .action(ArgAction::SetTrue),
        )
}

pub fn run_command() -> Command {
    Command::new("run").about(
        "Run the supervisor: watch recent repos, recover sessions, and coordinate agents until interrupted",
    )
}
