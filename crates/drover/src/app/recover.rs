use clap::{Arg, Command};

pub fn recover_command() -> Command {
    Command::new("recover")
        .about("Find and adopt sessions orphaned by a previous run")
        .subcommand_required(true)
        .subcommand(
            Command::new("scan").about("Scan every recent repo for orphaned session files"),
        )
        .subcommand(
            Command::new("restore")
                .about("Adopt an orphaned session into a fresh waiting instance")
                .arg(Arg::new("session").required(true).index(1))
                .arg(
                    Arg::new("repo")
                        .long("repo")
                        .short('r')
                        .required(true)
                        .help("Repository the session file lives in"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an orphaned session's on-disk artifacts")
                .arg(Arg::new("session").required(true).index(1))
                .arg(
                    Arg::new("repo")
                        .long("repo")
                        .short('r')
                        .required(true)
                        .help("Repository the session file lives in"),
                ),
        )
}
