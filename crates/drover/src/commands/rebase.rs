use clap::ArgMatches;
use drover_core::{Request, SessionId};

use super::helpers::{self, CliResult};

pub fn handle(matches: &ArgMatches, json: bool) -> CliResult {
    let (name, sub) = matches.subcommand().expect("subcommand_required");
    let session_id = SessionId::new(
        sub.get_one::<String>("session")
            .expect("required arg")
            .clone(),
    );

    let orch = helpers::bootstrapped_orchestrator()?;

    // One-shot invocations have no long-lived supervisor to talk to, so the
    // poller is armed in-process before the verb runs against it.
    if name != "start" {
        let _ = orch.start_rebase_watcher(&session_id);
    }

    let request = match name {
        "start" => Request::StartRebaseWatcher { session_id },
        "stop" => Request::StopRebaseWatcher { session_id },
        "pause" => Request::PauseRebaseWatcher { session_id },
        "resume" => Request::ResumeRebaseWatcher { session_id },
        "check" => Request::ForceCheck { session_id },
        "trigger" => Request::TriggerRebase { session_id },
        _ => unreachable!("subcommand_required"),
    };

    let response = orch.handle(request);
    let result = helpers::finish(response, json);
    orch.shutdown();
    result
}
