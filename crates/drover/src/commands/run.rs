use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use tracing::info;

use super::helpers::{self, CliResult};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_: nix::libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Long-running supervisor: coordinate until SIGINT/SIGTERM, then shut down
/// gracefully (flushing pending commits, aborting in-flight rebases).
pub fn handle() -> CliResult {
    let orch = helpers::open_orchestrator()?;
    orch.start().map_err(|e| {
        eprintln!("Failed to start supervisor: {e}");
        e
    })?;

    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // Safe: the handler only stores to an atomic.
    unsafe {
        let _ = sigaction(Signal::SIGINT, &action);
        let _ = sigaction(Signal::SIGTERM, &action);
    }

    let repos = orch.instances().recent_repos();
    println!(
        "drover supervising {} repo(s); press Ctrl-C to stop",
        repos.len()
    );
    info!(event = "cli.run.started", repos = repos.len());

    while !SHUTDOWN.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    println!("shutting down...");
    orch.shutdown();
    info!(event = "cli.run.stopped");
    Ok(())
}
