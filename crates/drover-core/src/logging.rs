//! Structured logging initialization.
//!
//! All log output is JSON lines on stderr so stdout stays clean for command
//! output. Every log site in the workspace carries an `event = "..."` field
//! (`core.<module>.<action>` / `cli.<command>.<action>`) plus context fields.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `quiet` restricts output to warnings and errors (the CLI default);
/// verbose mode shows info-level events. `RUST_LOG` overrides both.
///
/// Safe to call more than once — subsequent calls are no-ops.
pub fn init_logging(quiet: bool) {
    let default_directive = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_current_span(false)
        .try_init();
}
