//! In-memory agent/session registry with heartbeat-derived liveness.
//!
//! The registry is sourced entirely from state-directory files (via the
//! agent listener) and never trusts event payloads over disk contents.
//! Records survive liveness loss — an agent going quiet flips `is_alive`
//! but only file removal deletes the record.

mod registry;

pub use registry::{AgentEntry, Registry, RegistrySnapshot};
