//! drover-core: per-repository coordination engine for independent AI
//! coding agents.
//!
//! Agents introduce themselves by writing files into a well-known state
//! directory (`.S9N_KIT_DevOpsAgent/`); drover observes those files, tracks
//! per-session lifecycle, enforces mutually-exclusive file edit locks,
//! auto-commits filesystem change bursts, and keeps session branches
//! rebased when their base advances on the remote.
//!
//! # Main Entry Points
//!
//! - [`orchestrator`] - Facade wiring every component + the request surface
//! - [`registry`] - Agent/session registry with heartbeat liveness
//! - [`listener`] - State-directory watcher feeding the registry
//! - [`locks`] - Cross-agent file lock manager
//! - [`watcher`] - Per-session file watcher + commit debouncer
//! - [`rebase`] - Per-session rebase pollers
//! - [`recovery`] - Orphaned-session scanner and adoption
//! - [`git`] - Subprocess git executor with failure categories

pub mod activity;
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod git;
pub mod instances;
pub mod listener;
pub mod locks;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod rebase;
pub mod recovery;
pub mod registry;
pub mod statedir;
pub mod watcher;

// Re-export shared ids and wire types from drover-protocol
pub use drover_protocol::{
    ActivityEntry, ActivityKind, AgentId, AgentRecord, AgentType, Capability, EditDeclaration,
    FileConflict, FileLock, InstanceStatus, KanvasCommand, OrphanedSession, RebaseFrequency,
    RebaseResult, RebaseWatchState, Response, SessionId, SessionReport, SessionStatus,
};

pub use errors::{DroverError, DroverResult};
pub use events::{Envelope, Event, EventBus, Subscription};
pub use instances::{AgentInstance, AgentInstanceConfig, InstanceStore};
pub use orchestrator::{Orchestrator, Request};

// Re-export logging initialization
pub use logging::init_logging;
