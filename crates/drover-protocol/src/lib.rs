//! # drover-protocol
//!
//! Newtype identifiers, shared domain enums, and the on-disk wire types that
//! make up drover's coordination contract with external agent processes.
//!
//! Everything in this crate is plain data: no I/O, no clocks, no process
//! state. The `.S9N_KIT_DevOpsAgent/` state directory files are serialized
//! exactly from these types, so changes here are wire-format changes.

pub mod records;
pub mod response;
pub mod types;

pub use records::{
    ActivityEntry, AgentRecord, EditDeclaration, FileConflict, FileLock, KanvasCommand,
    OrphanedSession, RebaseResult, RebaseWatchState, SessionReport,
};
pub use response::{ErrorBody, Response};
pub use types::{
    ActivityKind, AgentId, AgentType, Capability, InstanceStatus, RebaseFrequency, SessionId,
    SessionStatus,
};
