//! Durable records of sessions the orchestrator itself created.
//!
//! Instances live in a process-wide settings store keyed by the install
//! (`~/.drover/instances.json`), not in any repo's state directory. That
//! split is deliberate: sessions survive `.S9N_KIT_DevOpsAgent/` deletion,
//! and per-repo state survives settings-store corruption. The store also
//! keeps the recently-used repo list the listener and recovery scanner
//! iterate.
//!
//! The store is an explicit dependency — constructor-injected where needed,
//! never a global.

pub mod errors;
pub mod store;
pub mod types;

pub use errors::InstanceError;
pub use store::InstanceStore;
pub use types::{AgentInstance, AgentInstanceConfig};
