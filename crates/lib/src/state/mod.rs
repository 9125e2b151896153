//! Persisted deployment state.
//!
//! For each resource deployed to a course, the state records the checksum
//! of the payload that was deployed and the remote description returned by
//! the platform. It is what makes runs incremental, what lets tokens refer
//! to resources not touched by the current run, and what reclamation uses
//! to find resources the document no longer declares.

pub mod lock;
pub mod migration;
pub mod storage;
pub mod types;

pub use lock::{LockError, LockMetadata, LockMode, StateLock};
pub use migration::{MigrationError, MigrationOutcome, migrate};
pub use storage::StateStorage;
pub use types::{StateEntry, StateError, StateStore};
