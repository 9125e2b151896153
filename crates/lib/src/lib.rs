//! coursesync-lib: dependency resolution and incremental deployment of course content.
//!
//! This crate provides the engine behind the `coursesync` CLI:
//! - `ResourceStore`: the declared resources of one course document
//! - `plan`: dependency graph, cycle breaking, scheduling and change detection
//! - `deploy`: the three-phase deployment driver, link resolution and reclamation
//! - `state`: persisted per-course deployment state, locking and migrations
//! - `api`: the remote course platform client

pub mod adapters;
pub mod api;
pub mod consts;
pub mod deploy;
pub mod paths;
pub mod plan;
pub mod resource;
pub mod state;
pub mod token;
pub mod util;

pub use resource::{Payload, Resource, ResourceInfo, ResourceKey, ResourceStore};
