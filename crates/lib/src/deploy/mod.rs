//! Deployment: turning a plan into remote writes.

pub mod driver;
pub mod links;
pub mod predeploy;
pub mod reclaim;
pub mod registry;
pub mod report;
pub mod run;
pub mod types;

pub use driver::{Driver, ExecutionSummary};
pub use links::{LinkError, LinkResolver, resolve_links};
pub use predeploy::{
  CONTENT_HASH_FIELD, ContentHasher, DATE_FIELDS, DateNormalizer, Predeploy, PredeployError, predeploy_all,
};
pub use reclaim::{NON_DELETABLE_TYPES, ReclaimSummary, deletion_priority, reclaim, stale_keys};
pub use registry::DeployerRegistry;
pub use report::{DeployedContent, DeploymentReport};
pub use run::{RunError, RunOptions, RunSummary, prepare, run};
pub use types::{DeployError, DeployOutcome, DeployRequest, Deployer, EngineError, Phase, ReviewNotice};
