//! Lookup of deployers by resource type.

use std::collections::BTreeMap;

use crate::adapters;
use crate::resource::Payload;

use super::types::Deployer;

/// Maps resource type names to their deployers.
#[derive(Default)]
pub struct DeployerRegistry {
  deployers: BTreeMap<String, Box<dyn Deployer>>,
}

impl DeployerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with a deployer for every Canvas resource type.
  pub fn canvas() -> Self {
    let mut registry = Self::new();
    registry.register("announcement", adapters::AnnouncementDeployer);
    registry.register("assignment", adapters::AssignmentDeployer);
    registry.register("assignment_group", adapters::AssignmentGroupDeployer);
    registry.register("course_settings", adapters::CourseSettingsDeployer);
    registry.register("file", adapters::FileDeployer);
    registry.register("module", adapters::ModuleDeployer);
    registry.register("module_item", adapters::ModuleItemDeployer);
    registry.register("override", adapters::OverrideDeployer);
    registry.register("page", adapters::PageDeployer);
    registry.register("quiz", adapters::QuizDeployer);
    registry.register("quiz_question", adapters::QuizQuestionDeployer);
    registry.register("syllabus", adapters::SyllabusDeployer);
    registry.register("zip", adapters::ZipDeployer);
    registry
  }

  pub fn register(&mut self, rtype: &str, deployer: impl Deployer + 'static) {
    self.deployers.insert(rtype.to_string(), Box::new(deployer));
  }

  pub fn get(&self, rtype: &str) -> Option<&dyn Deployer> {
    self.deployers.get(rtype).map(|d| d.as_ref())
  }

  /// Whether resources of `rtype` can be deployed as cycle-breaking shells.
  pub fn supports_shell(&self, rtype: &str) -> bool {
    self.get(rtype).is_some_and(|d| d.shell(&Payload::new()).is_some())
  }

  pub fn types(&self) -> impl Iterator<Item = &str> {
    self.deployers.keys().map(String::as_str)
  }
}
