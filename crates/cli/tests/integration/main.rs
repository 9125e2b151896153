//! Integration tests for the coursesync binary.

mod common;
mod deploy_tests;
mod plan_tests;
