//! End-to-end runs of the deployment engine against an in-memory course.

mod common;
mod cycle_tests;
mod deploy_tests;
mod reclaim_tests;
