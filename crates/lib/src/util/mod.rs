//! Shared utilities.

pub mod archive;
pub mod hash;

#[cfg(test)]
pub mod testutil;
