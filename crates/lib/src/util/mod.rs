//! Shared utilities.
//!
//! Content hashing and filesystem helpers used across the crate.

pub mod fs;
pub mod hash;
