//! kiln-lib: Core types and logic for kiln
//!
//! This crate builds native packages from declarative recipes:
//! - `options`: typed recipe options finalized against platform facts
//! - `resolve`: requirement resolution against a package store
//! - `identity`: package id derived from binary-relevant configuration
//! - `build`: patch, configure, compile and install through an external toolchain
//! - `sign`: post-processing of produced dynamic libraries
//! - `package`: the end-to-end pipeline and store publication

pub mod artifact;
pub mod build;
pub mod consts;
pub mod identity;
pub mod options;
pub mod package;
pub mod platform;
pub mod recipe;
pub mod resolve;
pub mod sign;
pub mod util;
