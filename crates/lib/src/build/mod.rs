//! Build lifecycle.
//!
//! A build copies the pristine source into an isolated workspace, applies
//! the recipe's patches in order, then drives an external [`Toolchain`]
//! through configure, build and install:
//!
//! ```text
//! Unpatched -> Patched -> Configured -> Compiled -> Installed
//! ```
//!
//! Transitions are one-way. Any failure aborts the build and discards the
//! workspace; there is no resume from an intermediate state.
//!
//! # Submodules
//!
//! - [`driver`] - The lifecycle driver and its workspace
//! - [`patch`] - Unified diff application
//! - [`toolchain`] - The toolchain boundary and the CMake implementation

pub mod driver;
pub mod patch;
pub mod toolchain;
mod types;

pub use driver::{BuildDriver, BuildOutput, BuildSettings, Workspace};
pub use patch::{ConflictKind, Patch, PatchError};
pub use toolchain::{BuildRequest, CMake, ConfigureRequest, InstallRequest, ToolOutput, Toolchain};
pub use types::*;
