use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::patch::PatchError;
use crate::platform::compiler::BuildType;

/// Progress of one build. Transitions only move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
  Unpatched,
  Patched,
  Configured,
  Compiled,
  Installed,
}

impl BuildState {
  /// The state that follows this one, if any.
  pub fn next(self) -> Option<Self> {
    match self {
      Self::Unpatched => Some(Self::Patched),
      Self::Patched => Some(Self::Configured),
      Self::Configured => Some(Self::Compiled),
      Self::Compiled => Some(Self::Installed),
      Self::Installed => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unpatched => "unpatched",
      Self::Patched => "patched",
      Self::Configured => "configured",
      Self::Compiled => "compiled",
      Self::Installed => "installed",
    }
  }
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A toolchain step, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolStep {
  Configure,
  Build,
  Install,
}

impl fmt::Display for ToolStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ToolStep::Configure => f.write_str("configure"),
      ToolStep::Build => f.write_str("build"),
      ToolStep::Install => f.write_str("install"),
    }
  }
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Patch(#[from] PatchError),

  /// The toolchain exited unsuccessfully. `output` is its combined
  /// stdout and stderr, unmodified.
  #[error("{step} step failed (exit code {}):\n{output}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
  ToolFailed {
    step: ToolStep,
    code: Option<i32>,
    output: String,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid build state transition from {from} to {to}")]
  InvalidTransition { from: BuildState, to: BuildState },

  #[error("failed to prepare {path}: {source}")]
  Workspace {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid import pattern '{pattern}': {source}")]
  ImportPattern {
    pattern: String,
    #[source]
    source: glob::PatternError,
  },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

/// Build file generator handed to the configure step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Generator {
  Ninja,
}

impl Generator {
  pub fn as_str(&self) -> &'static str {
    match self {
      Generator::Ninja => "Ninja",
    }
  }
}

impl fmt::Display for Generator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The build type passed to the toolchain.
///
/// Release builds keep debug information; everything else builds Debug.
pub fn toolchain_build_type(build_type: BuildType) -> BuildType {
  if build_type.is_release() {
    BuildType::RelWithDebInfo
  } else {
    BuildType::Debug
  }
}
