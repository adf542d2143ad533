//! Compiler facts: toolchain family, version, runtime linkage and C++ ABI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::SettingError;
use super::os::Os;

/// The compiler a profile targets.
///
/// `runtime` is the MSVC runtime library selection (`MD`, `MDd`, `MT`,
/// `MTd`); `libcxx` is the C++ standard library ABI on GCC/Clang
/// (`libstdc++`, `libstdc++11`, `libc++`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compiler {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub runtime: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub libcxx: Option<String>,
}

impl Compiler {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      version: None,
      runtime: None,
      libcxx: None,
    }
  }

  pub fn with_version(mut self, version: &str) -> Self {
    self.version = Some(version.to_string());
    self
  }

  pub fn with_runtime(mut self, runtime: &str) -> Self {
    self.runtime = Some(runtime.to_string());
    self
  }

  pub fn with_libcxx(mut self, libcxx: &str) -> Self {
    self.libcxx = Some(libcxx.to_string());
    self
  }

  /// The usual compiler for an OS when a profile does not name one.
  pub fn default_for(os: Os) -> Self {
    match os {
      Os::Windows => Compiler::new("msvc").with_runtime("MD"),
      Os::Linux => Compiler::new("gcc").with_libcxx("libstdc++11"),
      Os::MacOs => Compiler::new("apple-clang").with_libcxx("libc++"),
    }
  }

  /// Whether this is an MSVC-family compiler.
  pub fn is_msvc(&self) -> bool {
    matches!(self.name.to_ascii_lowercase().as_str(), "msvc" | "visual studio")
  }

  /// Whether the selected runtime links the C runtime statically.
  pub fn static_runtime(&self) -> bool {
    matches!(self.runtime.as_deref(), Some("MT") | Some("MTd"))
  }
}

/// The build type axis of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildType {
  Debug,
  Release,
  RelWithDebInfo,
  MinSizeRel,
}

impl BuildType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debug => "Debug",
      Self::Release => "Release",
      Self::RelWithDebInfo => "RelWithDebInfo",
      Self::MinSizeRel => "MinSizeRel",
    }
  }

  pub fn is_release(&self) -> bool {
    matches!(self, Self::Release)
  }
}

impl fmt::Display for BuildType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for BuildType {
  type Err = SettingError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "debug" => Ok(Self::Debug),
      "release" => Ok(Self::Release),
      "relwithdebinfo" => Ok(Self::RelWithDebInfo),
      "minsizerel" => Ok(Self::MinSizeRel),
      _ => Err(SettingError::InvalidValue {
        key: "build_type".to_string(),
        value: s.to_string(),
      }),
    }
  }
}

impl TryFrom<String> for BuildType {
  type Error = SettingError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<BuildType> for String {
  fn from(bt: BuildType) -> Self {
    bt.as_str().to_string()
  }
}
