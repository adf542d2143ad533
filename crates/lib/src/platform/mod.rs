//! Platform facts: the settings a build is configured against.
//!
//! A [`PlatformFacts`] value describes the target os, architecture, compiler
//! and build type. It is read from a profile file, falling back to host
//! detection for anything the profile leaves out, and can be adjusted with
//! `key=value` overrides from the command line.

pub mod arch;
pub mod compiler;
pub mod os;
pub mod paths;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arch::Arch;
use compiler::{BuildType, Compiler};
use os::Os;

#[derive(Debug, Error)]
pub enum SettingError {
  #[error("invalid value '{value}' for setting '{key}'")]
  InvalidValue { key: String, value: String },

  #[error("unknown setting '{0}'")]
  UnknownSetting(String),

  #[error("setting override '{0}' must have the form key=value")]
  MalformedOverride(String),

  #[error("unsupported host platform ({os}/{arch})")]
  UnsupportedHost { os: String, arch: String },

  #[error("failed to read profile {path}: {source}")]
  ReadProfile {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse profile {path}: {source}")]
  ParseProfile {
    path: String,
    #[source]
    source: toml::de::Error,
  },
}

/// Platform identifier combining architecture and OS (e.g., "x86_64-windows")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// The settings a package is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformFacts {
  pub os: Os,
  pub arch: Arch,
  pub compiler: Compiler,
  pub build_type: BuildType,
}

impl PlatformFacts {
  pub fn new(os: Os, arch: Arch, compiler: Compiler, build_type: BuildType) -> Self {
    Self {
      os,
      arch,
      compiler,
      build_type,
    }
  }

  /// Facts for the host with its default compiler and a release build.
  pub fn detect() -> Result<Self, SettingError> {
    let platform = Platform::current().ok_or_else(|| SettingError::UnsupportedHost {
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
    })?;
    Ok(Self::new(
      platform.os,
      platform.arch,
      Compiler::default_for(platform.os),
      BuildType::Release,
    ))
  }

  /// Load a profile file, filling anything it omits from the host.
  pub fn from_profile(path: &Path) -> Result<Self, SettingError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingError::ReadProfile {
      path: path.display().to_string(),
      source,
    })?;
    let profile: ProfileFile = toml::from_str(&content).map_err(|source| SettingError::ParseProfile {
      path: path.display().to_string(),
      source,
    })?;
    profile.settings.into_facts()
  }

  pub fn platform(&self) -> Platform {
    Platform::new(self.arch, self.os)
  }

  /// Apply a single `key=value` override.
  ///
  /// Keys: `os`, `arch`, `build_type`, `compiler`, `compiler.version`,
  /// `compiler.runtime`, `compiler.libcxx`. Changing `os` does not reset the
  /// compiler; override it explicitly if needed.
  pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
    match key {
      "os" => self.os = value.parse()?,
      "arch" => self.arch = value.parse()?,
      "build_type" => self.build_type = value.parse()?,
      "compiler" => self.compiler = Compiler::new(value),
      "compiler.version" => self.compiler.version = Some(value.to_string()),
      "compiler.runtime" => self.compiler.runtime = Some(value.to_string()),
      "compiler.libcxx" => self.compiler.libcxx = Some(value.to_string()),
      _ => return Err(SettingError::UnknownSetting(key.to_string())),
    }
    Ok(())
  }

  /// Apply an override written as `key=value`.
  pub fn apply_override(&mut self, assignment: &str) -> Result<(), SettingError> {
    let (key, value) = assignment
      .split_once('=')
      .ok_or_else(|| SettingError::MalformedOverride(assignment.to_string()))?;
    self.set(key.trim(), value.trim())
  }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
  #[serde(default)]
  settings: ProfileSettings,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileSettings {
  os: Option<Os>,
  arch: Option<Arch>,
  build_type: Option<BuildType>,
  compiler: Option<Compiler>,
}

impl ProfileSettings {
  fn into_facts(self) -> Result<PlatformFacts, SettingError> {
    let (os, arch) = match (self.os, self.arch) {
      (Some(os), Some(arch)) => (os, arch),
      (os, arch) => {
        let host = PlatformFacts::detect()?;
        (os.unwrap_or(host.os), arch.unwrap_or(host.arch))
      }
    };
    Ok(PlatformFacts {
      os,
      arch,
      compiler: self.compiler.unwrap_or_else(|| Compiler::default_for(os)),
      build_type: self.build_type.unwrap_or(BuildType::Release),
    })
  }
}
