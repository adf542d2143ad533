//! Well-known directories.
//!
//! `KILN_STORE` and `KILN_BUILD_ROOT` override the store and the build
//! working root; everything else follows XDG (or the Windows equivalents).
//! `KILN_CMAKE` points at a specific cmake executable.

use std::path::PathBuf;

use crate::consts::APP_NAME;

pub const STORE_ENV: &str = "KILN_STORE";
pub const BUILD_ROOT_ENV: &str = "KILN_BUILD_ROOT";
pub const CMAKE_ENV: &str = "KILN_CMAKE";

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  env_path("USERPROFILE").unwrap_or_else(|| PathBuf::from("C:\\"))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  env_path("HOME").unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  env_path("APPDATA").unwrap_or_else(home_dir).join(APP_NAME)
}

#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  env_path("XDG_DATA_HOME")
    .unwrap_or_else(|| home_dir().join(".local").join("share"))
    .join(APP_NAME)
}

#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  env_path("LOCALAPPDATA")
    .unwrap_or_else(home_dir)
    .join(APP_NAME)
    .join("Cache")
}

#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  env_path("XDG_CACHE_HOME")
    .unwrap_or_else(|| home_dir().join(".cache"))
    .join(APP_NAME)
}

/// Root of the package store (dependencies and published packages).
pub fn store_dir() -> PathBuf {
  env_path(STORE_ENV).unwrap_or_else(|| data_dir().join("store"))
}

/// Root under which per-build working directories are created.
pub fn build_root() -> PathBuf {
  env_path(BUILD_ROOT_ENV).unwrap_or_else(|| cache_dir().join("build"))
}

/// The cmake executable, looked up on `PATH` unless overridden.
pub fn cmake_program() -> PathBuf {
  env_path(CMAKE_ENV).unwrap_or_else(|| PathBuf::from("cmake"))
}
