//! Package store lookup.
//!
//! The store maps `(name, version, user, channel)` to a directory. The
//! filesystem store lays references out as
//! `<root>/<name>/<version>/<user>/<channel>/`; published binaries live
//! below that under `package/<package id>/`.
//!
//! A dependency's location is its first complete binary package (by id). A
//! reference directory with no `package/` subdirectory is used as is, which
//! lets prebuilt tools be dropped into the store by hand.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

use super::version::{Version, VersionSpec};
use crate::consts::PACKAGE_COMPLETE_MARKER;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to read store directory {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A version found in the store together with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
  pub version: Version,
  pub location: PathBuf,
}

/// The dependency store boundary.
pub trait DependencyStore {
  /// Find the best entry for a requirement, or `None` if nothing satisfies it.
  fn lookup(
    &self,
    name: &str,
    version: &VersionSpec,
    user: &str,
    channel: &str,
  ) -> Result<Option<StoreEntry>, StoreError>;
}

/// A store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn reference_dir(&self, name: &str, version: &Version, user: &str, channel: &str) -> PathBuf {
    self.root.join(name).join(version.as_str()).join(user).join(channel)
  }

  /// All parseable versions present for `name`, in no particular order.
  fn versions(&self, name: &str) -> Result<Vec<Version>, StoreError> {
    let dir = self.root.join(name);
    let entries = match std::fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => return Err(StoreError::Read { path: dir, source }),
    };

    let mut versions = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|source| StoreError::Read {
        path: dir.clone(),
        source,
      })?;
      let file_name = entry.file_name();
      let Some(raw) = file_name.to_str() else {
        continue;
      };
      match Version::parse(raw) {
        Ok(v) => versions.push(v),
        Err(_) => trace!(name, entry = raw, "skipping non-version store entry"),
      }
    }
    Ok(versions)
  }
}

impl DependencyStore for FsStore {
  fn lookup(
    &self,
    name: &str,
    version: &VersionSpec,
    user: &str,
    channel: &str,
  ) -> Result<Option<StoreEntry>, StoreError> {
    let best = self
      .versions(name)?
      .into_iter()
      .filter(|v| version.matches(v))
      .filter(|v| self.reference_dir(name, v, user, channel).is_dir())
      .max();

    debug!(
      name,
      spec = %version,
      user,
      channel,
      found = ?best.as_ref().map(|v| v.as_str()),
      "store lookup"
    );

    let Some(version) = best else {
      return Ok(None);
    };
    let location = package_location(&self.reference_dir(name, &version, user, channel))?;
    Ok(Some(StoreEntry { version, location }))
  }
}

/// The directory holding a reference's installed files.
fn package_location(reference_dir: &Path) -> Result<PathBuf, StoreError> {
  let packages = reference_dir.join("package");
  let entries = match std::fs::read_dir(&packages) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(reference_dir.to_path_buf()),
    Err(source) => return Err(StoreError::Read { path: packages, source }),
  };

  let mut complete: Vec<PathBuf> = entries
    .filter_map(Result::ok)
    .map(|e| e.path())
    .filter(|p| p.join(PACKAGE_COMPLETE_MARKER).is_file())
    .collect();
  complete.sort();
  Ok(complete.into_iter().next().unwrap_or_else(|| reference_dir.to_path_buf()))
}
