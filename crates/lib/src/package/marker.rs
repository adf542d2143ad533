//! Completion markers for published packages.
//!
//! The marker is written last, after the package contents and metadata. It
//! records a hash of everything else in the directory so a later run can
//! tell a complete package from a truncated or modified one.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::PackageError;
use crate::consts::PACKAGE_COMPLETE_MARKER;
use crate::util::hash::hash_directory;

/// Excluded when hashing a package directory: the marker itself.
const PACKAGE_HASH_EXCLUSIONS: &[&str] = &[PACKAGE_COMPLETE_MARKER];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMarker {
  /// Marker format version.
  pub version: u32,
  /// Always "complete".
  pub status: String,
  /// Full SHA-256 of the package directory contents.
  pub output_hash: String,
}

/// Hash the package directory and write its marker.
pub fn write_marker(package_dir: &Path) -> Result<PackageMarker, PackageError> {
  let output_hash = hash_directory(package_dir, PACKAGE_HASH_EXCLUSIONS)?;
  let marker = PackageMarker {
    version: 1,
    status: "complete".to_string(),
    output_hash: output_hash.0,
  };
  let content = serde_json::to_string(&marker)?;
  let path = package_dir.join(PACKAGE_COMPLETE_MARKER);
  std::fs::write(&path, format!("{}\n", content)).map_err(|source| PackageError::Publish { path, source })?;
  Ok(marker)
}

/// Read the marker. `Ok(None)` when there is none.
pub fn read_marker(package_dir: &Path) -> Result<Option<PackageMarker>, PackageError> {
  let path = package_dir.join(PACKAGE_COMPLETE_MARKER);
  if !path.exists() {
    return Ok(None);
  }
  let content = std::fs::read_to_string(&path).map_err(|source| PackageError::Publish {
    path: path.clone(),
    source,
  })?;
  let marker = serde_json::from_str(&content).map_err(|e| PackageError::InvalidMarker {
    path,
    message: e.to_string(),
  })?;
  Ok(Some(marker))
}

/// Whether the directory still hashes to what its marker recorded.
pub fn verify(package_dir: &Path, marker: &PackageMarker) -> bool {
  match hash_directory(package_dir, PACKAGE_HASH_EXCLUSIONS) {
    Ok(current) if current.0 == marker.output_hash => true,
    Ok(current) => {
      warn!(
        path = ?package_dir,
        expected = %marker.output_hash,
        actual = %current.0,
        "published package corrupted, will rebuild"
      );
      false
    }
    Err(e) => {
      warn!(path = ?package_dir, error = %e, "failed to hash published package, will rebuild");
      false
    }
  }
}

/// A complete, unmodified package directory.
pub fn is_valid(package_dir: &Path) -> bool {
  match read_marker(package_dir) {
    Ok(Some(marker)) => verify(package_dir, &marker),
    Ok(None) => {
      debug!(path = ?package_dir, "no completion marker");
      false
    }
    Err(e) => {
      debug!(path = ?package_dir, error = %e, "invalid completion marker");
      false
    }
  }
}
