//! Fully qualified package references: `name/version@user/channel`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identity::PackageId;
use crate::resolve::{ReferenceError, Version};

/// A concrete published reference. Unlike a requirement, every part is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageReference {
  pub name: String,
  pub version: Version,
  pub user: String,
  pub channel: String,
}

impl PackageReference {
  pub fn new(name: &str, version: Version, user: &str, channel: &str) -> Self {
    Self {
      name: name.to_string(),
      version,
      user: user.to_string(),
      channel: channel.to_string(),
    }
  }

  /// `<store>/<name>/<version>/<user>/<channel>`, the layout read by
  /// [`FsStore`](crate::resolve::FsStore).
  pub fn store_dir(&self, store_root: &Path) -> PathBuf {
    store_root
      .join(&self.name)
      .join(self.version.as_str())
      .join(&self.user)
      .join(&self.channel)
  }

  /// Where the binary package for `id` is published.
  pub fn package_dir(&self, store_root: &Path, id: &PackageId) -> PathBuf {
    self.store_dir(store_root).join("package").join(id.as_str())
  }
}

impl fmt::Display for PackageReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}@{}/{}", self.name, self.version, self.user, self.channel)
  }
}

impl FromStr for PackageReference {
  type Err = ReferenceError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let malformed = || ReferenceError::Malformed(s.to_string());
    let (name_version, user_channel) = s.rsplit_once('@').unwrap_or((s, "_/_"));
    let (name, version) = name_version.split_once('/').ok_or_else(malformed)?;
    let (user, channel) = user_channel.split_once('/').ok_or_else(malformed)?;
    if [name, user, channel].iter().any(|p| p.is_empty() || p.contains(['/', '{', '['])) {
      return Err(malformed());
    }
    let version = Version::parse(version).map_err(|source| ReferenceError::Version {
      reference: s.to_string(),
      source,
    })?;
    Ok(Self::new(name, version, user, channel))
  }
}

impl TryFrom<String> for PackageReference {
  type Error = ReferenceError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<PackageReference> for String {
  fn from(r: PackageReference) -> Self {
    r.to_string()
  }
}
