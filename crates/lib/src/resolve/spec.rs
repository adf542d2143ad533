//! Requirement declarations and the provenance they may inherit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::version::{VersionError, VersionSpec};

/// Whether a dependency is needed only to build, or is linked into the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
  /// Tools used while building (generators, signing utilities).
  Build,
  /// Libraries the package links against. These feed the package id.
  Link,
}

/// The user/channel pair the current build is published under.
///
/// Requirements may refer to it with `{user}` / `{channel}` so that a
/// dependency comes from the same provenance as the package itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
  pub user: Option<String>,
  pub channel: Option<String>,
}

impl Provenance {
  pub fn new(user: Option<&str>, channel: Option<&str>) -> Self {
    Self {
      user: user.map(str::to_string),
      channel: channel.map(str::to_string),
    }
  }

  pub fn get(&self, field: ProvenanceField) -> Option<&str> {
    match field {
      ProvenanceField::User => self.user.as_deref(),
      ProvenanceField::Channel => self.channel.as_deref(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvenanceField {
  User,
  Channel,
}

impl fmt::Display for ProvenanceField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProvenanceField::User => f.write_str("user"),
      ProvenanceField::Channel => f.write_str("channel"),
    }
  }
}

/// The user or channel component of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
  Fixed(String),
  /// Taken from the caller's [`Provenance`] at resolution time.
  Inherit(ProvenanceField),
}

impl Qualifier {
  fn parse(raw: &str) -> Self {
    match raw {
      "{user}" => Qualifier::Inherit(ProvenanceField::User),
      "{channel}" => Qualifier::Inherit(ProvenanceField::Channel),
      other => Qualifier::Fixed(other.to_string()),
    }
  }
}

impl fmt::Display for Qualifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Qualifier::Fixed(value) => f.write_str(value),
      Qualifier::Inherit(field) => write!(f, "{{{}}}", field),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
  #[error("reference '{0}' must have the form name/version[@user/channel]")]
  Malformed(String),

  #[error("reference '{reference}': {source}")]
  Version {
    reference: String,
    #[source]
    source: VersionError,
  },
}

/// A declared requirement: `openssl/1.1.0l+2@odant/stable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
  pub name: String,
  pub version: VersionSpec,
  pub user: Qualifier,
  pub channel: Qualifier,
  pub scope: Scope,
  /// Resolve only when this boolean option is applicable and true.
  pub when: Option<String>,
}

impl DependencySpec {
  pub fn parse(reference: &str, scope: Scope) -> Result<Self, ReferenceError> {
    let malformed = || ReferenceError::Malformed(reference.to_string());

    let (name_version, user_channel) = match reference.rsplit_once('@') {
      Some((nv, uc)) => (nv, Some(uc)),
      None => (reference, None),
    };
    let (name, version) = name_version.split_once('/').ok_or_else(malformed)?;
    let (user, channel) = match user_channel {
      Some(uc) => uc.split_once('/').ok_or_else(malformed)?,
      None => ("_", "_"),
    };

    let name = name.trim();
    if name.is_empty() || [user, channel].iter().any(|q| q.is_empty() || q.contains('/')) {
      return Err(malformed());
    }

    let version = VersionSpec::parse(version).map_err(|source| ReferenceError::Version {
      reference: reference.to_string(),
      source,
    })?;

    Ok(Self {
      name: name.to_string(),
      version,
      user: Qualifier::parse(user),
      channel: Qualifier::parse(channel),
      scope,
      when: None,
    })
  }

  pub fn when(mut self, option: &str) -> Self {
    self.when = Some(option.to_string());
    self
  }
}

impl fmt::Display for DependencySpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}@{}/{}", self.name, self.version, self.user, self.channel)
  }
}

impl FromStr for DependencySpec {
  type Err = ReferenceError;

  /// Parses a link-scope requirement.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s, Scope::Link)
  }
}
