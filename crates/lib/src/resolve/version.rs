//! Package versions and version requirements.
//!
//! Native library versions rarely follow semver exactly (`1.1.0l`, `3.0`,
//! `1.1.0l+2`), so parsing is lenient: missing components are padded with
//! zeros, and a letter suffix on the last component moves into build
//! metadata. A fourth component (`1.1.0.4`) is a revision: it is compared
//! right after the patch number, ahead of any pre-release tag, so
//! `1.1.0.3 < 1.1.0.4-beta1 < 1.1.0.4`. Everything else follows semver, with
//! build metadata as the tie-breaker, which keeps `1.1.0k < 1.1.0l < 1.1.0l+2`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::VersionReq;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
  #[error("invalid version '{0}'")]
  InvalidVersion(String),

  #[error("invalid version range '{range}': {message}")]
  InvalidRange { range: String, message: String },
}

/// A concrete package version. Displays as originally written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
  raw: String,
  revision: u64,
  parsed: semver::Version,
}

impl Version {
  pub fn parse(raw: &str) -> Result<Self, VersionError> {
    let invalid = || VersionError::InvalidVersion(raw.to_string());
    let raw = raw.trim();
    if raw.is_empty() {
      return Err(invalid());
    }

    let (core, build) = match raw.split_once('+') {
      Some((core, build)) => (core, Some(build)),
      None => (raw, None),
    };
    let (core, pre) = match core.split_once('-') {
      Some((core, pre)) => (core, Some(pre)),
      None => (core, None),
    };

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
      return Err(invalid());
    }

    // A trailing letter run on the last component ("0l") is a revision tag.
    let mut suffix = None;
    let last_idx = parts.len() - 1;
    let last: &str = parts[last_idx];
    let digits = last.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    if digits.len() != last.len() {
      suffix = Some(&last[digits.len()..]);
      parts[last_idx] = digits;
    }

    let mut numbers = [0u64; 4];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
      *slot = part.parse().map_err(|_| invalid())?;
    }
    let revision = (parts.len() == 4).then(|| numbers[3].to_string());

    let mut text = format!("{}.{}.{}", numbers[0], numbers[1], numbers[2]);
    if let Some(pre) = pre {
      text.push('-');
      text.push_str(pre);
    }
    let metadata: Vec<&str> = revision.as_deref().into_iter().chain(suffix).chain(build).collect();
    if !metadata.is_empty() {
      text.push('+');
      text.push_str(&metadata.join("."));
    }

    let parsed = semver::Version::parse(&text).map_err(|_| invalid())?;
    Ok(Self {
      raw: raw.to_string(),
      revision: numbers[3],
      parsed,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  pub fn semver(&self) -> &semver::Version {
    &self.parsed
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    let (a, b) = (&self.parsed, &other.parsed);
    (a.major, a.minor, a.patch, self.revision)
      .cmp(&(b.major, b.minor, b.patch, other.revision))
      .then_with(|| a.cmp(b))
  }
}

impl std::hash::Hash for Version {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.revision.hash(state);
    self.parsed.hash(state);
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

impl FromStr for Version {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for Version {
  type Error = VersionError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<Version> for String {
  fn from(v: Version) -> Self {
    v.raw
  }
}

/// What a requirement accepts: one exact version or a bracketed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
  Exact(Version),
  Range { raw: String, req: VersionReq },
}

impl VersionSpec {
  /// Parse `1.1.0l+2` or `[>=1.1 <2]`.
  pub fn parse(raw: &str) -> Result<Self, VersionError> {
    let raw = raw.trim();
    match raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
      Some(inner) => {
        let req = VersionReq::parse(&normalize_range(inner)).map_err(|e| VersionError::InvalidRange {
          range: raw.to_string(),
          message: e.to_string(),
        })?;
        Ok(VersionSpec::Range {
          raw: raw.to_string(),
          req,
        })
      }
      None => Version::parse(raw).map(VersionSpec::Exact),
    }
  }

  pub fn matches(&self, version: &Version) -> bool {
    match self {
      VersionSpec::Exact(v) => v == version,
      VersionSpec::Range { req, .. } => req.matches(version.semver()),
    }
  }
}

impl fmt::Display for VersionSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionSpec::Exact(v) => write!(f, "{}", v),
      VersionSpec::Range { raw, .. } => f.write_str(raw),
    }
  }
}

/// Turn a space-separated range (`>=1.1 <2`, `>= 1.1`) into the
/// comma-separated form the semver crate expects.
fn normalize_range(inner: &str) -> String {
  if inner.contains(',') {
    return inner.to_string();
  }
  let mut comparators: Vec<String> = Vec::new();
  let mut pending_op = String::new();
  for token in inner.split_whitespace() {
    if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
      pending_op.push_str(token);
    } else {
      comparators.push(format!("{}{}", pending_op, token));
      pending_op.clear();
    }
  }
  comparators.join(", ")
}
