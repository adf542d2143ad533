//! Dependency resolution.
//!
//! Turns declared [`DependencySpec`]s into concrete [`ResolvedDependency`]s
//! by consulting a [`DependencyStore`]. Resolution is parameterized by the
//! caller's [`Provenance`] so a requirement such as
//! `windows_signtool/[>=1.1]@{user}/stable` follows whoever is building.
//!
//! Gated requirements (`when = "ninja"`) are only resolved when their option
//! is applicable and enabled in the finalized configuration.

pub mod spec;
pub mod store;
pub mod version;

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::options::FinalizedConfiguration;

pub use spec::{DependencySpec, Provenance, ProvenanceField, Qualifier, ReferenceError, Scope};
pub use store::{DependencyStore, FsStore, StoreEntry, StoreError};
pub use version::{Version, VersionError, VersionSpec};

#[derive(Debug, Error)]
pub enum ResolveError {
  /// No version in the store satisfies the requirement.
  #[error("unresolved dependency '{reference}': no matching version in the store")]
  Unresolved { reference: String },

  /// The requirement inherits a provenance value that was never supplied.
  #[error("dependency '{reference}' inherits the {field} of the current build, but no {field} was given")]
  AmbiguousChannel { reference: String, field: ProvenanceField },

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// A requirement bound to a concrete version and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
  pub spec: DependencySpec,
  pub version: Version,
  pub user: String,
  pub channel: String,
  pub location: PathBuf,
}

impl ResolvedDependency {
  pub fn name(&self) -> &str {
    &self.spec.name
  }

  pub fn scope(&self) -> Scope {
    self.spec.scope
  }

  /// Fully qualified reference, e.g. `openssl/1.1.0l+2@odant/stable`.
  pub fn reference(&self) -> String {
    format!("{}/{}@{}/{}", self.spec.name, self.version, self.user, self.channel)
  }
}

pub struct Resolver<'a, S: DependencyStore> {
  store: &'a S,
  provenance: &'a Provenance,
}

impl<'a, S: DependencyStore> Resolver<'a, S> {
  pub fn new(store: &'a S, provenance: &'a Provenance) -> Self {
    Self { store, provenance }
  }

  /// Resolve every applicable requirement, in declaration order.
  pub fn resolve(
    &self,
    specs: &[DependencySpec],
    config: &FinalizedConfiguration,
  ) -> Result<Vec<ResolvedDependency>, ResolveError> {
    let mut resolved = Vec::new();

    for spec in specs {
      if let Some(option) = &spec.when
        && !config.is_enabled(option)
      {
        debug!(dependency = %spec, option = %option, "skipping gated dependency");
        continue;
      }
      resolved.push(self.resolve_one(spec)?);
    }

    info!(count = resolved.len(), "dependencies resolved");
    Ok(resolved)
  }

  fn resolve_one(&self, spec: &DependencySpec) -> Result<ResolvedDependency, ResolveError> {
    let user = self.qualify(spec, &spec.user)?;
    let channel = self.qualify(spec, &spec.channel)?;

    let entry = self
      .store
      .lookup(&spec.name, &spec.version, &user, &channel)?
      .ok_or_else(|| ResolveError::Unresolved {
        reference: format!("{}/{}@{}/{}", spec.name, spec.version, user, channel),
      })?;

    let dep = ResolvedDependency {
      spec: spec.clone(),
      version: entry.version,
      user,
      channel,
      location: entry.location,
    };
    info!(dependency = %dep.reference(), scope = ?dep.scope(), "resolved");
    Ok(dep)
  }

  fn qualify(&self, spec: &DependencySpec, qualifier: &Qualifier) -> Result<String, ResolveError> {
    match qualifier {
      Qualifier::Fixed(value) => Ok(value.clone()),
      Qualifier::Inherit(field) => self
        .provenance
        .get(*field)
        .map(str::to_string)
        .ok_or_else(|| ResolveError::AmbiguousChannel {
          reference: spec.to_string(),
          field: *field,
        }),
    }
  }
}
