//! Package identity.
//!
//! A [`PackageId`] names one binary-compatible build of a recipe. It is the
//! hash of an [`IdentityDocument`]: the platform settings, the finalized
//! options that affect the produced binaries, and the versions of link-scope
//! dependencies. Everything is kept in `BTreeMap`s so the serialized form,
//! and therefore the id, does not depend on declaration or resolution order.
//!
//! Options the recipe lists under `package_id.any` (for example the choice
//! of build-file generator) are left out: any value of them produces the
//! same binaries. Inapplicable options are absent from the document.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::options::{FinalizedConfiguration, OptionValue};
use crate::resolve::{ResolvedDependency, Scope};
use crate::util::hash::{Hashable, ObjectHash};

/// Identifier of a binary package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(ObjectHash);

impl PackageId {
  pub fn as_str(&self) -> &str {
    &self.0.0
  }
}

impl fmt::Display for PackageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The canonical input to a [`PackageId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDocument {
  pub settings: BTreeMap<String, String>,
  pub options: BTreeMap<String, OptionValue>,
  pub requires: BTreeMap<String, String>,
}

impl Hashable for IdentityDocument {}

impl IdentityDocument {
  pub fn new(config: &FinalizedConfiguration, deps: &[ResolvedDependency], any: &BTreeSet<String>) -> Self {
    let facts = config.facts();
    let mut settings = BTreeMap::from([
      ("os".to_string(), facts.os.as_str().to_string()),
      ("arch".to_string(), facts.arch.as_str().to_string()),
      ("build_type".to_string(), facts.build_type.as_str().to_string()),
      ("compiler".to_string(), facts.compiler.name.clone()),
    ]);
    let compiler_fields = [
      ("compiler.version", &facts.compiler.version),
      ("compiler.runtime", &facts.compiler.runtime),
      ("compiler.libcxx", &facts.compiler.libcxx),
    ];
    for (key, value) in compiler_fields {
      if let Some(value) = value {
        settings.insert(key.to_string(), value.clone());
      }
    }

    let options = config
      .slots()
      .iter()
      .filter(|(name, _)| !any.contains(name.as_str()))
      .filter_map(|(name, slot)| slot.value().map(|v| (name.clone(), v.clone())))
      .collect();

    let requires = deps
      .iter()
      .filter(|d| d.scope() == Scope::Link)
      .map(|d| (d.name().to_string(), d.version.to_string()))
      .collect();

    Self {
      settings,
      options,
      requires,
    }
  }

  pub fn package_id(&self) -> Result<PackageId, serde_json::Error> {
    self.compute_hash().map(PackageId)
  }
}

/// Compute the package id for a finalized configuration and its resolved
/// dependencies, ignoring the options named in `any`.
pub fn compute(
  config: &FinalizedConfiguration,
  deps: &[ResolvedDependency],
  any: &BTreeSet<String>,
) -> Result<PackageId, serde_json::Error> {
  let document = IdentityDocument::new(config, deps, any);
  let id = document.package_id()?;
  debug!(
    id = %id,
    options = document.options.len(),
    requires = document.requires.len(),
    "computed package id"
  );
  Ok(id)
}
