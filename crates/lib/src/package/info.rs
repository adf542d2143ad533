use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{PackageError, PackagePlan};
use crate::artifact;
use crate::consts::PACKAGE_INFO_FILE;
use crate::identity::{IdentityDocument, PackageId};
use crate::options::OptionValue;
use crate::recipe::PackageReference;
use crate::resolve::Scope;

/// `kiln-package.json`: what a consumer needs to know about a published
/// package without reading its recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
  pub name: String,
  pub version: String,
  pub reference: PackageReference,
  pub id: PackageId,
  pub settings: BTreeMap<String, String>,
  /// Every applicable option, including ones that do not affect the id.
  pub options: BTreeMap<String, OptionValue>,
  pub requires: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub build_requires: Vec<String>,
  /// Library names to link against.
  pub libs: Vec<String>,
}

impl PackageInfo {
  pub(crate) fn describe(plan: &PackagePlan, package_dir: &Path) -> Self {
    let config = &plan.config;
    let settings = IdentityDocument::new(config, &plan.dependencies, &Default::default()).settings;
    let options = config
      .slots()
      .iter()
      .filter_map(|(name, slot)| slot.value().map(|v| (name.clone(), v.clone())))
      .collect();
    let refs = |scope: Scope| {
      plan
        .dependencies
        .iter()
        .filter(|d| d.scope() == scope)
        .map(|d| d.reference())
        .collect::<Vec<_>>()
    };

    Self {
      name: plan.reference.name.clone(),
      version: plan.reference.version.to_string(),
      reference: plan.reference.clone(),
      id: plan.id.clone(),
      settings,
      options,
      requires: refs(Scope::Link),
      build_requires: refs(Scope::Build),
      libs: artifact::collect_libs(package_dir, config.facts().os),
    }
  }

  pub fn write(&self, package_dir: &Path) -> Result<(), PackageError> {
    let path = package_dir.join(PACKAGE_INFO_FILE);
    let content = serde_json::to_string_pretty(self)?;
    std::fs::write(&path, format!("{}\n", content)).map_err(|source| PackageError::Publish { path, source })
  }

  pub fn read(package_dir: &Path) -> Result<Self, PackageError> {
    let path = package_dir.join(PACKAGE_INFO_FILE);
    let content = std::fs::read_to_string(&path).map_err(|source| PackageError::Publish {
      path: path.clone(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|e| PackageError::InvalidInfo {
      path,
      message: e.to_string(),
    })
  }
}
