//! The end-to-end package pipeline.
//!
//! Creating a package happens in two phases:
//!
//! 1. [`plan`] finalizes the recipe options against the platform facts,
//!    resolves requirements and computes the [`PackageId`]. It never
//!    builds and is cheap enough to answer "which package would this be".
//! 2. [`Packager::create`] reuses a valid published package or runs the
//!    build lifecycle, signs the produced libraries and publishes the
//!    install tree into the store.
//!
//! Publication writes the installed files first, then `kiln-package.json`,
//! then the completion marker. A package directory without a marker, or
//! whose contents no longer hash to what the marker recorded, is removed
//! and rebuilt.

mod info;
mod marker;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::build::{BuildDriver, BuildError, BuildSettings, BuildState, Toolchain};
use crate::identity::{self, PackageId};
use crate::options::{ConfigurationError, FinalizedConfiguration};
use crate::platform::PlatformFacts;
use crate::recipe::{BuildPolicy, PackageReference, Recipe, RecipeError};
use crate::resolve::{DependencyStore, Provenance, ResolveError, ResolvedDependency, Resolver};
use crate::sign::{PostProcessor, SignError, Signer};
use crate::util::fs::copy_dir_all;
use crate::util::hash::DirHashError;

pub use info::PackageInfo;
pub use marker::{PackageMarker, is_valid};

#[derive(Debug, Error)]
pub enum PackageError {
  #[error(transparent)]
  Recipe(#[from] RecipeError),

  #[error(transparent)]
  Configuration(#[from] ConfigurationError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Sign(#[from] SignError),

  #[error("failed to hash package: {0}")]
  Hash(#[from] DirHashError),

  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("failed to publish {path}: {source}")]
  Publish {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid completion marker {path}: {message}")]
  InvalidMarker { path: PathBuf, message: String },

  #[error("invalid package info {path}: {message}")]
  InvalidInfo { path: PathBuf, message: String },
}

/// Everything needed to identify a package.
#[derive(Debug, Clone)]
pub struct PackageRequest {
  pub facts: PlatformFacts,
  /// Raw `name=value` option overrides.
  pub overrides: BTreeMap<String, String>,
  pub provenance: Provenance,
  pub store_root: PathBuf,
}

/// A package that has been identified but not necessarily built.
#[derive(Debug, Clone)]
pub struct PackagePlan {
  pub reference: PackageReference,
  pub config: FinalizedConfiguration,
  pub dependencies: Vec<ResolvedDependency>,
  pub id: PackageId,
  pub package_dir: PathBuf,
}

/// Finalize, resolve and identify.
pub fn plan<S: DependencyStore>(
  recipe: &Recipe,
  request: &PackageRequest,
  store: &S,
) -> Result<PackagePlan, PackageError> {
  let config = recipe.option_model().finalize(&request.overrides, &request.facts)?;

  let specs = recipe.dependency_specs()?;
  let dependencies = Resolver::new(store, &request.provenance).resolve(&specs, &config)?;

  let id = identity::compute(&config, &dependencies, &recipe.package_id.any)?;
  let reference = recipe.reference(&request.provenance);
  let package_dir = reference.package_dir(&request.store_root, &id);
  info!(reference = %reference, id = %id, "package identified");

  Ok(PackagePlan {
    reference,
    config,
    dependencies,
    id,
    package_dir,
  })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
  /// Built and published by this run.
  Built {
    info: PackageInfo,
    dir: PathBuf,
    /// Lifecycle states the build went through.
    states: Vec<BuildState>,
  },
  /// A valid package was already published.
  Cached { info: PackageInfo, dir: PathBuf },
}

impl PackageOutcome {
  pub fn info(&self) -> &PackageInfo {
    match self {
      PackageOutcome::Built { info, .. } | PackageOutcome::Cached { info, .. } => info,
    }
  }

  pub fn dir(&self) -> &Path {
    match self {
      PackageOutcome::Built { dir, .. } | PackageOutcome::Cached { dir, .. } => dir,
    }
  }

  pub fn is_cached(&self) -> bool {
    matches!(self, PackageOutcome::Cached { .. })
  }
}

/// Builds and publishes planned packages.
pub struct Packager<'a, T: Toolchain, G: Signer> {
  toolchain: &'a T,
  signer: &'a G,
  build_root: PathBuf,
  policy: BuildPolicy,
}

impl<'a, T: Toolchain, G: Signer> Packager<'a, T, G> {
  pub fn new(toolchain: &'a T, signer: &'a G, build_root: impl Into<PathBuf>) -> Self {
    Self {
      toolchain,
      signer,
      build_root: build_root.into(),
      policy: BuildPolicy::default(),
    }
  }

  pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub async fn create(&self, recipe: &Recipe, plan: &PackagePlan) -> Result<PackageOutcome, PackageError> {
    let dir = &plan.package_dir;

    if self.policy == BuildPolicy::Missing
      && let Some(info) = cached_info(dir)
    {
      info!(reference = %plan.reference, id = %plan.id, "package already published");
      return Ok(PackageOutcome::Cached {
        info,
        dir: dir.clone(),
      });
    }

    let output = BuildDriver::new(self.toolchain, &self.build_root, BuildSettings::from(recipe))
      .build(
        &recipe.source_dir(),
        &recipe.patch_paths(),
        &plan.config,
        &plan.dependencies,
      )
      .await?;

    PostProcessor::new(self.signer, recipe.signing_option())
      .run(output.artifacts.clone(), &plan.config)
      .await?;

    remove_package(dir)?;
    let copied = copy_dir_all(&output.install_dir(), dir).map_err(|source| PackageError::Publish {
      path: dir.clone(),
      source,
    })?;
    let info = PackageInfo::describe(plan, dir);
    info.write(dir)?;
    marker::write_marker(dir)?;
    info!(
      reference = %plan.reference,
      id = %plan.id,
      files = copied,
      libs = ?info.libs,
      "package published"
    );

    Ok(PackageOutcome::Built {
      info,
      dir: dir.clone(),
      states: output.states,
    })
  }
}

/// The published package's info, if the directory holds a valid package.
/// Anything else found there is removed.
fn cached_info(dir: &Path) -> Option<PackageInfo> {
  if !dir.exists() {
    return None;
  }
  if marker::is_valid(dir) {
    match PackageInfo::read(dir) {
      Ok(info) => return Some(info),
      Err(e) => warn!(path = ?dir, error = %e, "unreadable package info, will rebuild"),
    }
  }
  if let Err(e) = remove_package(dir) {
    warn!(path = ?dir, error = %e, "failed to remove stale package");
  }
  None
}

fn remove_package(dir: &Path) -> Result<(), PackageError> {
  if dir.exists() {
    std::fs::remove_dir_all(dir).map_err(|source| PackageError::Publish {
      path: dir.to_path_buf(),
      source,
    })?;
  }
  Ok(())
}

/// Info of a package published at `dir`, if it is complete and intact.
pub fn published(dir: &Path) -> Result<Option<PackageInfo>, PackageError> {
  if !is_valid(dir) {
    return Ok(None);
  }
  PackageInfo::read(dir).map(Some)
}
