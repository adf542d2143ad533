//! Recipe manifests.
//!
//! A recipe is a `recipe.toml` next to the package sources:
//!
//! ```toml
//! name = "openssl-gost-engine"
//! version = "1.1.0.4-beta1"
//! source = "src"
//! patches = ["patches/openssl-gost-engine.patch"]
//!
//! [options.shared]
//! values = [true, false]
//! default = true
//!
//! [[requires]]
//! reference = "openssl/1.1.0l+2@odant/stable"
//!
//! [[build_requires]]
//! reference = "ninja_installer/1.9.0@bincrafters/stable"
//! when = "ninja"
//!
//! [package_id]
//! any = ["ninja"]
//! ```
//!
//! Loading validates that every option the recipe refers to is declared and
//! that the source tree and patch files exist.

mod reference;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::options::{ConfigurationError, ConfigureRule, OptionDecl, OptionDomain, OptionModel, OptionValue};
use crate::resolve::{DependencySpec, Provenance, ReferenceError, Scope, Version};

pub use reference::PackageReference;

pub const RECIPE_FILE: &str = "recipe.toml";

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("failed to read recipe {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse recipe {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid requirement: {0}")]
  Reference(#[from] ReferenceError),

  #[error("invalid options: {0}")]
  Options(#[from] ConfigurationError),

  #[error("{context} refers to undeclared option '{option}'")]
  UndeclaredOption { context: String, option: String },

  #[error("{context} option '{option}' must be boolean")]
  NotBoolean { context: String, option: String },

  #[error("{kind} not found: {path}")]
  MissingFile { kind: &'static str, path: PathBuf },

  #[error("invalid import pattern '{pattern}': {source}")]
  ImportPattern {
    pattern: String,
    #[source]
    source: glob::PatternError,
  },
}

/// When the package pipeline builds instead of reusing a published package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPolicy {
  /// Build only if no valid package exists for the id.
  #[default]
  Missing,
  /// Always rebuild, replacing any published package.
  Always,
}

impl fmt::Display for BuildPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildPolicy::Missing => f.write_str("missing"),
      BuildPolicy::Always => f.write_str("always"),
    }
  }
}

impl FromStr for BuildPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "missing" => Ok(BuildPolicy::Missing),
      "always" => Ok(BuildPolicy::Always),
      other => Err(format!("unknown build policy '{}' (expected missing or always)", other)),
    }
  }
}

/// `[options.<name>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
  pub values: OptionDomain,
  pub default: OptionValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
  pub reference: String,
  /// Boolean option gating this requirement.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub when: Option<String>,
}

/// `[package_id]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdPolicy {
  /// Options whose value never affects the produced binaries.
  #[serde(default)]
  pub any: BTreeSet<String>,
}

/// `[build]`: how options reach the toolchain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSection {
  /// Boolean option selecting the Ninja generator.
  #[serde(default)]
  pub generator_option: Option<String>,
  /// Option name to CMake cache variable, e.g. `shared = "BUILD_SHARED_LIBS"`.
  #[serde(default)]
  pub definitions: BTreeMap<String, String>,
  /// Fixed CMake cache variables.
  #[serde(default)]
  pub variables: BTreeMap<String, String>,
}

/// `[signing]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningSection {
  /// Boolean option enabling signing of dynamic libraries.
  pub option: String,
}

/// `[[imports]]`: copy files from dependencies into the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRule {
  pub pattern: String,
  /// Directory inside each dependency.
  pub from: String,
  /// Directory inside the working tree.
  pub to: String,
}

impl ImportRule {
  /// The compiled file name pattern.
  pub fn matcher(&self) -> Result<glob::Pattern, glob::PatternError> {
    glob::Pattern::new(&self.pattern)
  }

  /// Whether a file name matches. Case-insensitive, since imported files
  /// are usually Windows DLLs.
  pub fn matches(pattern: &glob::Pattern, name: &str) -> bool {
    pattern.matches_with(
      name,
      glob::MatchOptions {
        case_sensitive: false,
        ..Default::default()
      },
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
  pub name: String,
  pub version: Version,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub license: Option<String>,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default = "default_source")]
  pub source: PathBuf,
  #[serde(default)]
  pub build_policy: BuildPolicy,
  #[serde(default)]
  pub patches: Vec<PathBuf>,
  #[serde(default)]
  pub options: BTreeMap<String, OptionSpec>,
  #[serde(default)]
  pub configure: Vec<ConfigureRule>,
  #[serde(default)]
  pub requires: Vec<Requirement>,
  #[serde(default)]
  pub build_requires: Vec<Requirement>,
  #[serde(default)]
  pub package_id: PackageIdPolicy,
  #[serde(default)]
  pub build: BuildSection,
  #[serde(default)]
  pub signing: Option<SigningSection>,
  #[serde(default)]
  pub imports: Vec<ImportRule>,

  /// Directory containing the manifest; relative paths resolve against it.
  #[serde(skip)]
  root: PathBuf,
}

fn default_source() -> PathBuf {
  PathBuf::from("src")
}

impl Recipe {
  /// Load `recipe.toml` from a file or from a directory containing one.
  pub fn load(path: &Path) -> Result<Self, RecipeError> {
    let file = if path.is_dir() { path.join(RECIPE_FILE) } else { path.to_path_buf() };
    let content = std::fs::read_to_string(&file).map_err(|source| RecipeError::Read {
      path: file.clone(),
      source,
    })?;
    let file = dunce::canonicalize(&file).unwrap_or(file);
    let root = file.parent().map(Path::to_path_buf).unwrap_or_default();
    let recipe = Self::parse(&content, &file, root)?;
    recipe.check_files()?;
    debug!(recipe = %recipe.name, version = %recipe.version, path = %file.display(), "loaded recipe");
    Ok(recipe)
  }

  /// Parse and validate manifest text. Does not touch the filesystem.
  pub fn parse(content: &str, path: &Path, root: PathBuf) -> Result<Self, RecipeError> {
    let mut recipe: Recipe = toml::from_str(content).map_err(|source| RecipeError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    recipe.root = root;
    recipe.validate()?;
    Ok(recipe)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn source_dir(&self) -> PathBuf {
    self.root.join(&self.source)
  }

  /// Patch files in application order.
  pub fn patch_paths(&self) -> Vec<PathBuf> {
    self.patches.iter().map(|p| self.root.join(p)).collect()
  }

  pub fn option_model(&self) -> OptionModel {
    let declarations = self
      .options
      .iter()
      .map(|(name, spec)| OptionDecl {
        name: name.clone(),
        domain: spec.values.clone(),
        default: spec.default.clone(),
      })
      .collect();
    OptionModel::new(declarations, self.configure.clone())
  }

  /// Link-scope requirements followed by build-scope ones.
  pub fn dependency_specs(&self) -> Result<Vec<DependencySpec>, RecipeError> {
    let scoped = self
      .requires
      .iter()
      .map(|r| (r, Scope::Link))
      .chain(self.build_requires.iter().map(|r| (r, Scope::Build)));

    let mut specs = Vec::new();
    for (req, scope) in scoped {
      let mut spec = DependencySpec::parse(&req.reference, scope)?;
      if let Some(option) = &req.when {
        spec = spec.when(option);
      }
      specs.push(spec);
    }
    Ok(specs)
  }

  /// The reference this recipe publishes under for a given provenance.
  /// Missing parts fall back to `_`.
  pub fn reference(&self, provenance: &Provenance) -> PackageReference {
    PackageReference::new(
      &self.name,
      self.version.clone(),
      provenance.user.as_deref().unwrap_or("_"),
      provenance.channel.as_deref().unwrap_or("_"),
    )
  }

  pub fn signing_option(&self) -> Option<&str> {
    self.signing.as_ref().map(|s| s.option.as_str())
  }

  fn validate(&self) -> Result<(), RecipeError> {
    self.option_model().validate()?;
    self.dependency_specs()?;

    let mut boolean_refs: Vec<(String, &str)> = Vec::new();
    for req in self.requires.iter().chain(&self.build_requires) {
      if let Some(option) = &req.when {
        boolean_refs.push((format!("requirement '{}'", req.reference), option.as_str()));
      }
    }
    if let Some(option) = &self.build.generator_option {
      boolean_refs.push(("build.generator_option".to_string(), option.as_str()));
    }
    if let Some(signing) = &self.signing {
      boolean_refs.push(("signing.option".to_string(), signing.option.as_str()));
    }

    for (context, option) in boolean_refs {
      match self.options.get(option) {
        None => {
          return Err(RecipeError::UndeclaredOption {
            context,
            option: option.to_string(),
          });
        }
        Some(spec) if spec.values != OptionDomain::Bool => {
          return Err(RecipeError::NotBoolean {
            context,
            option: option.to_string(),
          });
        }
        Some(_) => {}
      }
    }

    for rule in &self.imports {
      rule.matcher().map_err(|source| RecipeError::ImportPattern {
        pattern: rule.pattern.clone(),
        source,
      })?;
    }

    let other_refs = self
      .package_id
      .any
      .iter()
      .map(|o| ("package_id.any", o))
      .chain(self.build.definitions.keys().map(|o| ("build.definitions", o)));
    for (context, option) in other_refs {
      if !self.options.contains_key(option) {
        return Err(RecipeError::UndeclaredOption {
          context: context.to_string(),
          option: option.clone(),
        });
      }
    }

    Ok(())
  }

  fn check_files(&self) -> Result<(), RecipeError> {
    let source = self.source_dir();
    if !source.is_dir() {
      return Err(RecipeError::MissingFile {
        kind: "source directory",
        path: source,
      });
    }
    for patch in self.patch_paths() {
      if !patch.is_file() {
        return Err(RecipeError::MissingFile {
          kind: "patch",
          path: patch,
        });
      }
    }
    Ok(())
  }
}
