//! The build lifecycle: patch, configure, compile, install.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use super::patch;
use super::toolchain::{BuildRequest, ConfigureRequest, InstallRequest, Toolchain};
use super::types::{BuildError, BuildState, Generator, toolchain_build_type};
use crate::artifact::{self, Artifact};
use crate::options::{FinalizedConfiguration, OptionValue};
use crate::recipe::{ImportRule, Recipe};
use crate::resolve::{ResolvedDependency, Scope};
use crate::util::fs::copy_dir_all;

/// How recipe options reach the toolchain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSettings {
  /// Boolean option that selects the Ninja generator.
  pub generator_option: Option<String>,
  /// Option name to cache variable.
  pub definitions: BTreeMap<String, String>,
  /// Fixed cache variables.
  pub variables: BTreeMap<String, String>,
  pub imports: Vec<ImportRule>,
}

impl From<&Recipe> for BuildSettings {
  fn from(recipe: &Recipe) -> Self {
    Self {
      generator_option: recipe.build.generator_option.clone(),
      definitions: recipe.build.definitions.clone(),
      variables: recipe.build.variables.clone(),
      imports: recipe.imports.clone(),
    }
  }
}

impl BuildSettings {
  pub fn generator(&self, config: &FinalizedConfiguration) -> Option<Generator> {
    self
      .generator_option
      .as_deref()
      .filter(|option| config.is_enabled(option))
      .map(|_| Generator::Ninja)
  }

  /// Fixed variables plus one entry per applicable mapped option.
  pub fn cache_variables(&self, config: &FinalizedConfiguration) -> BTreeMap<String, String> {
    let mut vars = self.variables.clone();
    for (option, variable) in &self.definitions {
      match config.get_safe(option) {
        Some(OptionValue::Bool(true)) => vars.insert(variable.clone(), "ON".to_string()),
        Some(OptionValue::Bool(false)) => vars.insert(variable.clone(), "OFF".to_string()),
        Some(OptionValue::Text(text)) => vars.insert(variable.clone(), text.clone()),
        None => None,
      };
    }
    vars
  }
}

/// The isolated directory a build runs in. Removed when dropped.
#[derive(Debug)]
pub struct Workspace {
  dir: TempDir,
}

impl Workspace {
  pub fn create(build_root: &Path) -> Result<Self, BuildError> {
    std::fs::create_dir_all(build_root).map_err(|source| BuildError::Workspace {
      path: build_root.to_path_buf(),
      source,
    })?;
    let dir = tempfile::Builder::new()
      .prefix("kiln-")
      .tempdir_in(build_root)
      .map_err(|source| BuildError::Workspace {
        path: build_root.to_path_buf(),
        source,
      })?;
    Ok(Self { dir })
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  pub fn source_dir(&self) -> PathBuf {
    self.path().join("src")
  }

  pub fn build_dir(&self) -> PathBuf {
    self.path().join("build")
  }

  pub fn install_dir(&self) -> PathBuf {
    self.path().join("install")
  }
}

/// A successful build. The install tree lives as long as this value.
#[derive(Debug)]
pub struct BuildOutput {
  pub workspace: Workspace,
  pub artifacts: Vec<Artifact>,
  /// Every state the build passed through, in order.
  pub states: Vec<BuildState>,
}

impl BuildOutput {
  pub fn install_dir(&self) -> PathBuf {
    self.workspace.install_dir()
  }
}

/// Drives one build through its lifecycle.
pub struct BuildDriver<'a, T: Toolchain> {
  toolchain: &'a T,
  build_root: PathBuf,
  settings: BuildSettings,
  states: Vec<BuildState>,
}

impl<'a, T: Toolchain> BuildDriver<'a, T> {
  pub fn new(toolchain: &'a T, build_root: impl Into<PathBuf>, settings: BuildSettings) -> Self {
    Self {
      toolchain,
      build_root: build_root.into(),
      settings,
      states: vec![BuildState::Unpatched],
    }
  }

  pub fn state(&self) -> BuildState {
    self.states.last().copied().unwrap_or(BuildState::Unpatched)
  }

  fn advance(&mut self, to: BuildState) -> Result<(), BuildError> {
    let from = self.state();
    if from.next() != Some(to) {
      return Err(BuildError::InvalidTransition { from, to });
    }
    info!(from = %from, to = %to, "build state transition");
    self.states.push(to);
    Ok(())
  }

  /// Build `source` with `patches` applied, for `config`, against `deps`.
  ///
  /// The pristine source is never modified. Any failure aborts the build
  /// and removes its workspace.
  pub async fn build(
    mut self,
    source: &Path,
    patches: &[PathBuf],
    config: &FinalizedConfiguration,
    deps: &[ResolvedDependency],
  ) -> Result<BuildOutput, BuildError> {
    if self.state() != BuildState::Unpatched {
      return Err(BuildError::InvalidTransition {
        from: self.state(),
        to: BuildState::Patched,
      });
    }

    let workspace = Workspace::create(&self.build_root)?;
    info!(workspace = %workspace.path().display(), "starting build");

    let src = workspace.source_dir();
    let copied = copy_dir_all(source, &src).map_err(|source_err| BuildError::Workspace {
      path: source.to_path_buf(),
      source: source_err,
    })?;
    debug!(files = copied, "copied pristine source");

    patch::apply_all(&src, patches)?;
    self.advance(BuildState::Patched)?;

    let build_dir = workspace.build_dir();
    let install_dir = workspace.install_dir();
    std::fs::create_dir_all(&build_dir)?;
    std::fs::create_dir_all(&install_dir)?;

    let imported = import_files(&self.settings.imports, deps, &build_dir)?;
    if imported > 0 {
      debug!(files = imported, "imported dependency files");
    }

    let facts = config.facts();
    let build_type = toolchain_build_type(facts.build_type);
    let env = tool_env(deps)?;

    let configure = ConfigureRequest {
      source_dir: src,
      build_dir: build_dir.clone(),
      install_dir: install_dir.clone(),
      build_type,
      generator: self.settings.generator(config),
      prefix_path: deps
        .iter()
        .filter(|d| d.scope() == Scope::Link)
        .map(|d| d.location.clone())
        .collect(),
      definitions: self.settings.cache_variables(config),
      env: env.clone(),
    };
    info!(
      build_type = %build_type,
      generator = configure.generator.map(|g| g.as_str()).unwrap_or("default"),
      "configuring"
    );
    self.toolchain.configure(&configure).await?;
    self.advance(BuildState::Configured)?;

    let build = BuildRequest {
      build_dir: build_dir.clone(),
      build_type,
      env: env.clone(),
    };
    self.toolchain.build(&build).await?;
    self.advance(BuildState::Compiled)?;

    let install = InstallRequest {
      build_dir,
      install_dir: install_dir.clone(),
      build_type,
      env,
    };
    self.toolchain.install(&install).await?;
    self.advance(BuildState::Installed)?;

    let artifacts = artifact::collect(&install_dir, facts.os);
    info!(artifacts = artifacts.len(), "build installed");

    Ok(BuildOutput {
      workspace,
      artifacts,
      states: self.states,
    })
  }
}

/// Copy files matching each import rule out of every dependency.
fn import_files(rules: &[ImportRule], deps: &[ResolvedDependency], dest_root: &Path) -> Result<usize, BuildError> {
  let mut count = 0;
  for rule in rules {
    let pattern = rule.matcher().map_err(|source| BuildError::ImportPattern {
      pattern: rule.pattern.clone(),
      source,
    })?;
    let dest = dest_root.join(&rule.to);
    for dep in deps {
      let from = dep.location.join(&rule.from);
      let Ok(entries) = std::fs::read_dir(&from) else {
        continue;
      };
      for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if !entry.file_type()?.is_file() || !ImportRule::matches(&pattern, &name.to_string_lossy()) {
          continue;
        }
        std::fs::create_dir_all(&dest)?;
        std::fs::copy(entry.path(), dest.join(&name))?;
        debug!(dependency = dep.name(), file = %name.to_string_lossy(), "imported");
        count += 1;
      }
    }
  }
  Ok(count)
}

/// Environment for toolchain processes: build-scope tools' `bin`
/// directories ahead of the inherited `PATH`.
fn tool_env(deps: &[ResolvedDependency]) -> Result<BTreeMap<String, String>, BuildError> {
  let tool_bins: Vec<PathBuf> = deps
    .iter()
    .filter(|d| d.scope() == Scope::Build)
    .map(|d| d.location.join("bin"))
    .collect();
  if tool_bins.is_empty() {
    return Ok(BTreeMap::new());
  }

  let inherited = std::env::var_os("PATH").unwrap_or_default();
  let paths: Vec<OsString> = tool_bins
    .into_iter()
    .map(PathBuf::into_os_string)
    .chain(std::env::split_paths(&inherited).map(PathBuf::into_os_string))
    .collect();
  let joined = std::env::join_paths(paths)
    .map_err(|e| BuildError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
  Ok(BTreeMap::from([("PATH".to_string(), joined.to_string_lossy().into_owned())]))
}
