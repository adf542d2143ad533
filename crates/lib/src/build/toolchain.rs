//! The external toolchain boundary.
//!
//! [`Toolchain`] is what the lifecycle driver talks to; [`CMake`] drives the
//! real `cmake` executable. Each step captures the process output and fails
//! with [`BuildError::ToolFailed`] on a non-zero exit, carrying that output
//! unmodified.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use super::types::{BuildError, Generator, ToolStep};
use crate::platform::compiler::BuildType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureRequest {
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub install_dir: PathBuf,
  /// Already mapped with [`toolchain_build_type`](super::toolchain_build_type).
  pub build_type: BuildType,
  /// `None` selects the toolchain default.
  pub generator: Option<Generator>,
  /// Install locations of link-scope dependencies.
  pub prefix_path: Vec<PathBuf>,
  /// Cache variables, `-DNAME=VALUE`.
  pub definitions: BTreeMap<String, String>,
  pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
  pub build_dir: PathBuf,
  pub build_type: BuildType,
  pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
  pub build_dir: PathBuf,
  pub install_dir: PathBuf,
  pub build_type: BuildType,
  pub env: BTreeMap<String, String>,
}

/// Captured output of a successful step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  pub output: String,
}

pub trait Toolchain {
  fn configure(&self, request: &ConfigureRequest) -> impl Future<Output = Result<ToolOutput, BuildError>> + Send;

  fn build(&self, request: &BuildRequest) -> impl Future<Output = Result<ToolOutput, BuildError>> + Send;

  fn install(&self, request: &InstallRequest) -> impl Future<Output = Result<ToolOutput, BuildError>> + Send;
}

/// CMake driven through its command line.
#[derive(Debug, Clone)]
pub struct CMake {
  program: PathBuf,
  verbose: bool,
}

impl Default for CMake {
  fn default() -> Self {
    Self {
      program: PathBuf::from("cmake"),
      verbose: false,
    }
  }
}

impl CMake {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
    self.program = program.into();
    self
  }

  pub fn with_verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }

  pub fn configure_args(&self, request: &ConfigureRequest) -> Vec<String> {
    let mut args = vec![
      "-S".to_string(),
      request.source_dir.display().to_string(),
      "-B".to_string(),
      request.build_dir.display().to_string(),
    ];
    if let Some(generator) = request.generator {
      args.push("-G".to_string());
      args.push(generator.to_string());
    }
    args.push(format!("-DCMAKE_BUILD_TYPE={}", request.build_type));
    args.push(format!("-DCMAKE_INSTALL_PREFIX={}", request.install_dir.display()));
    if !request.prefix_path.is_empty() {
      let joined = request
        .prefix_path
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(";");
      args.push(format!("-DCMAKE_PREFIX_PATH={}", joined));
    }
    if self.verbose {
      args.push("-DCMAKE_VERBOSE_MAKEFILE=ON".to_string());
    }
    for (name, value) in &request.definitions {
      args.push(format!("-D{}={}", name, value));
    }
    args
  }

  pub fn build_args(&self, request: &BuildRequest) -> Vec<String> {
    vec![
      "--build".to_string(),
      request.build_dir.display().to_string(),
      "--config".to_string(),
      request.build_type.to_string(),
    ]
  }

  pub fn install_args(&self, request: &InstallRequest) -> Vec<String> {
    vec![
      "--install".to_string(),
      request.build_dir.display().to_string(),
      "--config".to_string(),
      request.build_type.to_string(),
      "--prefix".to_string(),
      request.install_dir.display().to_string(),
    ]
  }
}

impl Toolchain for CMake {
  async fn configure(&self, request: &ConfigureRequest) -> Result<ToolOutput, BuildError> {
    let args = self.configure_args(request);
    run_tool(ToolStep::Configure, &self.program, &args, &request.build_dir, &request.env).await
  }

  async fn build(&self, request: &BuildRequest) -> Result<ToolOutput, BuildError> {
    let args = self.build_args(request);
    run_tool(ToolStep::Build, &self.program, &args, &request.build_dir, &request.env).await
  }

  async fn install(&self, request: &InstallRequest) -> Result<ToolOutput, BuildError> {
    let args = self.install_args(request);
    run_tool(ToolStep::Install, &self.program, &args, &request.build_dir, &request.env).await
  }
}

/// Run one toolchain process, capturing stdout and stderr.
pub async fn run_tool(
  step: ToolStep,
  program: &Path,
  args: &[String],
  cwd: &Path,
  env: &BTreeMap<String, String>,
) -> Result<ToolOutput, BuildError> {
  info!(step = %step, program = %program.display(), "running toolchain step");
  debug!(args = ?args, cwd = ?cwd, "spawning process");

  let mut command = Command::new(program);
  command.args(args).current_dir(cwd).kill_on_drop(true);
  for (key, value) in env {
    command.env(key, value);
  }

  let output = command.output().await.map_err(|source| BuildError::Spawn {
    program: program.display().to_string(),
    source,
  })?;

  let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
  combined.push_str(&String::from_utf8_lossy(&output.stderr));

  if !output.status.success() {
    debug!(output = %combined, "toolchain output");
    return Err(BuildError::ToolFailed {
      step,
      code: output.status.code(),
      output: combined,
    });
  }

  if !combined.is_empty() {
    debug!(output = %combined.trim_end(), "toolchain output");
  }
  Ok(ToolOutput { output: combined })
}
