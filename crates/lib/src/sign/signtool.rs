//! Windows `signtool.exe`.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use super::{DigestAlgorithm, SignError, Signer};
use crate::consts::DEFAULT_TIMESTAMP_URL;
use crate::resolve::{ResolvedDependency, Scope};

/// Overrides the RFC 3161 timestamp authority.
pub const TIMESTAMP_URL_ENV: &str = "KILN_TIMESTAMP_URL";

pub fn timestamp_url() -> String {
  std::env::var(TIMESTAMP_URL_ENV)
    .ok()
    .filter(|v| !v.is_empty())
    .unwrap_or_else(|| DEFAULT_TIMESTAMP_URL.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignTool {
  program: PathBuf,
  timestamp_url: String,
}

impl SignTool {
  pub fn new(program: impl Into<PathBuf>, timestamp_url: &str) -> Self {
    Self {
      program: program.into(),
      timestamp_url: timestamp_url.to_string(),
    }
  }

  /// Use `signtool.exe` from a build-scope dependency's `bin` directory
  /// when one ships it, otherwise whatever `signtool` is on `PATH`.
  pub fn locate(deps: &[ResolvedDependency]) -> Self {
    let bundled = deps
      .iter()
      .filter(|d| d.scope() == Scope::Build)
      .map(|d| d.location.join("bin").join("signtool.exe"))
      .find(|p| p.is_file());
    match bundled {
      Some(program) => {
        debug!(program = %program.display(), "using bundled signtool");
        Self::new(program, &timestamp_url())
      }
      None => Self::new("signtool", &timestamp_url()),
    }
  }

  pub fn program(&self) -> &Path {
    &self.program
  }

  /// Arguments for one signature. SHA-1 is the primary signature; SHA-256
  /// is appended as a nested signature (`/as`).
  pub fn sign_args(&self, path: &Path, digest: DigestAlgorithm, timestamp: bool) -> Vec<String> {
    let mut args = vec!["sign".to_string(), "/a".to_string()];
    if digest == DigestAlgorithm::Sha256 {
      args.push("/as".to_string());
    }
    args.push("/fd".to_string());
    args.push(digest.to_string());
    if timestamp {
      match digest {
        DigestAlgorithm::Sha1 => {
          args.push("/t".to_string());
          args.push(self.timestamp_url.clone());
        }
        DigestAlgorithm::Sha256 => {
          args.push("/tr".to_string());
          args.push(self.timestamp_url.clone());
          args.push("/td".to_string());
          args.push(digest.to_string());
        }
      }
    }
    args.push(path.display().to_string());
    args
  }
}

impl Signer for SignTool {
  async fn sign(&self, path: &Path, digest: DigestAlgorithm, timestamp: bool) -> Result<(), SignError> {
    let args = self.sign_args(path, digest, timestamp);
    debug!(program = %self.program.display(), args = ?args, "running signtool");

    let output = Command::new(&self.program)
      .args(&args)
      .output()
      .await
      .map_err(|source| SignError::Spawn {
        program: self.program.display().to_string(),
        source,
      })?;

    if !output.status.success() {
      let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
      combined.push_str(&String::from_utf8_lossy(&output.stderr));
      return Err(SignError::Failed {
        path: path.to_path_buf(),
        digest,
        code: output.status.code(),
        output: combined,
      });
    }
    Ok(())
  }
}
