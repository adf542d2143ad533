//! Post-processing of produced artifacts: code signing.
//!
//! When the recipe's signing option is applicable and enabled, every
//! dynamic library is signed once per digest in [`SIGNING_DIGESTS`]. The
//! signatures are additive, so each library ends up carrying both. Release
//! builds request a timestamp; other build types never do.
//!
//! A failed signature aborts post-processing. Libraries signed before the
//! failure keep their signatures; rerunning the package step re-signs from
//! a fresh install tree.

mod signtool;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::options::FinalizedConfiguration;

pub use signtool::{SignTool, TIMESTAMP_URL_ENV, timestamp_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
  Sha1,
  Sha256,
}

impl DigestAlgorithm {
  pub fn as_str(&self) -> &'static str {
    match self {
      DigestAlgorithm::Sha1 => "sha1",
      DigestAlgorithm::Sha256 => "sha256",
    }
  }
}

impl fmt::Display for DigestAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Digests applied to every signed library, in order.
pub const SIGNING_DIGESTS: [DigestAlgorithm; 2] = [DigestAlgorithm::Sha1, DigestAlgorithm::Sha256];

#[derive(Debug, Error)]
pub enum SignError {
  /// The signing utility exited unsuccessfully; `output` is what it printed.
  #[error("signing {path} with {digest} failed (exit code {}):\n{output}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
  Failed {
    path: PathBuf,
    digest: DigestAlgorithm,
    code: Option<i32>,
    output: String,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
}

/// The signing utility boundary.
pub trait Signer {
  fn sign(
    &self,
    path: &Path,
    digest: DigestAlgorithm,
    timestamp: bool,
  ) -> impl Future<Output = Result<(), SignError>> + Send;
}

/// Signs dynamic libraries when the configuration asks for it.
pub struct PostProcessor<'a, S: Signer> {
  signer: &'a S,
  signing_option: Option<String>,
}

impl<'a, S: Signer> PostProcessor<'a, S> {
  /// `signing_option` is the recipe's boolean signing toggle, if it has one.
  pub fn new(signer: &'a S, signing_option: Option<&str>) -> Self {
    Self {
      signer,
      signing_option: signing_option.map(str::to_string),
    }
  }

  /// Whether this configuration signs at all.
  pub fn enabled(&self, config: &FinalizedConfiguration) -> bool {
    self.signing_option.as_deref().is_some_and(|option| config.is_enabled(option))
  }

  /// Sign the dynamic libraries among `artifacts` and hand the set back.
  pub async fn run(
    &self,
    artifacts: Vec<Artifact>,
    config: &FinalizedConfiguration,
  ) -> Result<Vec<Artifact>, SignError> {
    if !self.enabled(config) {
      debug!("signing not enabled for this configuration");
      return Ok(artifacts);
    }

    let timestamp = config.facts().build_type.is_release();
    let mut signatures = 0;
    for artifact in artifacts.iter().filter(|a| a.kind.is_dynamic_library()) {
      for digest in SIGNING_DIGESTS {
        info!(path = %artifact.path.display(), digest = %digest, timestamp, "signing");
        self.signer.sign(&artifact.path, digest, timestamp).await?;
        signatures += 1;
      }
    }

    info!(signatures, "post-processing complete");
    Ok(artifacts)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::sync::Mutex;

  use crate::artifact::{ArtifactKind, Linkage};
  use crate::options::{ConfigureRule, Condition, OptionDecl, OptionModel, OptionValue};
  use crate::platform::PlatformFacts;
  use crate::platform::arch::Arch;
  use crate::platform::compiler::{BuildType, Compiler};
  use crate::platform::os::Os;

  #[derive(Default)]
  struct RecordingSigner {
    calls: Mutex<Vec<(PathBuf, DigestAlgorithm, bool)>>,
    fail_on: Option<PathBuf>,
  }

  impl Signer for RecordingSigner {
    async fn sign(&self, path: &Path, digest: DigestAlgorithm, timestamp: bool) -> Result<(), SignError> {
      if self.fail_on.as_deref() == Some(path) && digest == DigestAlgorithm::Sha256 {
        return Err(SignError::Failed {
          path: path.to_path_buf(),
          digest,
          code: Some(1),
          output: "SignTool Error: No certificates were found that met all the given criteria.".to_string(),
        });
      }
      self.calls.lock().unwrap().push((path.to_path_buf(), digest, timestamp));
      Ok(())
    }
  }

  fn config(os: Os, build_type: BuildType, shared: bool) -> FinalizedConfiguration {
    let model = OptionModel::new(
      vec![OptionDecl::boolean("dll_sign", true), OptionDecl::boolean("shared", true)],
      vec![ConfigureRule::Remove {
        option: "dll_sign".to_string(),
        unless: Condition {
          os: Some(Os::Windows),
          options: BTreeMap::from([("shared".to_string(), OptionValue::Bool(true))]),
          ..Default::default()
        },
      }],
    );
    let facts = PlatformFacts::new(os, Arch::X86_64, Compiler::default_for(os), build_type);
    let overrides = BTreeMap::from([("shared".to_string(), if shared { "True" } else { "False" }.to_string())]);
    model.finalize(&overrides, &facts).unwrap()
  }

  fn artifacts() -> Vec<Artifact> {
    vec![
      Artifact::new("/pkg/bin/gost.dll", ArtifactKind::Library(Linkage::Dynamic)),
      Artifact::new("/pkg/bin/gostsum.exe", ArtifactKind::Binary),
      Artifact::new("/pkg/lib/gost.lib", ArtifactKind::Library(Linkage::Static)),
      Artifact::new("/pkg/lib/engines/gost_legacy.dll", ArtifactKind::Library(Linkage::Dynamic)),
    ]
  }

  #[tokio::test]
  async fn release_signs_each_dll_twice_with_timestamp() {
    let signer = RecordingSigner::default();
    let processor = PostProcessor::new(&signer, Some("dll_sign"));
    let out = processor
      .run(artifacts(), &config(Os::Windows, BuildType::Release, true))
      .await
      .unwrap();

    assert_eq!(out, artifacts());
    let calls = signer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2 * 2);
    assert!(calls.iter().all(|(_, _, ts)| *ts));
    assert_eq!(
      calls.iter().filter(|(p, _, _)| p.ends_with("gost.dll")).map(|(_, d, _)| *d).collect::<Vec<_>>(),
      vec![DigestAlgorithm::Sha1, DigestAlgorithm::Sha256]
    );
  }

  #[tokio::test]
  async fn debug_builds_never_timestamp() {
    let signer = RecordingSigner::default();
    PostProcessor::new(&signer, Some("dll_sign"))
      .run(artifacts(), &config(Os::Windows, BuildType::Debug, true))
      .await
      .unwrap();
    let calls = signer.calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|(_, _, ts)| !*ts));
  }

  #[tokio::test]
  async fn inapplicable_option_skips_signing() {
    let signer = RecordingSigner::default();
    let processor = PostProcessor::new(&signer, Some("dll_sign"));
    for cfg in [
      config(Os::Linux, BuildType::Release, true),
      config(Os::Windows, BuildType::Release, false),
    ] {
      assert!(!processor.enabled(&cfg));
      processor.run(artifacts(), &cfg).await.unwrap();
    }
    assert!(signer.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn recipe_without_signing_section_never_signs() {
    let signer = RecordingSigner::default();
    PostProcessor::new(&signer, None)
      .run(artifacts(), &config(Os::Windows, BuildType::Release, true))
      .await
      .unwrap();
    assert!(signer.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn failure_aborts_without_rollback() {
    let signer = RecordingSigner {
      fail_on: Some(PathBuf::from("/pkg/bin/gost.dll")),
      ..Default::default()
    };
    let err = PostProcessor::new(&signer, Some("dll_sign"))
      .run(artifacts(), &config(Os::Windows, BuildType::Release, true))
      .await
      .unwrap_err();

    assert!(matches!(err, SignError::Failed { digest: DigestAlgorithm::Sha256, ref output, .. } if output.contains("No certificates")));
    // The sha1 signature made before the failure stays; later libraries are untouched.
    let calls = signer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, DigestAlgorithm::Sha1);
  }
}
