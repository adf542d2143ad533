//! Implementation of the `kiln create` command.
//!
//! Loads a recipe, identifies the package for the selected configuration and
//! either reuses the published package or builds, signs and publishes it.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use kiln_lib::build::CMake;
use kiln_lib::package::{self, PackageOutcome, Packager};
use kiln_lib::platform::paths;
use kiln_lib::recipe::BuildPolicy;
use kiln_lib::resolve::FsStore;
use kiln_lib::sign::SignTool;

use super::ConfigArgs;
use crate::output::{dir_size, format_bytes, format_duration, print_info, print_stat, print_success, ARROW};

pub fn cmd_create(config: &ConfigArgs, build: Option<BuildPolicy>, verbose: bool) -> Result<()> {
  let recipe = config.load_recipe()?;
  let request = config.request()?;
  let store = FsStore::new(&request.store_root);
  let plan = package::plan(&recipe, &request, &store).context("Failed to configure package")?;

  let policy = build.unwrap_or(recipe.build_policy);
  print_info(&format!(
    "{} {} {} ({})",
    plan.reference,
    ARROW,
    plan.id,
    plan.config.summary()
  ));

  let toolchain = CMake::new()
    .with_program(paths::cmake_program())
    .with_verbose(verbose);
  let signer = SignTool::locate(&plan.dependencies);
  let build_root = paths::build_root();
  info!(policy = %policy, build_root = %build_root.display(), "creating package");

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(
      Packager::new(&toolchain, &signer, &build_root)
        .with_policy(policy)
        .create(&recipe, &plan),
    )
    .with_context(|| format!("Failed to create {}", plan.reference))?;

  match &outcome {
    PackageOutcome::Built { .. } => print_success(&format!(
      "Built {} in {}",
      plan.reference,
      format_duration(started.elapsed())
    )),
    PackageOutcome::Cached { .. } => print_success(&format!("{} is up to date", plan.reference)),
  }
  print_stat("Package", &outcome.dir().display().to_string());
  let libs = &outcome.info().libs;
  if !libs.is_empty() {
    print_stat("Libs", &libs.join(", "));
  }
  print_stat("Size", &format_bytes(dir_size(outcome.dir())));

  Ok(())
}
