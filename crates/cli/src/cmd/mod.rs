mod create;
mod id;
mod info;
mod options;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

use kiln_lib::package::PackageRequest;
use kiln_lib::platform::PlatformFacts;
use kiln_lib::platform::paths;
use kiln_lib::recipe::Recipe;
use kiln_lib::resolve::Provenance;

pub use create::cmd_create;
pub use id::cmd_id;
pub use info::cmd_info;
pub use options::cmd_options;

/// Recipe location plus everything that selects one configuration of it.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
  /// Recipe file, or a directory containing recipe.toml
  #[arg(default_value = ".")]
  pub recipe: PathBuf,

  /// Option override, e.g. `-o shared=False`
  #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
  pub options: Vec<String>,

  /// Setting override, e.g. `-s build_type=Debug`
  #[arg(short = 's', long = "setting", value_name = "KEY=VALUE")]
  pub settings: Vec<String>,

  /// Profile file with a [settings] table (default: detect the host)
  #[arg(long)]
  pub profile: Option<PathBuf>,

  /// User the package is published under
  #[arg(long)]
  pub user: Option<String>,

  /// Channel the package is published under
  #[arg(long)]
  pub channel: Option<String>,
}

impl ConfigArgs {
  pub fn load_recipe(&self) -> Result<Recipe> {
    Recipe::load(&self.recipe).with_context(|| format!("Failed to load recipe: {}", self.recipe.display()))
  }

  pub fn facts(&self) -> Result<PlatformFacts> {
    let mut facts = match &self.profile {
      Some(profile) => PlatformFacts::from_profile(profile)?,
      None => PlatformFacts::detect()?,
    };
    for assignment in &self.settings {
      facts
        .apply_override(assignment)
        .with_context(|| format!("Invalid setting: {}", assignment))?;
    }
    Ok(facts)
  }

  pub fn overrides(&self) -> Result<BTreeMap<String, String>> {
    let mut overrides = BTreeMap::new();
    for assignment in &self.options {
      let Some((name, value)) = assignment.split_once('=') else {
        bail!("Invalid option '{}': expected NAME=VALUE", assignment);
      };
      overrides.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(overrides)
  }

  pub fn request(&self) -> Result<PackageRequest> {
    Ok(PackageRequest {
      facts: self.facts()?,
      overrides: self.overrides()?,
      provenance: Provenance::new(self.user.as_deref(), self.channel.as_deref()),
      store_root: paths::store_dir(),
    })
  }
}
