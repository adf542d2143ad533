use anyhow::{Context, Result};

use kiln_lib::package;
use kiln_lib::resolve::FsStore;

use super::ConfigArgs;
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_id(config: &ConfigArgs, output: OutputFormat) -> Result<()> {
  let recipe = config.load_recipe()?;
  let request = config.request()?;
  let plan = package::plan(&recipe, &request, &FsStore::new(&request.store_root))
    .context("Failed to configure package")?;
  let published = package::is_valid(&plan.package_dir);

  if output.is_json() {
    let requires: Vec<_> = plan.dependencies.iter().map(|d| d.reference()).collect();
    print_json(&serde_json::json!({
      "reference": plan.reference,
      "id": plan.id,
      "package_dir": plan.package_dir,
      "published": published,
      "requires": requires,
    }))?;
    return Ok(());
  }

  println!("{}", plan.id);
  print_stat("Reference", &plan.reference.to_string());
  print_stat("Package", &plan.package_dir.display().to_string());
  print_stat("Published", if published { "yes" } else { "no" });
  Ok(())
}
