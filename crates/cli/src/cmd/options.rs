//! `kiln options`: finalize a recipe's options without resolving or building.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use kiln_lib::options::OptionSlot;

use super::ConfigArgs;
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_options(config: &ConfigArgs, output: OutputFormat) -> Result<()> {
  let recipe = config.load_recipe()?;
  let facts = config.facts()?;
  let finalized = recipe
    .option_model()
    .finalize(&config.overrides()?, &facts)
    .context("Invalid configuration")?;

  if output.is_json() {
    let options: BTreeMap<_, _> = finalized
      .slots()
      .iter()
      .map(|(name, slot)| (name.as_str(), slot.value()))
      .collect();
    print_json(&serde_json::json!({ "settings": finalized.facts(), "options": options }))?;
    return Ok(());
  }

  println!("{} for {} {}", recipe.name, facts.platform(), facts.build_type);
  for (name, slot) in finalized.slots() {
    match slot {
      OptionSlot::Value(value) => print_stat(name, &value.to_string()),
      OptionSlot::Inapplicable => print_stat(name, "n/a"),
    }
  }
  Ok(())
}
