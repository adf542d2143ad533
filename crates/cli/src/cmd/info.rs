use std::path::Path;

use anyhow::{Result, bail};

use kiln_lib::package;
use kiln_lib::platform::{PlatformFacts, paths};
use kiln_lib::sign::timestamp_url;

use crate::output::{OutputFormat, print_json, print_stat, print_warning};

pub fn cmd_info(package: Option<&Path>, output: OutputFormat) -> Result<()> {
  match package {
    Some(dir) => package_info(dir, output),
    None => host_info(output),
  }
}

fn package_info(dir: &Path, output: OutputFormat) -> Result<()> {
  let Some(info) = package::published(dir)? else {
    bail!("No complete package at {}", dir.display());
  };

  if output.is_json() {
    return print_json(&info);
  }

  println!("{}", info.reference);
  print_stat("Id", info.id.as_str());
  for (key, value) in &info.settings {
    print_stat(key, value);
  }
  for (name, value) in &info.options {
    print_stat(&format!("options.{}", name), &value.to_string());
  }
  if !info.requires.is_empty() {
    print_stat("Requires", &info.requires.join(", "));
  }
  print_stat("Libs", &info.libs.join(", "));
  Ok(())
}

fn host_info(output: OutputFormat) -> Result<()> {
  let facts = match PlatformFacts::detect() {
    Ok(facts) => Some(facts),
    Err(e) => {
      print_warning(&e.to_string());
      None
    }
  };

  if output.is_json() {
    return print_json(&serde_json::json!({
      "host": facts,
      "store": paths::store_dir(),
      "build_root": paths::build_root(),
      "timestamp_url": timestamp_url(),
    }));
  }

  println!("kiln v{}", env!("CARGO_PKG_VERSION"));
  if let Some(facts) = &facts {
    print_stat("Platform", &facts.platform().to_string());
    print_stat("Compiler", &facts.compiler.name);
  }
  print_stat("Store", &paths::store_dir().display().to_string());
  print_stat("Build root", &paths::build_root().display().to_string());
  print_stat("Timestamp URL", &timestamp_url());
  Ok(())
}
