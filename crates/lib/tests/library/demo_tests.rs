//! The bundled GOST engine recipe under `demos/`.

use std::path::PathBuf;

use kiln_lib::build::patch;
use kiln_lib::platform::compiler::{BuildType, Compiler};
use kiln_lib::recipe::Recipe;
use kiln_lib::resolve::Scope;
use kiln_lib::util::fs::copy_dir_all;
use tempfile::TempDir;

use super::common::windows;

fn demo_dir() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("../../demos/gost-engine")
}

#[test]
fn demo_recipe_loads() {
  let recipe = Recipe::load(&demo_dir()).unwrap();
  assert_eq!(recipe.name, "openssl-gost-engine");
  assert_eq!(recipe.patch_paths().len(), 1);

  let specs = recipe.dependency_specs().unwrap();
  assert_eq!(specs.iter().filter(|s| s.scope == Scope::Link).count(), 1);
  assert_eq!(specs.iter().filter(|s| s.scope == Scope::Build).count(), 2);
}

#[test]
fn demo_patches_apply_cleanly_once() {
  let recipe = Recipe::load(&demo_dir()).unwrap();
  let temp = TempDir::new().unwrap();
  copy_dir_all(&recipe.source_dir(), temp.path()).unwrap();

  patch::apply_all(temp.path(), &recipe.patch_paths()).unwrap();
  let cmake = std::fs::read_to_string(temp.path().join("CMakeLists.txt")).unwrap();
  assert!(cmake.contains("install(TARGETS gost"));

  let err = patch::apply_all(temp.path(), &recipe.patch_paths()).unwrap_err();
  match err {
    patch::PatchError::Conflict { file, hunk, kind, .. } => {
      assert_eq!(file, std::path::PathBuf::from("CMakeLists.txt"));
      assert_eq!(hunk, 1);
      assert_eq!(kind, patch::ConflictKind::AlreadyApplied);
    }
    other => panic!("expected a conflict, got {other:?}"),
  }
  let again = std::fs::read_to_string(temp.path().join("CMakeLists.txt")).unwrap();
  assert_eq!(again, cmake);
}

#[test]
fn demo_recipe_rejects_old_libstdcxx_abi() {
  let recipe = Recipe::load(&demo_dir()).unwrap();
  let mut facts = windows(BuildType::Release);
  facts.compiler = Compiler::new("gcc").with_libcxx("libstdc++");
  let err = recipe.option_model().finalize(&Default::default(), &facts).unwrap_err();
  assert!(err.to_string().contains("only compatible with libstdc++11"));
}
