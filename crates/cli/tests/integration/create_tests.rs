//! `kiln create` against a fake cmake.

#![cfg(unix)]

use std::path::PathBuf;

use predicates::prelude::*;

use super::common::{RECIPE, TestEnv};

fn package_dir(env: &TestEnv) -> PathBuf {
  let output = env.kiln("id").args(["--output", "json"]).output().unwrap();
  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  PathBuf::from(json["package_dir"].as_str().unwrap())
}

#[test]
fn create_builds_and_publishes() {
  let env = TestEnv::new();

  env
    .kiln("create")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built gost-engine/1.1.0.4@_/_"))
    .stdout(predicate::str::contains("Libs: gost"));

  let log = env.cmake_log();
  let steps: Vec<_> = log.lines().map(|l| l.split(' ').next().unwrap_or("")).collect();
  assert_eq!(steps, vec!["-S", "--build", "--install"]);
  assert!(log.contains("-DBUILD_SHARED_LIBS=OFF"));
  assert!(log.contains("-DCMAKE_BUILD_TYPE=RelWithDebInfo"));

  let dir = package_dir(&env);
  assert!(dir.join("lib/libgost.a").is_file());
  assert!(dir.join("include/gost.h").is_file());
  assert!(dir.join("kiln-package.json").is_file());

  // Build workspaces do not outlive the build.
  assert_eq!(std::fs::read_dir(env.build_root()).unwrap().count(), 0);
}

#[test]
fn second_create_is_up_to_date() {
  let env = TestEnv::new();

  env.kiln("create").assert().success();
  env
    .kiln("create")
    .assert()
    .success()
    .stdout(predicate::str::contains("is up to date"));

  assert_eq!(env.cmake_log().lines().count(), 3);
}

#[test]
fn build_always_rebuilds() {
  let env = TestEnv::new();

  env.kiln("create").assert().success();
  env
    .kiln("create")
    .args(["--build", "always"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Built"));

  assert_eq!(env.cmake_log().lines().count(), 6);
}

#[test]
fn options_select_distinct_packages() {
  let env = TestEnv::new();

  env.kiln("create").assert().success();
  env.kiln("create").args(["-o", "shared=True"]).assert().success();

  assert!(env.cmake_log().contains("-DBUILD_SHARED_LIBS=ON"));
  let packages = env.store_path().join("gost-engine/1.1.0.4/_/_/package");
  assert_eq!(std::fs::read_dir(packages).unwrap().count(), 2);
}

#[test]
fn info_reads_a_published_package() {
  let env = TestEnv::new();
  env.kiln("create").assert().success();

  env
    .kiln_cmd()
    .arg("info")
    .arg(package_dir(&env))
    .assert()
    .success()
    .stdout(predicate::str::contains("gost-engine/1.1.0.4@_/_"))
    .stdout(predicate::str::contains("options.shared: False"));
}

#[test]
fn toolchain_diagnostics_are_reported_verbatim() {
  let env = TestEnv::new();
  env.write_file(
    "recipe/recipe.toml",
    &RECIPE.replace("patches = [\"patches/engine-name.patch\"]\n", ""),
  );

  env
    .kiln("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("configure step failed (exit code 1)"))
    .stderr(predicate::str::contains("CMake Error: source was not patched"));

  assert!(!package_dir(&env).exists());
}

#[test]
fn conflicting_patch_fails_before_configure() {
  let env = TestEnv::new();
  env.write_file("recipe/src/gost_eng.c", "static const char *engine_id = \"other\";\n");

  env
    .kiln("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("does not apply"));

  assert!(env.cmake_log().is_empty());
}
