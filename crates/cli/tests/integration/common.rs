//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// A recipe whose build installs one static library through the fake cmake.
pub const RECIPE: &str = r#"
name = "gost-engine"
version = "1.1.0.4"
patches = ["patches/engine-name.patch"]

[options.shared]
values = [true, false]
default = false

[build]
definitions = { shared = "BUILD_SHARED_LIBS" }
"#;

const PROFILE: &str = r#"
[settings]
os = "linux"
arch = "x86_64"
build_type = "Release"
"#;

const PATCH: &str = "--- a/gost_eng.c
+++ b/gost_eng.c
@@ -1 +1 @@
-static const char *engine_id = \"gost\";
+static const char *engine_id = \"gost-odant\";
";

/// Stands in for cmake: logs its arguments and installs `lib/libgost.a`.
const FAKE_CMAKE: &str = r#"#!/bin/sh
echo "$*" >> "$KILN_TEST_CMAKE_LOG"
if [ "$1" = "--install" ]; then
  mkdir -p "$6/lib" "$6/include"
  echo archive > "$6/lib/libgost.a"
  echo header > "$6/include/gost.h"
fi
if [ "$1" = "-S" ] && ! grep -q gost-odant "$2/gost_eng.c"; then
  echo "CMake Error: source was not patched" >&2
  exit 1
fi
"#;

/// Isolated recipe, store, build root and fake toolchain.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("recipe/recipe.toml", RECIPE);
    env.write_file("recipe/src/CMakeLists.txt", "project(gost C)\n");
    env.write_file("recipe/src/gost_eng.c", "static const char *engine_id = \"gost\";\n");
    env.write_file("recipe/patches/engine-name.patch", PATCH);
    env.write_file("profile.toml", PROFILE);
    env.write_file("bin/cmake", FAKE_CMAKE);
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      std::fs::set_permissions(env.path("bin/cmake"), std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    env
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  fn dir(&self, relative_path: &str) -> PathBuf {
    let p = self.path(relative_path);
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn store_path(&self) -> PathBuf {
    self.dir("store")
  }

  pub fn build_root(&self) -> PathBuf {
    self.dir("build")
  }

  pub fn cmake_log(&self) -> String {
    std::fs::read_to_string(self.path("cmake.log")).unwrap_or_default()
  }

  /// A `kiln` command with the fake cmake first on `PATH` and isolated
  /// store and build directories.
  pub fn kiln_cmd(&self) -> Command {
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let path = std::env::join_paths(
      std::iter::once(self.path("bin")).chain(std::env::split_paths(&inherited)),
    )
    .unwrap();

    let mut cmd: Command = cargo_bin_cmd!("kiln");
    cmd.env("PATH", path);
    cmd.env("KILN_STORE", self.store_path());
    cmd.env("KILN_BUILD_ROOT", self.build_root());
    cmd.env_remove("KILN_CMAKE");
    cmd.env("KILN_TEST_CMAKE_LOG", self.path("cmake.log"));
    cmd.arg("--verbose");
    cmd
  }

  /// `kiln <command> <recipe> --profile <profile>`.
  pub fn kiln(&self, command: &str) -> Command {
    let mut cmd = self.kiln_cmd();
    cmd
      .arg(command)
      .arg(self.path("recipe"))
      .arg("--profile")
      .arg(self.path("profile.toml"));
    cmd
  }
}
