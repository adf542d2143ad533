//! Shared fixtures: a recipe tree, a populated store and fake external tools.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use kiln_lib::build::{BuildError, BuildRequest, ConfigureRequest, InstallRequest, ToolOutput, Toolchain};
use kiln_lib::platform::PlatformFacts;
use kiln_lib::platform::arch::Arch;
use kiln_lib::platform::compiler::{BuildType, Compiler};
use kiln_lib::platform::os::Os;
use kiln_lib::package::PackageRequest;
use kiln_lib::resolve::{FsStore, Provenance, Version};
use kiln_lib::sign::{DigestAlgorithm, SignError, Signer};
use tempfile::TempDir;

pub const RECIPE: &str = r#"
name = "openssl-gost-engine"
version = "1.1.0.4-beta1"
patches = [
  "patches/0001-cmake-install.patch",
  "patches/0002-engine-name.patch",
  "patches/0003-readme.patch",
]

[options.dll_sign]
values = [true, false]
default = true

[options.ninja]
values = [false, true]
default = true

[options.shared]
values = [true, false]
default = true

[[configure]]
action = "force"
when = { os = "windows", compiler = "msvc", runtime = ["MT", "MTd"] }
option = "shared"
value = false

[[configure]]
action = "remove"
option = "dll_sign"
unless = { os = "windows", options = { shared = true } }

[[requires]]
reference = "openssl/1.1.0l+2@odant/stable"

[[build_requires]]
reference = "ninja_installer/1.9.0@bincrafters/stable"
when = "ninja"

[package_id]
any = ["ninja"]

[build]
generator_option = "ninja"
definitions = { shared = "BUILD_SHARED_LIBS" }

[signing]
option = "dll_sign"

[[imports]]
pattern = "*.dll"
from = "bin"
to = "bin"
"#;

const CMAKELISTS: &str = "cmake_minimum_required(VERSION 2.8)\nproject(gost-engine C)\n";
const ENGINE_C: &str = "static const char *engine_id = \"gost\";\n";
const README: &str = "GOST engine\n";

const PATCH_CMAKE: &str = "--- a/CMakeLists.txt
+++ b/CMakeLists.txt
@@ -1,2 +1,3 @@
 cmake_minimum_required(VERSION 2.8)
 project(gost-engine C)
+install(TARGETS gost DESTINATION bin)
";

const PATCH_ENGINE: &str = "--- a/gost_eng.c
+++ b/gost_eng.c
@@ -1 +1 @@
-static const char *engine_id = \"gost\";
+static const char *engine_id = \"gost-odant\";
";

const PATCH_README: &str = "--- a/README
+++ b/README
@@ -1 +1,2 @@
 GOST engine
+Packaged with kiln.
";

/// A recipe directory, a store and a build root under one temp dir.
pub struct Fixture {
  pub temp: TempDir,
}

impl Fixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let fixture = Self { temp };
    fixture.write_recipe(RECIPE);
    fixture.populate_store();
    fixture
  }

  pub fn recipe_dir(&self) -> PathBuf {
    self.temp.path().join("recipe")
  }

  pub fn store_root(&self) -> PathBuf {
    self.temp.path().join("store")
  }

  pub fn build_root(&self) -> PathBuf {
    self.temp.path().join("build")
  }

  pub fn write_recipe(&self, manifest: &str) {
    let root = self.recipe_dir();
    write(&root.join("recipe.toml"), manifest);
    write(&root.join("src/CMakeLists.txt"), CMAKELISTS);
    write(&root.join("src/gost_eng.c"), ENGINE_C);
    write(&root.join("src/README"), README);
    write(&root.join("patches/0001-cmake-install.patch"), PATCH_CMAKE);
    write(&root.join("patches/0002-engine-name.patch"), PATCH_ENGINE);
    write(&root.join("patches/0003-readme.patch"), PATCH_README);
  }

  fn populate_store(&self) {
    let store = FsStore::new(self.store_root());
    let openssl = store.reference_dir("openssl", &Version::parse("1.1.0l+2").unwrap(), "odant", "stable");
    write(&openssl.join("bin/libcrypto-1_1-x64.dll"), "MZ");
    write(&openssl.join("lib/libcrypto.lib"), "!<arch>");
    let ninja = store.reference_dir(
      "ninja_installer",
      &Version::parse("1.9.0").unwrap(),
      "bincrafters",
      "stable",
    );
    write(&ninja.join("bin/ninja.exe"), "MZ");
  }

  pub fn store(&self) -> FsStore {
    FsStore::new(self.store_root())
  }

  pub fn request(&self, facts: PlatformFacts, overrides: &[(&str, &str)]) -> PackageRequest {
    PackageRequest {
      facts,
      overrides: overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
      provenance: Provenance::new(Some("odant"), Some("stable")),
      store_root: self.store_root(),
    }
  }
}

pub fn write(path: &Path, content: &str) {
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, content).unwrap();
}

pub fn windows(build_type: BuildType) -> PlatformFacts {
  PlatformFacts::new(Os::Windows, Arch::X86_64, Compiler::new("msvc").with_runtime("MD"), build_type)
}

pub fn linux(build_type: BuildType) -> PlatformFacts {
  PlatformFacts::new(Os::Linux, Arch::X86_64, Compiler::default_for(Os::Linux), build_type)
}

/// Installs a fixed tree and records what it was asked to do.
#[derive(Default)]
pub struct FakeToolchain {
  pub configures: Mutex<Vec<ConfigureRequest>>,
  pub installs: Mutex<usize>,
  /// Sources seen at configure time, relative path to content.
  pub sources: Mutex<BTreeMap<String, String>>,
}

impl Toolchain for FakeToolchain {
  async fn configure(&self, request: &ConfigureRequest) -> Result<ToolOutput, BuildError> {
    let mut sources = self.sources.lock().unwrap();
    for name in ["CMakeLists.txt", "gost_eng.c", "README"] {
      sources.insert(name.to_string(), std::fs::read_to_string(request.source_dir.join(name))?);
    }
    self.configures.lock().unwrap().push(request.clone());
    Ok(ToolOutput {
      output: "-- Configuring done\n".to_string(),
    })
  }

  async fn build(&self, _request: &BuildRequest) -> Result<ToolOutput, BuildError> {
    Ok(ToolOutput::default())
  }

  async fn install(&self, request: &InstallRequest) -> Result<ToolOutput, BuildError> {
    *self.installs.lock().unwrap() += 1;
    let root = &request.install_dir;
    let shared = self
      .configures
      .lock()
      .unwrap()
      .last()
      .and_then(|c| c.definitions.get("BUILD_SHARED_LIBS").cloned())
      .is_some_and(|v| v == "ON");
    write(&root.join("include/gost_lcl.h"), "#pragma once\n");
    write(&root.join("bin/gostsum.exe"), "MZ");
    if shared {
      write(&root.join("bin/gost.dll"), "MZ");
      write(&root.join("lib/engines-1_1/gost_legacy.dll"), "MZ");
      write(&root.join("lib/gost.lib"), "!<arch> import");
    } else {
      write(&root.join("lib/gost.lib"), "!<arch>");
    }
    Ok(ToolOutput::default())
  }
}

/// Records every signature instead of running a signing tool.
#[derive(Default)]
pub struct RecordingSigner {
  pub calls: Mutex<Vec<(PathBuf, DigestAlgorithm, bool)>>,
}

impl Signer for RecordingSigner {
  async fn sign(&self, path: &Path, digest: DigestAlgorithm, timestamp: bool) -> Result<(), SignError> {
    assert!(path.is_file(), "signing a missing file: {}", path.display());
    self.calls.lock().unwrap().push((path.to_path_buf(), digest, timestamp));
    Ok(())
  }
}
