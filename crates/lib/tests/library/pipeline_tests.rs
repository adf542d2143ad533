//! End-to-end package creation with fake toolchain and signer.

use kiln_lib::artifact;
use kiln_lib::build::{BuildError, BuildState, ConflictKind, Generator, PatchError};
use kiln_lib::options::OptionError;
use kiln_lib::package::{self, PackageError, PackageOutcome, Packager};
use kiln_lib::platform::compiler::{BuildType, Compiler};
use kiln_lib::platform::os::Os;
use kiln_lib::recipe::Recipe;
use kiln_lib::resolve::{Provenance, ProvenanceField, ResolveError, Scope};
use kiln_lib::sign::DigestAlgorithm;
use kiln_lib::util::hash::hash_directory;

use super::common::{FakeToolchain, Fixture, RECIPE, RecordingSigner, linux, windows};

const SIGNED_SHARED: &[(&str, &str)] = &[("shared", "True"), ("ninja", "True"), ("dll_sign", "True")];

mod end_to_end {
  use super::*;

  #[tokio::test]
  async fn shared_signed_windows_release() {
    let fx = Fixture::new();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let pristine = hash_directory(&recipe.source_dir(), &[]).unwrap();

    let plan = package::plan(&recipe, &fx.request(windows(BuildType::Release), SIGNED_SHARED), &fx.store()).unwrap();
    assert_eq!(plan.dependencies.len(), 2);
    assert_eq!(plan.dependencies[0].scope(), Scope::Link);
    assert_eq!(plan.dependencies[0].reference(), "openssl/1.1.0l+2@odant/stable");
    assert_eq!(plan.dependencies[1].scope(), Scope::Build);
    assert_eq!(plan.dependencies[1].reference(), "ninja_installer/1.9.0@bincrafters/stable");

    let toolchain = FakeToolchain::default();
    let signer = RecordingSigner::default();
    let outcome = Packager::new(&toolchain, &signer, fx.build_root())
      .create(&recipe, &plan)
      .await
      .unwrap();

    let PackageOutcome::Built { info, dir, states } = outcome else {
      panic!("expected a fresh build");
    };
    assert_eq!(
      states,
      vec![
        BuildState::Unpatched,
        BuildState::Patched,
        BuildState::Configured,
        BuildState::Compiled,
        BuildState::Installed,
      ]
    );

    let dlls: Vec<_> = artifact::collect(&dir, Os::Windows)
      .into_iter()
      .filter(|a| a.kind.is_dynamic_library())
      .collect();
    assert_eq!(dlls.len(), 2);
    let calls = signer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2 * dlls.len());
    assert!(calls.iter().all(|(_, _, timestamp)| *timestamp));
    assert_eq!(calls.iter().filter(|(_, d, _)| *d == DigestAlgorithm::Sha256).count(), dlls.len());

    // All three patches reached the toolchain; the recipe's source did not change.
    let sources = toolchain.sources.lock().unwrap();
    assert!(sources["CMakeLists.txt"].contains("install(TARGETS gost"));
    assert!(sources["gost_eng.c"].contains("gost-odant"));
    assert!(sources["README"].ends_with("Packaged with kiln.\n"));
    assert_eq!(pristine, hash_directory(&recipe.source_dir(), &[]).unwrap());

    let configures = toolchain.configures.lock().unwrap();
    assert_eq!(configures[0].build_type, BuildType::RelWithDebInfo);
    assert_eq!(configures[0].generator, Some(Generator::Ninja));
    assert_eq!(configures[0].prefix_path, vec![plan.dependencies[0].location.clone()]);

    assert_eq!(info.id, plan.id);
    assert_eq!(info.reference.to_string(), "openssl-gost-engine/1.1.0.4-beta1@odant/stable");
    assert_eq!(info.libs, vec!["gost"]);
    assert_eq!(info.requires, vec!["openssl/1.1.0l+2@odant/stable"]);
    assert_eq!(info.build_requires, vec!["ninja_installer/1.9.0@bincrafters/stable"]);
    assert_eq!(info.settings["os"], "windows");
    assert!(package::is_valid(&dir));

    // The build workspace is gone once the package is published.
    assert_eq!(std::fs::read_dir(fx.build_root()).unwrap().count(), 0);
  }

  #[tokio::test]
  async fn second_create_reuses_the_published_package() {
    let fx = Fixture::new();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let plan = package::plan(&recipe, &fx.request(windows(BuildType::Release), SIGNED_SHARED), &fx.store()).unwrap();

    let toolchain = FakeToolchain::default();
    let signer = RecordingSigner::default();
    let packager = Packager::new(&toolchain, &signer, fx.build_root());
    let first = packager.create(&recipe, &plan).await.unwrap();
    let second = packager.create(&recipe, &plan).await.unwrap();

    assert!(second.is_cached());
    assert_eq!(second.info(), first.info());
    assert_eq!(second.dir(), first.dir());
    assert_eq!(*toolchain.installs.lock().unwrap(), 1);
    assert_eq!(signer.calls.lock().unwrap().len(), 4);
  }

  #[tokio::test]
  async fn corrupted_package_is_rebuilt() {
    let fx = Fixture::new();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let plan = package::plan(&recipe, &fx.request(windows(BuildType::Release), SIGNED_SHARED), &fx.store()).unwrap();

    let toolchain = FakeToolchain::default();
    let signer = RecordingSigner::default();
    let packager = Packager::new(&toolchain, &signer, fx.build_root());
    packager.create(&recipe, &plan).await.unwrap();

    std::fs::write(plan.package_dir.join("bin/gost.dll"), b"truncated").unwrap();
    assert!(!package::is_valid(&plan.package_dir));

    let again = packager.create(&recipe, &plan).await.unwrap();
    assert!(!again.is_cached());
    assert_eq!(*toolchain.installs.lock().unwrap(), 2);
    assert_eq!(std::fs::read(plan.package_dir.join("bin/gost.dll")).unwrap(), b"MZ");
    assert!(package::is_valid(&plan.package_dir));
  }
}

mod configuration {
  use super::*;

  #[test]
  fn generator_choice_does_not_change_the_package_id() {
    let fx = Fixture::new();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let with_ninja = package::plan(&recipe, &fx.request(windows(BuildType::Release), SIGNED_SHARED), &fx.store()).unwrap();
    let without = package::plan(
      &recipe,
      &fx.request(windows(BuildType::Release), &[("ninja", "False")]),
      &fx.store(),
    )
    .unwrap();

    assert_eq!(without.dependencies.len(), 1);
    assert_eq!(with_ninja.id, without.id);
    assert_eq!(with_ninja.package_dir, without.package_dir);
  }

  #[tokio::test]
  async fn debug_build_signs_without_timestamp() {
    let fx = Fixture::new();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let plan = package::plan(&recipe, &fx.request(windows(BuildType::Debug), SIGNED_SHARED), &fx.store()).unwrap();

    let toolchain = FakeToolchain::default();
    let signer = RecordingSigner::default();
    Packager::new(&toolchain, &signer, fx.build_root())
      .create(&recipe, &plan)
      .await
      .unwrap();

    assert_eq!(toolchain.configures.lock().unwrap()[0].build_type, BuildType::Debug);
    let calls = signer.calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|(_, _, timestamp)| !*timestamp));
  }

  #[tokio::test]
  async fn linux_never_signs() {
    let fx = Fixture::new();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let plan = package::plan(&recipe, &fx.request(linux(BuildType::Release), &[("shared", "True")]), &fx.store()).unwrap();
    assert_eq!(
      plan.config.get("dll_sign"),
      Err(OptionError::NotApplicable("dll_sign".to_string()))
    );

    let toolchain = FakeToolchain::default();
    let signer = RecordingSigner::default();
    Packager::new(&toolchain, &signer, fx.build_root())
      .create(&recipe, &plan)
      .await
      .unwrap();
    assert!(signer.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn static_runtime_forces_a_static_unsigned_build() {
    let fx = Fixture::new();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let mut facts = windows(BuildType::Release);
    facts.compiler = Compiler::new("msvc").with_runtime("MT");
    let plan = package::plan(&recipe, &fx.request(facts, SIGNED_SHARED), &fx.store()).unwrap();

    assert_eq!(plan.config.get_bool("shared"), Ok(false));
    assert!(!plan.config.is_applicable("dll_sign"));

    let toolchain = FakeToolchain::default();
    let signer = RecordingSigner::default();
    let outcome = Packager::new(&toolchain, &signer, fx.build_root())
      .create(&recipe, &plan)
      .await
      .unwrap();

    let configures = toolchain.configures.lock().unwrap();
    assert_eq!(configures[0].definitions["BUILD_SHARED_LIBS"], "OFF");
    assert!(signer.calls.lock().unwrap().is_empty());
    assert!(
      !artifact::collect(outcome.dir(), Os::Windows)
        .iter()
        .any(|a| a.kind.is_dynamic_library())
    );
  }
}

mod failures {
  use super::*;

  #[tokio::test]
  async fn reapplied_patch_conflicts_before_configure() {
    let fx = Fixture::new();
    let duplicated = RECIPE.replace(
      "\"patches/0003-readme.patch\",\n]",
      "\"patches/0003-readme.patch\",\n  \"patches/0003-readme.patch\",\n]",
    );
    assert_ne!(duplicated, RECIPE);
    fx.write_recipe(&duplicated);
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let plan = package::plan(&recipe, &fx.request(windows(BuildType::Release), SIGNED_SHARED), &fx.store()).unwrap();

    let toolchain = FakeToolchain::default();
    let signer = RecordingSigner::default();
    let err = Packager::new(&toolchain, &signer, fx.build_root())
      .create(&recipe, &plan)
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      PackageError::Build(BuildError::Patch(PatchError::Conflict {
        kind: ConflictKind::AlreadyApplied,
        ..
      }))
    ));
    assert!(toolchain.configures.lock().unwrap().is_empty());
    assert!(!plan.package_dir.exists());
  }

  #[test]
  fn missing_dependency_is_unresolved() {
    let fx = Fixture::new();
    std::fs::remove_dir_all(fx.store_root().join("openssl")).unwrap();
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let err = package::plan(&recipe, &fx.request(windows(BuildType::Release), &[]), &fx.store()).unwrap_err();
    assert!(matches!(
      err,
      PackageError::Resolve(ResolveError::Unresolved { ref reference }) if reference.starts_with("openssl/")
    ));
  }

  #[test]
  fn inherited_user_without_provenance_is_ambiguous() {
    let fx = Fixture::new();
    fx.write_recipe(&RECIPE.replace("openssl/1.1.0l+2@odant/stable", "openssl/1.1.0l+2@{user}/stable"));
    let recipe = Recipe::load(&fx.recipe_dir()).unwrap();
    let mut request = fx.request(windows(BuildType::Release), &[]);
    request.provenance = Provenance::default();

    let err = package::plan(&recipe, &request, &fx.store()).unwrap_err();
    assert!(matches!(
      err,
      PackageError::Resolve(ResolveError::AmbiguousChannel {
        field: ProvenanceField::User,
        ..
      })
    ));
  }
}
