//! Artifacts produced by an install step.
//!
//! The install tree is walked once after a successful install and each
//! file is classified by its name and location for the target OS. Files
//! that are neither libraries, executables nor objects (headers, CMake
//! config, debug symbols) are not artifacts.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::platform::os::Os;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
  Dynamic,
  Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  Library(Linkage),
  Binary,
  Object,
}

impl ArtifactKind {
  pub fn is_dynamic_library(&self) -> bool {
    matches!(self, ArtifactKind::Library(Linkage::Dynamic))
  }
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ArtifactKind::Library(Linkage::Dynamic) => f.write_str("dynamic library"),
      ArtifactKind::Library(Linkage::Static) => f.write_str("static library"),
      ArtifactKind::Binary => f.write_str("binary"),
      ArtifactKind::Object => f.write_str("object"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
  pub path: PathBuf,
  pub kind: ArtifactKind,
}

impl Artifact {
  pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
    Self {
      path: path.into(),
      kind,
    }
  }
}

/// Classify one file of an install tree. `relative` is its path below the
/// install prefix.
pub fn classify(relative: &Path, os: Os) -> Option<ArtifactKind> {
  let name = relative.file_name()?.to_str()?.to_ascii_lowercase();
  let in_bin = relative.components().next().is_some_and(|c| c.as_os_str() == "bin");
  let extension = Path::new(&name).extension().and_then(|e| e.to_str()).unwrap_or("");

  let kind = match os {
    Os::Windows => match extension {
      "dll" => ArtifactKind::Library(Linkage::Dynamic),
      "lib" => ArtifactKind::Library(Linkage::Static),
      "exe" => ArtifactKind::Binary,
      "obj" => ArtifactKind::Object,
      _ => return None,
    },
    Os::Linux | Os::MacOs => {
      if is_shared_object(&name, os) {
        ArtifactKind::Library(Linkage::Dynamic)
      } else {
        match extension {
          "a" => ArtifactKind::Library(Linkage::Static),
          "o" => ArtifactKind::Object,
          "" if in_bin => ArtifactKind::Binary,
          _ => return None,
        }
      }
    }
  };
  Some(kind)
}

/// `libgost.so`, `libgost.so.1.1`, `gost.dylib`.
fn is_shared_object(name: &str, os: Os) -> bool {
  let ext = os.dynamic_library_extension();
  let dotted = format!(".{}", ext);
  name.ends_with(&dotted) || (os == Os::Linux && name.contains(".so."))
}

/// All artifacts below `install_dir`, sorted by path.
pub fn collect(install_dir: &Path, os: Os) -> Vec<Artifact> {
  let mut artifacts: Vec<Artifact> = WalkDir::new(install_dir)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| {
      let relative = e.path().strip_prefix(install_dir).ok()?;
      classify(relative, os).map(|kind| Artifact::new(e.path(), kind))
    })
    .collect();
  artifacts.sort_by(|a, b| a.path.cmp(&b.path));
  debug!(count = artifacts.len(), dir = %install_dir.display(), "collected artifacts");
  artifacts
}

/// Names consumers link against, from the libraries directly in `lib/`:
/// `lib/libgost.a` → `gost`, `lib/libgost.so.1` → `gost`, `lib/gost.lib` → `gost`.
pub fn collect_libs(package_dir: &Path, os: Os) -> Vec<String> {
  let lib_dir = package_dir.join("lib");
  let Ok(entries) = std::fs::read_dir(&lib_dir) else {
    return Vec::new();
  };

  let mut names = BTreeSet::new();
  for entry in entries.flatten() {
    // Follows links: `libgost.so` is usually a link to the versioned file.
    if !std::fs::metadata(entry.path()).is_ok_and(|m| m.is_file()) {
      continue;
    }
    let file_name = entry.file_name();
    let Some(file_name) = file_name.to_str() else {
      continue;
    };
    let Some(kind) = classify(&Path::new("lib").join(file_name), os) else {
      continue;
    };
    if !matches!(kind, ArtifactKind::Library(_)) {
      continue;
    }
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let name = match os {
      Os::Windows => stem,
      Os::Linux | Os::MacOs => stem.strip_prefix("lib").unwrap_or(stem),
    };
    if !name.is_empty() {
      names.insert(name.to_string());
    }
  }
  names.into_iter().collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"x").unwrap();
  }

  #[test]
  fn classifies_windows_tree() {
    let os = Os::Windows;
    assert_eq!(
      classify(Path::new("bin/gost.dll"), os),
      Some(ArtifactKind::Library(Linkage::Dynamic))
    );
    assert_eq!(
      classify(Path::new("lib/gost.lib"), os),
      Some(ArtifactKind::Library(Linkage::Static))
    );
    assert_eq!(classify(Path::new("bin/gostsum.exe"), os), Some(ArtifactKind::Binary));
    assert_eq!(classify(Path::new("bin/gost.pdb"), os), None);
    assert_eq!(classify(Path::new("include/gost.h"), os), None);
  }

  #[test]
  fn classifies_unix_tree() {
    assert_eq!(
      classify(Path::new("lib/engines-1.1/gost.so"), Os::Linux),
      Some(ArtifactKind::Library(Linkage::Dynamic))
    );
    assert_eq!(
      classify(Path::new("lib/libgost.so.1.1"), Os::Linux),
      Some(ArtifactKind::Library(Linkage::Dynamic))
    );
    assert_eq!(
      classify(Path::new("lib/libgost.dylib"), Os::MacOs),
      Some(ArtifactKind::Library(Linkage::Dynamic))
    );
    assert_eq!(classify(Path::new("bin/gostsum"), Os::Linux), Some(ArtifactKind::Binary));
    assert_eq!(classify(Path::new("share/README"), Os::Linux), None);
  }

  #[test]
  fn collect_walks_install_tree() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "bin/gost.dll");
    touch(temp.path(), "bin/gostsum.exe");
    touch(temp.path(), "lib/gost.lib");
    touch(temp.path(), "include/gost.h");

    let artifacts = collect(temp.path(), Os::Windows);
    assert_eq!(artifacts.len(), 3);
    assert_eq!(artifacts.iter().filter(|a| a.kind.is_dynamic_library()).count(), 1);
    assert!(artifacts[0].path.ends_with("bin/gost.dll"));
  }

  #[test]
  fn collect_libs_strips_prefix_and_extension() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "lib/libgost.a");
    touch(temp.path(), "lib/libgost.so");
    touch(temp.path(), "lib/libgost.so.1.1");
    touch(temp.path(), "lib/libgost_core.a");
    touch(temp.path(), "lib/cmake/gost-config.cmake");
    assert_eq!(collect_libs(temp.path(), Os::Linux), vec!["gost", "gost_core"]);

    let win = TempDir::new().unwrap();
    touch(win.path(), "lib/gost.lib");
    touch(win.path(), "bin/gost.dll");
    assert_eq!(collect_libs(win.path(), Os::Windows), vec!["gost"]);
  }

  #[cfg(unix)]
  #[test]
  fn collect_libs_follows_soname_links() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "lib/libgost.so.1");
    std::os::unix::fs::symlink("libgost.so.1", temp.path().join("lib/libgost.so")).unwrap();
    std::os::unix::fs::symlink("missing.so.2", temp.path().join("lib/libdangling.so")).unwrap();
    assert_eq!(collect_libs(temp.path(), Os::Linux), vec!["gost"]);
  }

  #[test]
  fn collect_libs_without_lib_dir_is_empty() {
    let temp = TempDir::new().unwrap();
    assert!(collect_libs(temp.path(), Os::Linux).is_empty());
  }
}
