//! Unified diff application.
//!
//! Patches are applied strictly: every hunk must find its context (with a
//! line offset allowed, but no fuzz). A hunk whose post-image is already
//! present is reported as a conflict rather than skipped, so applying the
//! same patch twice always fails.
//!
//! All files touched by one patch are computed in memory first and written
//! only once every hunk has applied.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Why a hunk did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
  /// The hunk's context and removed lines were not found.
  Mismatch,
  /// The hunk's result is already in the file.
  AlreadyApplied,
}

impl fmt::Display for ConflictKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConflictKind::Mismatch => f.write_str("context does not match"),
      ConflictKind::AlreadyApplied => f.write_str("patched content is already present"),
    }
  }
}

#[derive(Debug, Error)]
pub enum PatchError {
  #[error("failed to read patch {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed patch {patch} at line {line}: {message}")]
  Malformed { patch: PathBuf, line: usize, message: String },

  #[error("patch {patch} targets a path outside the source tree: {target}")]
  UnsafePath { patch: PathBuf, target: String },

  #[error("patch {patch}: hunk #{hunk} for {file} does not apply: {kind}")]
  Conflict {
    patch: PathBuf,
    file: PathBuf,
    hunk: usize,
    kind: ConflictKind,
  },

  #[error("patch {patch}: failed to update {file}: {source}")]
  Io {
    patch: PathBuf,
    file: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
  Context(String),
  Remove(String),
  Add(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Hunk {
  old_start: usize,
  old_len: usize,
  new_len: usize,
  lines: Vec<Line>,
  old_missing_newline: bool,
  new_missing_newline: bool,
}

impl Hunk {
  fn old_lines(&self) -> Vec<&str> {
    self
      .lines
      .iter()
      .filter_map(|l| match l {
        Line::Context(s) | Line::Remove(s) => Some(s.as_str()),
        Line::Add(_) => None,
      })
      .collect()
  }

  fn new_lines(&self) -> Vec<&str> {
    self
      .lines
      .iter()
      .filter_map(|l| match l {
        Line::Context(s) | Line::Add(s) => Some(s.as_str()),
        Line::Remove(_) => None,
      })
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FilePatch {
  /// `None` when the file is created.
  old_path: Option<String>,
  /// `None` when the file is deleted.
  new_path: Option<String>,
  hunks: Vec<Hunk>,
}

/// A parsed patch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
  path: PathBuf,
  files: Vec<FilePatch>,
}

impl Patch {
  pub fn load(path: &Path) -> Result<Self, PatchError> {
    let text = std::fs::read_to_string(path).map_err(|source| PatchError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(path, &text)
  }

  pub fn parse(path: &Path, text: &str) -> Result<Self, PatchError> {
    let malformed = |line: usize, message: &str| PatchError::Malformed {
      patch: path.to_path_buf(),
      line: line + 1,
      message: message.to_string(),
    };

    let lines: Vec<&str> = text.lines().collect();
    let mut files = Vec::new();
    let mut i = 0;

    while i < lines.len() {
      let Some(old) = lines[i].strip_prefix("--- ") else {
        i += 1;
        continue;
      };
      let new = lines
        .get(i + 1)
        .and_then(|l| l.strip_prefix("+++ "))
        .ok_or_else(|| malformed(i + 1, "expected '+++' after '---'"))?;
      i += 2;

      let mut file = FilePatch {
        old_path: header_path(old),
        new_path: header_path(new),
        hunks: Vec::new(),
      };

      while i < lines.len() && lines[i].starts_with("@@") {
        let (hunk, next) = parse_hunk(&lines, i).map_err(|(at, msg)| malformed(at, &msg))?;
        file.hunks.push(hunk);
        i = next;
      }

      if file.hunks.is_empty() {
        return Err(malformed(i, "file header without hunks"));
      }
      files.push(file);
    }

    Ok(Self {
      path: path.to_path_buf(),
      files,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Apply to the tree rooted at `root`.
  pub fn apply(&self, root: &Path) -> Result<(), PatchError> {
    let mut writes: Vec<(PathBuf, Option<String>)> = Vec::new();

    for file in &self.files {
      let target = file
        .new_path
        .as_deref()
        .or(file.old_path.as_deref())
        .unwrap_or_default();
      let relative = safe_relative(target).ok_or_else(|| PatchError::UnsafePath {
        patch: self.path.clone(),
        target: target.to_string(),
      })?;
      let full = root.join(&relative);

      let current = match (&file.old_path, full.exists()) {
        (None, false) => None,
        _ => Some(std::fs::read_to_string(&full).map_err(|source| PatchError::Io {
          patch: self.path.clone(),
          file: relative.clone(),
          source,
        })?),
      };

      let updated = self.patch_file(file, &relative, current.as_deref())?;
      writes.push((full, updated));
    }

    for (full, content) in writes {
      let io = |source: std::io::Error| PatchError::Io {
        patch: self.path.clone(),
        file: full.clone(),
        source,
      };
      match content {
        Some(text) => {
          if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
          }
          std::fs::write(&full, text).map_err(io)?;
        }
        None => std::fs::remove_file(&full).map_err(io)?,
      }
    }

    info!(patch = %self.path.display(), files = self.files.len(), "patch applied");
    Ok(())
  }

  /// The new content of one file, or `None` if the patch deletes it.
  fn patch_file(&self, file: &FilePatch, relative: &Path, current: Option<&str>) -> Result<Option<String>, PatchError> {
    let conflict = |hunk: usize, kind: ConflictKind| PatchError::Conflict {
      patch: self.path.clone(),
      file: relative.to_path_buf(),
      hunk,
      kind,
    };

    // Creating a file that already exists.
    if file.old_path.is_none()
      && let Some(existing) = current
    {
      let created = file.hunks.iter().flat_map(|h| h.new_lines()).collect::<Vec<_>>();
      let kind = if split_lines(existing).0 == created {
        ConflictKind::AlreadyApplied
      } else {
        ConflictKind::Mismatch
      };
      return Err(conflict(1, kind));
    }

    let (mut lines, mut trailing_newline) = current.map(split_lines).unwrap_or((Vec::new(), true));
    let mut delta: isize = 0;
    let mut floor = 0usize;

    for (idx, hunk) in file.hunks.iter().enumerate() {
      let number = idx + 1;
      let old = hunk.old_lines();
      let new = hunk.new_lines();

      // A zero-length old range names the line *after* which to insert.
      let nominal = if hunk.old_len == 0 { hunk.old_start } else { hunk.old_start.saturating_sub(1) };
      let expected = (nominal as isize + delta).max(floor as isize) as usize;

      let Some(at) = find_block(&lines, &old, expected, floor) else {
        let kind = if !old.is_empty() && find_block(&lines, &new, expected, floor).is_some() {
          ConflictKind::AlreadyApplied
        } else {
          ConflictKind::Mismatch
        };
        return Err(conflict(number, kind));
      };

      if let Some(start) = post_image_at(&lines, &old, &new, at) {
        debug!(file = %relative.display(), hunk = number, line = start + 1, "hunk result already present");
        return Err(conflict(number, ConflictKind::AlreadyApplied));
      }

      if at != expected {
        debug!(file = %relative.display(), hunk = number, offset = at as isize - expected as isize, "hunk applied with offset");
      }

      let reaches_end = at + old.len() == lines.len();
      let replacement: Vec<String> = new.iter().map(|s| s.to_string()).collect();
      lines.splice(at..at + old.len(), replacement);
      if reaches_end {
        trailing_newline = !hunk.new_missing_newline;
      }

      delta += hunk.new_len as isize - hunk.old_len as isize;
      floor = at + new.len();
    }

    if file.new_path.is_none() {
      if !lines.is_empty() {
        return Err(conflict(file.hunks.len(), ConflictKind::Mismatch));
      }
      return Ok(None);
    }

    let mut text = lines.join("\n");
    if trailing_newline && !lines.is_empty() {
      text.push('\n');
    }
    Ok(Some(text))
  }
}

/// Apply patches in order. An empty list leaves the tree untouched.
pub fn apply_all(root: &Path, patches: &[PathBuf]) -> Result<(), PatchError> {
  for path in patches {
    Patch::load(path)?.apply(root)?;
  }
  Ok(())
}

fn split_lines(text: &str) -> (Vec<String>, bool) {
  let trailing = text.is_empty() || text.ends_with('\n');
  (text.lines().map(str::to_string).collect(), trailing)
}

/// Find `block` at `expected`, else at the nearest offset not before `floor`.
fn find_block(lines: &[String], block: &[&str], expected: usize, floor: usize) -> Option<usize> {
  let fits = |at: usize| {
    at + block.len() <= lines.len() && lines[at..at + block.len()].iter().zip(block).all(|(a, b)| a == b)
  };
  if block.is_empty() {
    return (expected <= lines.len()).then_some(expected);
  }
  let last = lines.len().checked_sub(block.len())?;
  for distance in 0..=lines.len() {
    let after = expected + distance;
    if after <= last && fits(after) {
      return Some(after);
    }
    if let Some(before) = expected.checked_sub(distance)
      && distance > 0
      && before >= floor
      && before <= last
      && fits(before)
    {
      return Some(before);
    }
  }
  None
}

/// Where the hunk's post-image already sits, given that its pre-image was
/// found at `at`. Only hunks that add lines around an unchanged block can
/// match both ways.
fn post_image_at(lines: &[String], old: &[&str], new: &[&str], at: usize) -> Option<usize> {
  if new.len() <= old.len() {
    return None;
  }
  let lead = (0..=new.len() - old.len()).find(|&k| new[k..k + old.len()] == *old)?;
  let start = at.checked_sub(lead)?;
  let end = start + new.len();
  (end <= lines.len() && lines[start..end].iter().zip(new).all(|(a, b)| a == b)).then_some(start)
}

/// `a/src/foo.c\t2019-01-01` → `Some("src/foo.c")`; `/dev/null` → `None`.
fn header_path(raw: &str) -> Option<String> {
  let path = raw.split('\t').next().unwrap_or(raw).trim_end();
  if path == "/dev/null" {
    return None;
  }
  let stripped = path
    .strip_prefix("a/")
    .or_else(|| path.strip_prefix("b/"))
    .unwrap_or(path);
  Some(stripped.to_string())
}

fn safe_relative(target: &str) -> Option<PathBuf> {
  let path = Path::new(target);
  let ok = !target.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
  ok.then(|| path.to_path_buf())
}

fn parse_range(raw: &str) -> Option<(usize, usize)> {
  match raw.split_once(',') {
    Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
    None => Some((raw.parse().ok()?, 1)),
  }
}

/// Parse the hunk starting at `start`; returns it with the index after it.
fn parse_hunk(lines: &[&str], start: usize) -> Result<(Hunk, usize), (usize, String)> {
  let header = lines[start];
  let bad_header = || (start, format!("bad hunk header '{}'", header));
  let inner = header
    .strip_prefix("@@ ")
    .and_then(|h| h.split(" @@").next())
    .ok_or_else(bad_header)?;
  let (old, new) = inner.split_once(' ').ok_or_else(bad_header)?;
  let (old_start, old_len) = old.strip_prefix('-').and_then(parse_range).ok_or_else(bad_header)?;
  let (_, new_len) = new.strip_prefix('+').and_then(parse_range).ok_or_else(bad_header)?;

  let mut hunk = Hunk {
    old_start,
    old_len,
    new_len,
    ..Default::default()
  };
  let (mut old_seen, mut new_seen) = (0, 0);
  let mut i = start + 1;

  while old_seen < old_len || new_seen < new_len {
    let Some(raw) = lines.get(i) else {
      return Err((i, "hunk ends early".to_string()));
    };
    let line = match raw.chars().next() {
      Some(' ') => Line::Context(raw[1..].to_string()),
      None => Line::Context(String::new()),
      Some('-') => Line::Remove(raw[1..].to_string()),
      Some('+') => Line::Add(raw[1..].to_string()),
      Some('\\') => {
        i += 1;
        continue;
      }
      Some(_) => return Err((i, format!("unexpected line in hunk: '{}'", raw))),
    };
    match &line {
      Line::Context(_) => {
        old_seen += 1;
        new_seen += 1;
      }
      Line::Remove(_) => old_seen += 1,
      Line::Add(_) => new_seen += 1,
    }
    if old_seen > old_len || new_seen > new_len {
      return Err((i, "hunk is longer than its header says".to_string()));
    }
    hunk.lines.push(line);
    i += 1;
  }

  // Trailing "\ No newline at end of file" markers refer to the last line of
  // either side.
  while let Some(raw) = lines.get(i)
    && raw.starts_with('\\')
  {
    mark_missing_newline(&mut hunk, lines, i);
    i += 1;
  }
  mark_inner_newline_markers(&mut hunk, lines, start + 1, i);

  Ok((hunk, i))
}

/// Handle a marker that directly follows the final hunk line.
fn mark_missing_newline(hunk: &mut Hunk, lines: &[&str], marker: usize) {
  match lines.get(marker - 1).and_then(|l| l.chars().next()) {
    Some('-') => hunk.old_missing_newline = true,
    Some('+') => hunk.new_missing_newline = true,
    _ => {
      hunk.old_missing_newline = true;
      hunk.new_missing_newline = true;
    }
  }
}

/// Markers inside the hunk body (after a removed last line, before the
/// added replacement).
fn mark_inner_newline_markers(hunk: &mut Hunk, lines: &[&str], from: usize, to: usize) {
  for i in from..to {
    if lines[i].starts_with('\\') && lines.get(i + 1).is_some_and(|next| !next.starts_with('\\')) {
      mark_missing_newline(hunk, lines, i);
    }
  }
}
