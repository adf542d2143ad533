//! CLI output formatting utilities.
//!
//! Colored status lines, human-readable sizes and durations, and JSON output.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Separates a package reference from its id in status lines.
pub const ARROW: &str = "→";

/// Binary-prefixed size, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];
  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit + 1 < UNITS.len() {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", size, UNITS[unit])
}

/// Wall-clock time rounded to whole milliseconds, e.g. `1m 5s 20ms`.
pub fn format_duration(duration: Duration) -> String {
  let rounded = Duration::from_millis(duration.as_millis() as u64);
  humantime::format_duration(rounded).to_string()
}

/// Total size of the regular files below `path`.
pub fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

#[derive(Debug, Clone, Copy)]
enum Status {
  Success,
  Info,
  Warning,
  Error,
}

impl Status {
  fn symbol(self) -> &'static str {
    match self {
      Status::Success => "✓",
      Status::Info => "•",
      Status::Warning => "⚠",
      Status::Error => "✗",
    }
  }

  /// Warnings and errors go to stderr and are coloured in full.
  fn emit(self, message: &str) {
    let symbol = self.symbol();
    match self {
      Status::Success => println!("{} {}", symbol.if_supports_color(Stream::Stdout, |s| s.green()), message),
      Status::Info => println!("{} {}", symbol.if_supports_color(Stream::Stdout, |s| s.blue()), message),
      Status::Warning => eprintln!(
        "{}",
        format!("{} {}", symbol, message).if_supports_color(Stream::Stderr, |s| s.yellow())
      ),
      Status::Error => eprintln!(
        "{}",
        format!("{} {}", symbol, message).if_supports_color(Stream::Stderr, |s| s.red())
      ),
    }
  }
}

pub fn print_success(message: &str) {
  Status::Success.emit(message);
}

pub fn print_info(message: &str) {
  Status::Info.emit(message);
}

pub fn print_warning(message: &str) {
  Status::Warning.emit(message);
}

pub fn print_error(message: &str) {
  Status::Error.emit(message);
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
