//! Configure rules: ordered adjustments applied during finalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{OptionSlot, OptionValue};
use crate::platform::PlatformFacts;
use crate::platform::arch::Arch;
use crate::platform::compiler::BuildType;
use crate::platform::os::Os;

/// One configure rule, as written in a recipe:
///
/// ```toml
/// [[configure]]
/// action = "reject"
/// when = { libcxx = "libstdc++" }
/// message = "This package is only compatible with libstdc++11"
///
/// [[configure]]
/// action = "force"
/// when = { os = "windows", compiler = "msvc", runtime = ["MT", "MTd"] }
/// option = "shared"
/// value = false
///
/// [[configure]]
/// action = "remove"
/// option = "dll_sign"
/// unless = { os = "windows", options = { shared = true } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConfigureRule {
  /// Fail finalization when the condition holds.
  Reject { when: Condition, message: String },

  /// Set `option` to `value` when the condition holds, overriding user input.
  Force {
    when: Condition,
    option: String,
    value: OptionValue,
  },

  /// Make `option` inapplicable unless the condition holds.
  Remove {
    option: String,
    #[serde(default)]
    unless: Condition,
  },
}

impl ConfigureRule {
  /// Option names this rule reads or writes.
  pub(super) fn referenced_options(&self) -> Vec<&str> {
    let (target, condition) = match self {
      ConfigureRule::Reject { when, .. } => (None, when),
      ConfigureRule::Force { when, option, .. } => (Some(option.as_str()), when),
      ConfigureRule::Remove { option, unless } => (Some(option.as_str()), unless),
    };
    target
      .into_iter()
      .chain(condition.options.keys().map(String::as_str))
      .collect()
  }
}

/// A conjunction of facts and option values. An empty condition always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub os: Option<Os>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub arch: Option<Arch>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_type: Option<BuildType>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub compiler: Option<String>,
  /// Holds when the compiler runtime is any of these.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub runtime: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub libcxx: Option<String>,
  /// Current option values. An inapplicable option never matches.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub options: BTreeMap<String, OptionValue>,
}

impl Condition {
  pub fn holds(&self, facts: &PlatformFacts, slots: &BTreeMap<String, OptionSlot>) -> bool {
    if self.os.is_some_and(|os| os != facts.os) {
      return false;
    }
    if self.arch.is_some_and(|arch| arch != facts.arch) {
      return false;
    }
    if self.build_type.is_some_and(|bt| bt != facts.build_type) {
      return false;
    }
    if let Some(name) = &self.compiler
      && !compiler_matches(name, facts)
    {
      return false;
    }
    if let Some(runtimes) = &self.runtime {
      match facts.compiler.runtime.as_deref() {
        Some(rt) if runtimes.iter().any(|r| r == rt) => {}
        _ => return false,
      }
    }
    if let Some(libcxx) = &self.libcxx
      && facts.compiler.libcxx.as_deref() != Some(libcxx.as_str())
    {
      return false;
    }

    self
      .options
      .iter()
      .all(|(name, expected)| matches!(slots.get(name), Some(OptionSlot::Value(v)) if v == expected))
  }
}

/// `msvc` and `Visual Studio` name the same compiler family.
fn compiler_matches(name: &str, facts: &PlatformFacts) -> bool {
  let wanted_msvc = matches!(name.to_ascii_lowercase().as_str(), "msvc" | "visual studio");
  if wanted_msvc {
    facts.compiler.is_msvc()
  } else {
    facts.compiler.name.eq_ignore_ascii_case(name)
  }
}
