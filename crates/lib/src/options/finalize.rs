use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use super::{ConfigurationError, ConfigureRule, OptionDecl, OptionDomain, OptionError, OptionSlot, OptionValue};
use crate::platform::PlatformFacts;

/// Declared options plus the rules that finalize them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionModel {
  pub declarations: Vec<OptionDecl>,
  pub rules: Vec<ConfigureRule>,
}

impl OptionModel {
  pub fn new(declarations: Vec<OptionDecl>, rules: Vec<ConfigureRule>) -> Self {
    Self { declarations, rules }
  }

  fn domain(&self, name: &str) -> Option<&OptionDomain> {
    self.declarations.iter().find(|d| d.name == name).map(|d| &d.domain)
  }

  /// Check the declarations and rules are self-consistent.
  pub fn validate(&self) -> Result<(), ConfigurationError> {
    let mut seen = BTreeSet::new();
    for decl in &self.declarations {
      if !seen.insert(decl.name.as_str()) {
        return Err(ConfigurationError::DuplicateOption(decl.name.clone()));
      }
      if decl.domain.is_empty() {
        return Err(ConfigurationError::EmptyDomain(decl.name.clone()));
      }
      if !decl.domain.contains(&decl.default) {
        return Err(ConfigurationError::DefaultOutOfDomain {
          option: decl.name.clone(),
          value: decl.default.clone(),
          domain: decl.domain.clone(),
        });
      }
    }

    for rule in &self.rules {
      for name in rule.referenced_options() {
        if !seen.contains(name) {
          return Err(ConfigurationError::RuleUnknownOption(name.to_string()));
        }
      }
      if let ConfigureRule::Force { option, value, .. } = rule
        && !self.domain(option).is_some_and(|d| d.contains(value))
      {
        return Err(ConfigurationError::ForcedOutOfDomain {
          option: option.clone(),
          value: value.clone(),
        });
      }
    }

    Ok(())
  }

  /// Finalize the options for a platform.
  ///
  /// `overrides` are user-supplied raw values (`shared=False` on the command
  /// line); each must name a declared option and parse within its domain.
  /// Rules then run in declaration order.
  pub fn finalize(
    &self,
    overrides: &BTreeMap<String, String>,
    facts: &PlatformFacts,
  ) -> Result<FinalizedConfiguration, ConfigurationError> {
    self.validate()?;

    let mut slots: BTreeMap<String, OptionSlot> = self
      .declarations
      .iter()
      .map(|d| (d.name.clone(), OptionSlot::Value(d.default.clone())))
      .collect();

    for (name, raw) in overrides {
      let domain = self
        .domain(name)
        .ok_or_else(|| ConfigurationError::UnknownOption(name.clone()))?;
      let value = domain.parse_value(raw).ok_or_else(|| ConfigurationError::InvalidValue {
        option: name.clone(),
        value: raw.clone(),
        domain: domain.clone(),
      })?;
      slots.insert(name.clone(), OptionSlot::Value(value));
    }

    for rule in &self.rules {
      match rule {
        ConfigureRule::Reject { when, message } => {
          if when.holds(facts, &slots) {
            return Err(ConfigurationError::Rejected(message.clone()));
          }
        }
        ConfigureRule::Force { when, option, value } => {
          if !when.holds(facts, &slots) {
            continue;
          }
          match slots.get_mut(option) {
            Some(slot) if slot.value().is_some() => {
              if slot.value() != Some(value) {
                debug!(option = %option, value = %value, "forcing option");
              }
              *slot = OptionSlot::Value(value.clone());
            }
            _ => debug!(option = %option, "not forcing inapplicable option"),
          }
        }
        ConfigureRule::Remove { option, unless } => {
          if !unless.holds(facts, &slots) {
            debug!(option = %option, "option not applicable, removing");
            slots.insert(option.clone(), OptionSlot::Inapplicable);
          }
        }
      }
    }

    let finalized = FinalizedConfiguration {
      facts: facts.clone(),
      options: slots,
    };
    info!(platform = %facts.platform(), options = %finalized.summary(), "configuration finalized");
    Ok(finalized)
  }
}

/// Options and settings after finalization. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedConfiguration {
  facts: PlatformFacts,
  options: BTreeMap<String, OptionSlot>,
}

impl FinalizedConfiguration {
  pub fn facts(&self) -> &PlatformFacts {
    &self.facts
  }

  pub fn slots(&self) -> &BTreeMap<String, OptionSlot> {
    &self.options
  }

  pub fn get(&self, name: &str) -> Result<&OptionValue, OptionError> {
    match self.options.get(name) {
      Some(OptionSlot::Value(v)) => Ok(v),
      Some(OptionSlot::Inapplicable) => Err(OptionError::NotApplicable(name.to_string())),
      None => Err(OptionError::Unknown(name.to_string())),
    }
  }

  pub fn get_bool(&self, name: &str) -> Result<bool, OptionError> {
    let value = self.get(name)?;
    value.as_bool().ok_or_else(|| OptionError::NotBool {
      name: name.to_string(),
      value: value.clone(),
    })
  }

  /// The value of an option, or `None` if it is undeclared or inapplicable.
  pub fn get_safe(&self, name: &str) -> Option<&OptionValue> {
    self.get(name).ok()
  }

  /// True only for an applicable boolean option set to `true`.
  pub fn is_enabled(&self, name: &str) -> bool {
    self.get_bool(name).unwrap_or(false)
  }

  pub fn is_applicable(&self, name: &str) -> bool {
    matches!(self.options.get(name), Some(OptionSlot::Value(_)))
  }

  /// `name=value` pairs of applicable options, for logging.
  pub fn summary(&self) -> String {
    self
      .options
      .iter()
      .filter_map(|(k, slot)| slot.value().map(|v| format!("{}={}", k, v)))
      .collect::<Vec<_>>()
      .join(",")
  }
}
