//! Recipe options and their finalization against platform facts.
//!
//! Options are declared by a recipe with a domain and a default. Before
//! anything else happens, the declared set is finalized once: user overrides
//! are validated, then the recipe's ordered configure rules run against the
//! [`PlatformFacts`](crate::platform::PlatformFacts). The result is an
//! immutable [`FinalizedConfiguration`].
//!
//! A finalized option is either a value or [`OptionSlot::Inapplicable`].
//! Reading an inapplicable option is an error ([`OptionError::NotApplicable`]),
//! never a silent `false`.
//!
//! Rule outcomes are deliberately asymmetric: `reject` rules fail with a
//! [`ConfigurationError`], while `force` and `remove` rules adjust options
//! silently.

mod finalize;
mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use finalize::{FinalizedConfiguration, OptionModel};
pub use rules::{Condition, ConfigureRule};

/// The value of a single option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
  Bool(bool),
  Text(String),
}

impl OptionValue {
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      OptionValue::Bool(b) => Some(*b),
      OptionValue::Text(_) => None,
    }
  }
}

impl fmt::Display for OptionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OptionValue::Bool(true) => f.write_str("True"),
      OptionValue::Bool(false) => f.write_str("False"),
      OptionValue::Text(s) => f.write_str(s),
    }
  }
}

impl From<bool> for OptionValue {
  fn from(b: bool) -> Self {
    OptionValue::Bool(b)
  }
}

impl From<&str> for OptionValue {
  fn from(s: &str) -> Self {
    OptionValue::Text(s.to_string())
  }
}

/// The set of values an option may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDomain", into = "RawDomain")]
pub enum OptionDomain {
  Bool,
  Enum(Vec<String>),
  /// Any free-form string.
  Any,
}

impl OptionDomain {
  pub fn contains(&self, value: &OptionValue) -> bool {
    match (self, value) {
      (OptionDomain::Bool, OptionValue::Bool(_)) => true,
      (OptionDomain::Enum(values), OptionValue::Text(s)) => values.iter().any(|v| v == s),
      (OptionDomain::Any, OptionValue::Text(_)) => true,
      _ => false,
    }
  }

  /// Parse a command-line value (`shared=False`) against this domain.
  pub fn parse_value(&self, raw: &str) -> Option<OptionValue> {
    let value = match self {
      OptionDomain::Bool => match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => OptionValue::Bool(true),
        "false" | "0" | "no" | "off" => OptionValue::Bool(false),
        _ => return None,
      },
      OptionDomain::Enum(_) | OptionDomain::Any => OptionValue::Text(raw.to_string()),
    };
    self.contains(&value).then_some(value)
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, OptionDomain::Enum(values) if values.is_empty())
  }
}

impl fmt::Display for OptionDomain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OptionDomain::Bool => f.write_str("[True, False]"),
      OptionDomain::Enum(values) => write!(f, "[{}]", values.join(", ")),
      OptionDomain::Any => f.write_str("ANY"),
    }
  }
}

/// Recipe form of a domain: `"ANY"` or a list of literal values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDomain {
  Any(String),
  Values(Vec<OptionValue>),
}

impl TryFrom<RawDomain> for OptionDomain {
  type Error = String;

  fn try_from(raw: RawDomain) -> Result<Self, Self::Error> {
    match raw {
      RawDomain::Any(s) if s.eq_ignore_ascii_case("any") => Ok(OptionDomain::Any),
      RawDomain::Any(s) => Err(format!("expected \"ANY\" or a list of values, got \"{}\"", s)),
      RawDomain::Values(values) if values.iter().all(|v| matches!(v, OptionValue::Bool(_))) && !values.is_empty() => {
        Ok(OptionDomain::Bool)
      }
      RawDomain::Values(values) => values
        .into_iter()
        .map(|v| match v {
          OptionValue::Text(s) => Ok(s),
          OptionValue::Bool(_) => Err("option domains cannot mix booleans and strings".to_string()),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(OptionDomain::Enum),
    }
  }
}

impl From<OptionDomain> for RawDomain {
  fn from(domain: OptionDomain) -> Self {
    match domain {
      OptionDomain::Bool => RawDomain::Values(vec![OptionValue::Bool(true), OptionValue::Bool(false)]),
      OptionDomain::Enum(values) => RawDomain::Values(values.into_iter().map(OptionValue::Text).collect()),
      OptionDomain::Any => RawDomain::Any("ANY".to_string()),
    }
  }
}

/// A declared option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
  pub name: String,
  #[serde(rename = "values")]
  pub domain: OptionDomain,
  pub default: OptionValue,
}

impl OptionDecl {
  pub fn new(name: &str, domain: OptionDomain, default: impl Into<OptionValue>) -> Self {
    Self {
      name: name.to_string(),
      domain,
      default: default.into(),
    }
  }

  pub fn boolean(name: &str, default: bool) -> Self {
    Self::new(name, OptionDomain::Bool, default)
  }
}

/// A finalized option: a value, or explicitly not applicable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionSlot {
  Inapplicable,
  Value(OptionValue),
}

impl OptionSlot {
  pub fn value(&self) -> Option<&OptionValue> {
    match self {
      OptionSlot::Value(v) => Some(v),
      OptionSlot::Inapplicable => None,
    }
  }
}

/// Errors reading a finalized option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
  #[error("option '{0}' is not declared")]
  Unknown(String),

  #[error("option '{0}' is not applicable to this configuration")]
  NotApplicable(String),

  #[error("option '{name}' is not a boolean (value: {value})")]
  NotBool { name: String, value: OptionValue },
}

/// Invalid or incompatible configuration, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
  #[error("option '{0}' declares an empty domain")]
  EmptyDomain(String),

  #[error("option '{0}' is declared more than once")]
  DuplicateOption(String),

  #[error("default value {value} of option '{option}' is outside its domain {domain}")]
  DefaultOutOfDomain {
    option: String,
    value: OptionValue,
    domain: OptionDomain,
  },

  #[error("unknown option '{0}'")]
  UnknownOption(String),

  #[error("invalid value '{value}' for option '{option}', possible values are {domain}")]
  InvalidValue {
    option: String,
    value: String,
    domain: OptionDomain,
  },

  #[error("configure rule refers to undeclared option '{0}'")]
  RuleUnknownOption(String),

  #[error("configure rule forces option '{option}' to {value}, outside its domain")]
  ForcedOutOfDomain { option: String, value: OptionValue },

  #[error("{0}")]
  Rejected(String),
}
