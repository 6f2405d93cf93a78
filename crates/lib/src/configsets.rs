//! ConfigSet expansion.
//!
//! The init document may declare named configSets, each an ordered list of
//! config section names and references to other sets:
//!
//! ```json
//! "configSets": {
//!   "default": ["base", {"ConfigSet": "web"}],
//!   "web": ["nginx", "app"]
//! }
//! ```
//!
//! Expansion flattens a selection into the ordered list of sections to
//! apply. References must resolve and must not form a cycle.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_CONFIGSET, DEFAULT_SECTION};

const REFERENCE_KEY: &str = "ConfigSet";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigSetError {
  #[error("invalid configSets metadata: {0}")]
  Invalid(String),

  #[error("undefined configSet '{0}' referenced")]
  Undefined(String),

  #[error("configSet cycle detected: {}", .0.join(" -> "))]
  Cycle(Vec<String>),

  #[error("template has no configSets")]
  NoConfigSets,

  #[error("template has no default configSet, must specify")]
  NoDefault,

  #[error("requested configSet '{0}' not in configSets section")]
  NotFound(String),

  #[error("requested configSet {0} is empty")]
  Empty(String),
}

/// Expands configSet selections against a configSets table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigSets<'a> {
  table: Option<&'a Map<String, Value>>,
}

impl<'a> ConfigSets<'a> {
  /// Wrap the `configSets` value of an init document, if any.
  pub fn new(table: Option<&'a Value>) -> Result<Self, ConfigSetError> {
    match table {
      None | Some(Value::Null) => Ok(Self { table: None }),
      Some(Value::Object(map)) => Ok(Self { table: Some(map) }),
      Some(other) => Err(ConfigSetError::Invalid(format!("configSets must be an object, got {other}"))),
    }
  }

  fn lookup(&self, name: &str) -> Option<&'a Value> {
    self.table.and_then(|t| t.get(name))
  }

  /// Append the sections named by `entries` to `acc`, expanding references.
  pub fn expand(&self, entries: &Value, acc: &mut Vec<String>) -> Result<(), ConfigSetError> {
    self.expand_inner(entries, acc, &mut Vec::new())
  }

  fn expand_inner(&self, entries: &Value, acc: &mut Vec<String>, stack: &mut Vec<String>) -> Result<(), ConfigSetError> {
    let Value::Array(entries) = entries else {
      return Err(ConfigSetError::Invalid(format!("expected a list, got {entries}")));
    };

    for entry in entries {
      match entry {
        Value::String(section) => acc.push(section.clone()),
        Value::Object(obj) => {
          let name = match (obj.len(), obj.get(REFERENCE_KEY)) {
            (1, Some(Value::String(name))) => name,
            _ => return Err(ConfigSetError::Invalid(entry.to_string())),
          };

          if stack.iter().any(|s| s == name) {
            let mut chain = stack.clone();
            chain.push(name.clone());
            return Err(ConfigSetError::Cycle(chain));
          }

          let set = self.lookup(name).ok_or_else(|| ConfigSetError::Undefined(name.clone()))?;
          stack.push(name.clone());
          self.expand_inner(set, acc, stack)?;
          stack.pop();
        }
        other => return Err(ConfigSetError::Invalid(other.to_string())),
      }
    }

    Ok(())
  }

  /// The configSet selection `resolve` expands for `selected`: the request
  /// itself, `default` when a table exists, otherwise the `config` section.
  pub fn selection<'s>(&self, selected: Option<&'s str>) -> &'s str {
    match selected.map(str::trim).filter(|s| !s.is_empty()) {
      Some(s) => s,
      None if self.table.is_some_and(|t| !t.is_empty()) => DEFAULT_CONFIGSET,
      None => DEFAULT_SECTION,
    }
  }

  /// Resolve a comma separated selection (or none) into the ordered list of
  /// sections to apply.
  pub fn resolve(&self, selected: Option<&str>) -> Result<Vec<String>, ConfigSetError> {
    let selected = selected.map(str::trim).filter(|s| !s.is_empty());

    let Some(table) = self.table.filter(|t| !t.is_empty()) else {
      return match selected {
        Some(_) => Err(ConfigSetError::NoConfigSets),
        None => Ok(vec![DEFAULT_SECTION.to_string()]),
      };
    };

    let selection = match selected {
      Some(s) => s,
      None if table.contains_key(DEFAULT_CONFIGSET) => DEFAULT_CONFIGSET,
      None => return Err(ConfigSetError::NoDefault),
    };

    let mut sections = Vec::new();
    for name in selection.split(',').map(str::trim) {
      let set = table.get(name).ok_or_else(|| ConfigSetError::NotFound(name.to_string()))?;
      let mut stack = vec![name.to_string()];
      self.expand_inner(set, &mut sections, &mut stack)?;
    }

    if sections.is_empty() {
      return Err(ConfigSetError::Empty(selection.to_string()));
    }

    debug!(selection = %selection, sections = ?sections, "expanded configSets");
    Ok(sections)
  }
}
