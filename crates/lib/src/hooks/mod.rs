//! Hooks and their configuration.
//!
//! A hook runs a shell action when one of its trigger events fires for the
//! resource it watches. Hooks are read once from the cfn-hup configuration
//! ([`HupConfig`]) and never change afterwards.

mod config;
mod credentials;

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, warn};

use crate::exec::{CommandRunner, Host, RunOptions};

pub use config::{HupConfig, HupConfigError, Ini, IniSection, parse_ini};
pub use credentials::{Credentials, CredentialsError};

/// An action bound to resource events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
  name: String,
  triggers: BTreeSet<String>,
  path: String,
  resource: String,
  runas: String,
  action: String,
}

impl Hook {
  /// Build a hook. `triggers` is a comma separated list of event names and
  /// `path` a dotted path whose second segment names the watched resource,
  /// e.g. `Resources.WebServer.Metadata`.
  ///
  /// Returns `None` when the path has no second segment.
  pub fn new(name: &str, triggers: &str, path: &str, runas: &str, action: &str) -> Option<Self> {
    let resource = path.split('.').nth(1)?.to_string();
    let triggers = triggers
      .split(',')
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(String::from)
      .collect();

    Some(Self {
      name: name.to_string(),
      triggers,
      path: path.to_string(),
      resource,
      runas: runas.to_string(),
      action: action.to_string(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The resource this hook watches.
  pub fn resource(&self) -> &str {
    &self.resource
  }

  pub fn triggers(&self) -> &BTreeSet<String> {
    &self.triggers
  }

  pub fn runas(&self) -> &str {
    &self.runas
  }

  pub fn action(&self) -> &str {
    &self.action
  }

  /// Whether an event named `name` for `resource` triggers this hook.
  pub fn matches(&self, name: &str, resource: &str) -> bool {
    self.resource == resource && self.triggers.contains(name)
  }

  /// Deliver an event. The action runs through the shell as the hook's user
  /// when the event matches; otherwise nothing happens.
  pub fn event(&self, host: &dyn Host, name: &str, object: &str, resource: &str) {
    if !self.matches(name, resource) {
      debug!(event = %name, object = %object, resource = %resource, hook = %self, "event did not match hook");
      return;
    }

    info!(hook = %self.name, event = %name, object = %object, "running hook action");
    let result = CommandRunner::shell(self.action.as_str()).run(host, &RunOptions::as_user(self.runas.as_str()));
    if !result.success() {
      warn!(hook = %self.name, status = ?result.status, stderr = %result.stderr, "hook action failed");
    }
  }
}

impl fmt::Display for Hook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let triggers: Vec<&str> = self.triggers.iter().map(String::as_str).collect();
    write!(
      f,
      "{{{}, {}, {}, {}, {}}}",
      self.name,
      triggers.join(","),
      self.path,
      self.runas,
      self.action
    )
  }
}
