//! Group and user provisioning.
//!
//! Accounts are created with `groupadd` and `useradd`. Failures are logged
//! with a diagnostic derived from the tool's exit status and never stop the
//! pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::consts::NOLOGIN_SHELL;
use crate::exec::{CommandRunner, Host};
use crate::util::scalar_to_string;

/// Desired state of one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
  #[serde(default)]
  pub gid: Option<Value>,
}

/// Desired state of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
  #[serde(default)]
  pub uid: Option<Value>,
  #[serde(default)]
  pub home_dir: Option<String>,
  #[serde(default)]
  pub groups: Option<Vec<String>>,
}

fn groupadd_diagnostic(status: Option<i32>) -> Option<&'static str> {
  match status {
    Some(9) => Some("group name not unique"),
    Some(4) => Some("GID not unique"),
    Some(3) => Some("GID not valid"),
    Some(2) => Some("Invalid syntax"),
    _ => None,
  }
}

fn useradd_diagnostic(status: Option<i32>) -> Option<&'static str> {
  match status {
    Some(9) => Some("user name not unique"),
    Some(6) => Some("group does not exist"),
    Some(4) => Some("UID not unique"),
    Some(3) => Some("Invalid argument"),
    Some(2) => Some("Invalid syntax"),
    _ => None,
  }
}

/// Applies the `groups` category of a config section.
#[derive(Debug, Default)]
pub struct GroupsHandler {
  groups: BTreeMap<String, GroupEntry>,
}

impl GroupsHandler {
  pub fn new(groups: BTreeMap<String, GroupEntry>) -> Self {
    Self { groups }
  }

  pub fn apply(&self, host: &dyn Host) {
    for (name, entry) in &self.groups {
      debug!(group = %name, "creating group");

      let mut args = vec!["groupadd".to_string(), name.clone()];
      if let Some(gid) = entry.gid.as_ref().and_then(scalar_to_string) {
        args.extend(["--gid".to_string(), gid]);
      }

      let result = CommandRunner::argv(args).run_default(host);
      if result.success() {
        info!(group = %name, "group created");
        continue;
      }
      match groupadd_diagnostic(result.status) {
        Some(reason) => error!(group = %name, reason, "error creating group"),
        None => error!(group = %name, status = ?result.status, "error creating group"),
      }
    }
  }
}

/// Applies the `users` category of a config section.
///
/// Users always get a non-interactive login shell.
#[derive(Debug, Default)]
pub struct UsersHandler {
  users: BTreeMap<String, UserEntry>,
}

impl UsersHandler {
  pub fn new(users: BTreeMap<String, UserEntry>) -> Self {
    Self { users }
  }

  pub fn apply(&self, host: &dyn Host) {
    for (name, entry) in &self.users {
      debug!(user = %name, "creating user");

      let mut args = vec!["useradd".to_string(), name.clone()];
      if let Some(uid) = entry.uid.as_ref().and_then(scalar_to_string) {
        args.extend(["--uid".to_string(), uid]);
      }
      if let Some(home) = &entry.home_dir {
        args.extend(["--home".to_string(), home.clone()]);
      }
      if let Some(groups) = &entry.groups {
        args.extend(["--groups".to_string(), groups.join(",")]);
      }
      args.extend(["--shell".to_string(), NOLOGIN_SHELL.to_string()]);

      let result = CommandRunner::argv(args).run_default(host);
      if result.success() {
        info!(user = %name, "user created");
        continue;
      }
      match useradd_diagnostic(result.status) {
        Some(reason) => error!(user = %name, reason, "error creating user"),
        None => error!(user = %name, status = ?result.status, "error creating user"),
      }
    }
  }
}
