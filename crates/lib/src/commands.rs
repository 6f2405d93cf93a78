//! Command sequencing.
//!
//! The `commands` category maps a label to a command. Commands run in
//! ascending order of their labels, not in document order, so templates
//! number them (`00_install`, `10_configure`, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::exec::{CommandLine, CommandRunner, ExecError, Host, RunOptions};
use crate::util::{expand_user, to_boolean};

#[derive(Debug, Error)]
pub enum CommandsError {
  #[error("command '{label}' failed (status {status:?})")]
  Failed { label: String, status: Option<i32> },

  #[error(transparent)]
  Exec(#[from] ExecError),
}

/// One entry of the `commands` category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEntry {
  #[serde(default)]
  pub command: Option<CommandLine>,
  /// Precondition; the command only runs when this exits 0.
  #[serde(default)]
  pub test: Option<CommandLine>,
  #[serde(default)]
  pub cwd: Option<String>,
  #[serde(default)]
  pub env: Option<BTreeMap<String, String>>,
  #[serde(default)]
  pub ignore_errors: Option<Value>,
}

impl CommandEntry {
  fn ignores_errors(&self) -> bool {
    self.ignore_errors.as_ref().is_some_and(to_boolean)
  }
}

fn runner_for(line: &CommandLine) -> Result<CommandRunner, ExecError> {
  CommandRunner::new(line.clone(), line.is_shell())
}

/// Applies the `commands` category of a config section.
#[derive(Debug, Default)]
pub struct CommandsHandler {
  commands: BTreeMap<String, CommandEntry>,
}

impl CommandsHandler {
  pub fn new(commands: BTreeMap<String, CommandEntry>) -> Self {
    Self { commands }
  }

  /// Run every command in label order.
  ///
  /// A command exiting non-zero stops the pass unless it sets
  /// `ignoreErrors`.
  pub fn apply(&self, host: &dyn Host) -> Result<(), CommandsError> {
    for (label, entry) in &self.commands {
      debug!(label = %label, "processing command");
      self.run_entry(host, label, entry)?;
    }
    Ok(())
  }

  fn run_entry(&self, host: &dyn Host, label: &str, entry: &CommandEntry) -> Result<(), CommandsError> {
    let mut options = RunOptions {
      env: entry.env.clone(),
      ..RunOptions::default()
    };

    if let Some(cwd) = &entry.cwd {
      let cwd = expand_user(cwd);
      if !host.exists(&cwd) {
        error!(label = %label, cwd = %cwd.display(), "working directory does not exist, skipping command");
        return Ok(());
      }
      options.cwd = Some(cwd);
    }

    if let Some(test) = &entry.test {
      let result = runner_for(test)?.run(host, &options);
      if !result.success() {
        info!(label = %label, "test returned false, skipping command");
        return Ok(());
      }
      debug!(label = %label, "test returned true, proceeding");
    }

    let Some(command) = &entry.command else {
      error!(label = %label, "'command' property missing, skipping");
      return Ok(());
    };

    let result = runner_for(command)?.run(host, &options);
    if result.success() {
      info!(label = %label, "command succeeded");
      return Ok(());
    }

    if entry.ignores_errors() {
      info!(label = %label, status = ?result.status, "command failed, ignoring errors");
      return Ok(());
    }

    Err(CommandsError::Failed {
      label: label.to_string(),
      status: result.status,
    })
  }
}
