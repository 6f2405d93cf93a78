//! Command execution.
//!
//! Every external program the reconciler touches goes through a [`Host`]:
//! package managers, `useradd`, service control binaries, user commands and
//! hook actions. [`LocalHost`] spawns real processes; tests substitute a
//! recording fake.
//!
//! A [`CommandRunner`] pairs a [`CommandLine`] with the `shell` flag it was
//! built for. Argument vectors are executed directly, strings go through
//! `/bin/sh -c`. Mixing the two is rejected at construction.

pub mod privilege;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::consts::PRIVILEGE_FAILURE_STATUS;

pub use privilege::{PrivilegeError, PrivilegeScope};

/// Errors raised while building a command.
#[derive(Debug, Error)]
pub enum ExecError {
  /// The command form does not match the shell flag.
  #[error("command form does not match shell={shell}: {command}")]
  ShellMismatch { command: String, shell: bool },
}

/// A command either as a literal argument vector or as a shell string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
  Shell(String),
  Argv(Vec<String>),
}

impl CommandLine {
  pub fn argv<I, S>(args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    CommandLine::Argv(args.into_iter().map(Into::into).collect())
  }

  pub fn is_shell(&self) -> bool {
    matches!(self, CommandLine::Shell(_))
  }
}

impl fmt::Display for CommandLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CommandLine::Shell(cmd) => write!(f, "{}", cmd),
      CommandLine::Argv(args) => write!(f, "{}", args.join(" ")),
    }
  }
}

/// Outcome of one command invocation.
///
/// `status` is `None` when the process never ran (spawn failure) or was
/// terminated by a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
  pub status: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandResult {
  pub fn with_status(status: i32) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }

  pub fn success(&self) -> bool {
    self.status == Some(0)
  }
}

/// Execution context for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
  /// User whose effective identity the command runs under.
  pub user: String,
  pub cwd: Option<PathBuf>,
  /// Replaces the inherited environment when set.
  pub env: Option<BTreeMap<String, String>>,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      user: "root".to_string(),
      cwd: None,
      env: None,
    }
  }
}

impl RunOptions {
  pub fn as_user(user: impl Into<String>) -> Self {
    Self {
      user: user.into(),
      ..Self::default()
    }
  }
}

/// A fully resolved command ready to hand to a [`Host`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub command: CommandLine,
  pub options: RunOptions,
}

/// The machine commands run against.
pub trait Host {
  /// Run one command to completion.
  fn execute(&self, invocation: &Invocation) -> CommandResult;

  /// Whether a path exists on the host (used to detect control binaries).
  fn exists(&self, path: &Path) -> bool;
}

/// Runs commands on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

impl Host for LocalHost {
  fn execute(&self, invocation: &Invocation) -> CommandResult {
    let options = &invocation.options;

    let _scope = match PrivilegeScope::acquire(&options.user) {
      Ok(scope) => scope,
      Err(e) => {
        error!(user = %options.user, error = %e, "error setting privileges");
        return CommandResult {
          status: Some(PRIVILEGE_FAILURE_STATUS),
          stdout: String::new(),
          stderr: e.to_string(),
        };
      }
    };

    let mut command = match &invocation.command {
      CommandLine::Shell(cmd) => {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(cmd);
        command
      }
      CommandLine::Argv(args) => {
        let Some((program, rest)) = args.split_first() else {
          error!("refusing to run an empty argument vector");
          return CommandResult::default();
        };
        let mut command = Command::new(program);
        command.args(rest);
        command
      }
    };

    if let Some(cwd) = &options.cwd {
      command.current_dir(cwd);
    }
    if let Some(env) = &options.env {
      command.env_clear().envs(env);
    }

    match command.output() {
      Ok(output) => CommandResult {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
      },
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
        debug!(error = %e, "spawn reported existing path");
        CommandResult::default()
      }
      Err(e) => {
        error!(cmd = %invocation.command, error = %e, "failed to spawn command");
        CommandResult::default()
      }
    }
  }

  fn exists(&self, path: &Path) -> bool {
    path.exists()
  }
}

/// Helper to run a command and collect its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRunner {
  command: CommandLine,
  next: Option<Box<CommandRunner>>,
}

impl CommandRunner {
  /// Build a runner, checking that the command form matches `shell`.
  pub fn new(command: CommandLine, shell: bool) -> Result<Self, ExecError> {
    if command.is_shell() != shell {
      return Err(ExecError::ShellMismatch {
        command: command.to_string(),
        shell,
      });
    }
    Ok(Self { command, next: None })
  }

  /// A runner that executes `args` directly, without a shell.
  pub fn argv<I, S>(args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      command: CommandLine::argv(args),
      next: None,
    }
  }

  /// A runner that executes `cmd` through `/bin/sh -c`.
  pub fn shell(cmd: impl Into<String>) -> Self {
    Self {
      command: CommandLine::Shell(cmd.into()),
      next: None,
    }
  }

  /// Chain a follow-up command that always runs after this one, with default
  /// options, whatever this command's outcome.
  pub fn then(mut self, next: CommandRunner) -> Self {
    self.next = Some(Box::new(next));
    self
  }

  pub fn command(&self) -> &CommandLine {
    &self.command
  }

  /// Run the command (and any chained follow-up) and return this command's
  /// result.
  pub fn run(&self, host: &dyn Host, options: &RunOptions) -> CommandResult {
    debug!(cmd = %self.command, user = %options.user, "running command");

    let invocation = Invocation {
      command: self.command.clone(),
      options: options.clone(),
    };
    let result = host.execute(&invocation);

    if result.status.is_some_and(|s| s != 0) {
      debug!(
        cmd = %self.command,
        status = ?result.status,
        stdout = %result.stdout,
        stderr = %result.stderr,
        "command returned non-zero"
      );
    }

    if let Some(next) = &self.next {
      next.run(host, &RunOptions::default());
    }

    result
  }

  /// Run with default options (as root, inherited cwd and environment).
  pub fn run_default(&self, host: &dyn Host) -> CommandResult {
    self.run(host, &RunOptions::default())
  }
}
