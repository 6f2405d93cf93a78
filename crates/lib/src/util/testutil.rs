//! Test utilities for cfnboot-lib.
//!
//! [`FakeHost`] records every invocation instead of spawning processes and
//! answers with canned results, so handler tests can assert on the exact
//! commands issued.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use nix::unistd::{User, geteuid};

use crate::exec::{CommandResult, Host, Invocation};

/// Name of the user the tests run as.
pub fn current_user() -> String {
  User::from_uid(geteuid())
    .ok()
    .flatten()
    .map(|u| u.name)
    .unwrap_or_else(|| "root".to_string())
}

/// A host that records commands and replays scripted results.
///
/// Responses are matched against the rendered command line; the longest
/// matching prefix wins. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeHost {
  calls: RefCell<Vec<Invocation>>,
  responses: Vec<(String, CommandResult)>,
  paths: HashSet<PathBuf>,
}

impl FakeHost {
  pub fn new() -> Self {
    Self::default()
  }

  /// Answer commands starting with `prefix` with `status` and `stdout`.
  pub fn respond(mut self, prefix: &str, status: i32, stdout: &str) -> Self {
    self.responses.push((
      prefix.to_string(),
      CommandResult {
        status: Some(status),
        stdout: stdout.to_string(),
        stderr: String::new(),
      },
    ));
    self
  }

  /// Answer commands starting with `prefix` as if they never ran.
  pub fn never_runs(mut self, prefix: &str) -> Self {
    self.responses.push((prefix.to_string(), CommandResult::default()));
    self
  }

  /// Pretend `path` exists on the host.
  pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.paths.insert(path.into());
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.borrow().clone()
  }

  /// Rendered command lines in execution order.
  pub fn commands(&self) -> Vec<String> {
    self.calls.borrow().iter().map(|i| i.command.to_string()).collect()
  }

  /// Rendered command lines starting with `prefix`.
  pub fn commands_starting_with(&self, prefix: &str) -> Vec<String> {
    self.commands().into_iter().filter(|c| c.starts_with(prefix)).collect()
  }
}

impl Host for FakeHost {
  fn execute(&self, invocation: &Invocation) -> CommandResult {
    self.calls.borrow_mut().push(invocation.clone());
    let rendered = invocation.command.to_string();

    self
      .responses
      .iter()
      .filter(|(prefix, _)| rendered.starts_with(prefix.as_str()))
      .max_by_key(|(prefix, _)| prefix.len())
      .map(|(_, result)| result.clone())
      .unwrap_or_else(|| CommandResult::with_status(0))
  }

  fn exists(&self, path: &Path) -> bool {
    self.paths.contains(path)
  }
}
