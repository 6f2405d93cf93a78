//! Scoped effective-user switching.
//!
//! [`PrivilegeScope`] changes the process' effective uid for as long as the
//! guard lives and puts the original back when it is dropped, on every exit
//! path. When the process already runs as the target user nothing changes.

use nix::unistd::{Uid, User, geteuid, seteuid};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum PrivilegeError {
  #[error("failed to look up user '{user}': {source}")]
  Lookup {
    user: String,
    #[source]
    source: nix::Error,
  },

  #[error("unknown user '{0}'")]
  UnknownUser(String),

  #[error("failed to switch effective user to '{user}': {source}")]
  Switch {
    user: String,
    #[source]
    source: nix::Error,
  },
}

/// Guard holding an effective-uid change.
#[derive(Debug)]
pub struct PrivilegeScope {
  original: Option<Uid>,
}

impl PrivilegeScope {
  /// Switch the effective uid to `user` until the returned guard is dropped.
  pub fn acquire(user: &str) -> Result<Self, PrivilegeError> {
    let target = User::from_name(user)
      .map_err(|source| PrivilegeError::Lookup {
        user: user.to_string(),
        source,
      })?
      .ok_or_else(|| PrivilegeError::UnknownUser(user.to_string()))?;

    let current = geteuid();
    if current == target.uid {
      return Ok(Self { original: None });
    }

    seteuid(target.uid).map_err(|source| PrivilegeError::Switch {
      user: user.to_string(),
      source,
    })?;
    debug!(user = %user, "privileges set");

    Ok(Self {
      original: Some(current),
    })
  }

  /// Whether this scope actually changed the effective uid.
  pub fn is_switched(&self) -> bool {
    self.original.is_some()
  }
}

impl Drop for PrivilegeScope {
  fn drop(&mut self) {
    if let Some(original) = self.original.take() {
      match seteuid(original) {
        Ok(()) => debug!("original privileges restored"),
        Err(e) => error!(error = %e, "error restoring privileges"),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::current_user;

  #[test]
  fn same_user_is_a_no_op() {
    let before = geteuid();
    {
      let scope = PrivilegeScope::acquire(&current_user()).unwrap();
      assert!(!scope.is_switched());
      assert_eq!(geteuid(), before);
    }
    assert_eq!(geteuid(), before);
  }

  #[test]
  fn unknown_user_fails_before_switching() {
    let before = geteuid();
    let err = PrivilegeScope::acquire("no-such-user-cfnboot").unwrap_err();
    assert!(matches!(err, PrivilegeError::UnknownUser(ref u) if u == "no-such-user-cfnboot"));
    assert_eq!(geteuid(), before);
  }
}
