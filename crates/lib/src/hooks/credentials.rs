//! The cfn credentials file.
//!
//! ```text
//! AWSAccessKeyId=AKIA...
//! AWSSecretKey=...
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

const ACCESS_KEY_ID: &str = "AWSAccessKeyId";
const SECRET_KEY: &str = "AWSSecretKey";

#[derive(Debug, Error)]
pub enum CredentialsError {
  #[error("invalid credentials file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid credentials file {path}: line {line} is not a key=value pair")]
  Malformed { path: PathBuf, line: usize },
}

/// Keys read from a credentials file. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
  pub access_key_id: Option<String>,
  pub secret_key: Option<String>,
}

impl Credentials {
  /// Read and parse the credentials file at `path`.
  pub fn load(path: &Path) -> Result<Self, CredentialsError> {
    let content = fs::read_to_string(path).map_err(|source| CredentialsError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content).map_err(|line| CredentialsError::Malformed {
      path: path.to_path_buf(),
      line,
    })
  }

  /// Parse credentials text. On failure returns the 1-based number of the
  /// offending line.
  fn parse(content: &str) -> Result<Self, usize> {
    let mut creds = Self::default();

    for (idx, line) in content.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let (key, value) = line.split_once('=').ok_or(idx + 1)?;
      let value = value.trim().to_string();
      match key.trim() {
        ACCESS_KEY_ID => creds.access_key_id = Some(value),
        SECRET_KEY => creds.secret_key = Some(value),
        _ => {}
      }
    }

    Ok(creds)
  }
}
