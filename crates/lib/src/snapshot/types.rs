use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from snapshot storage operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("failed to create snapshot directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write snapshot {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize snapshot: {0}")]
  Serialize(#[source] serde_json::Error),
}
