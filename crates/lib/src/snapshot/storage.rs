//! Last-applied metadata snapshot storage.
//!
//! # Storage Layout
//!
//! ```text
//! {cache_dir}/                      # mode 0700
//! ├── last_metadata                 # global snapshot, mode 0600
//! └── last_metadata_<resource>      # per-resource copy, mode 0600
//! ```
//!
//! Both snapshots are replaced atomically: the document is written to a
//! temporary file in the same directory which is then renamed over it.

use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::types::SnapshotError;

/// Manages the persisted copies of the last successfully read metadata.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
  /// Global snapshot path (e.g., `/var/cache/heat-cfntools/last_metadata`).
  path: PathBuf,
  resource: Option<String>,
}

impl SnapshotStore {
  pub fn new(path: impl Into<PathBuf>, resource: Option<&str>) -> Self {
    Self {
      path: path.into(),
      resource: resource.map(String::from),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Path of the per-resource snapshot, or the global path when no resource
  /// is set.
  pub fn resource_path(&self) -> PathBuf {
    match &self.resource {
      Some(resource) => {
        let mut name = self.path.clone().into_os_string();
        name.push("_");
        name.push(resource);
        PathBuf::from(name)
      }
      None => self.path.clone(),
    }
  }

  /// Read and parse a metadata document from `path`.
  ///
  /// Unreadable and malformed files yield `None` with a warning.
  pub fn read(path: &Path) -> Option<Value> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "unable to open local metadata");
        return None;
      }
    };

    match serde_json::from_str(&content) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ignoring malformed local metadata");
        None
      }
    }
  }

  /// The snapshot to compare fresh metadata against.
  ///
  /// Both the per-resource and the global snapshot are read; the global one
  /// takes precedence when both are readable.
  pub fn load_last(&self) -> Option<Value> {
    let resource_path = self.resource_path();
    let mut paths = vec![resource_path.as_path()];
    if resource_path != self.path {
      paths.push(self.path.as_path());
    }

    paths.into_iter().filter_map(Self::read).last()
  }

  /// Ensure the snapshot directory exists, creating it owner-only.
  fn ensure_dir(&self) -> Result<PathBuf, SnapshotError> {
    let dir = match self.path.parent() {
      Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
      _ => PathBuf::from("."),
    };

    if !dir.is_dir() {
      debug!(path = %dir.display(), "creating metadata cache directory");
      fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&dir)
        .map_err(|source| SnapshotError::CreateDir {
          path: dir.clone(),
          source,
        })?;
    }

    Ok(dir)
  }

  /// Persist `document` as the global snapshot and, when a resource is set,
  /// as the per-resource snapshot.
  pub fn save(&self, document: &Value) -> Result<(), SnapshotError> {
    let dir = self.ensure_dir()?;
    let content = serde_json::to_vec(document).map_err(SnapshotError::Serialize)?;

    write_atomic(&dir, &self.path, &content)?;
    info!(path = %self.path.display(), "saved metadata snapshot");

    let resource_path = self.resource_path();
    if resource_path != self.path {
      write_atomic(&dir, &resource_path, &content)?;
      debug!(path = %resource_path.display(), "saved resource snapshot");
    }

    Ok(())
  }
}

/// Write `content` to an owner-only temporary file in `dir` and rename it
/// over `dest`.
fn write_atomic(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), SnapshotError> {
  let write_err = |source| SnapshotError::Write {
    path: dest.to_path_buf(),
    source,
  };

  let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
  fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600)).map_err(write_err)?;
  tmp.write_all(content).map_err(write_err)?;
  tmp.persist(dest).map_err(|e| write_err(e.error))?;
  Ok(())
}
