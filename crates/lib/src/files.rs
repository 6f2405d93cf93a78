//! File creation.
//!
//! The `files` category maps an absolute path to its desired content and
//! ownership:
//!
//! ```json
//! { "/etc/app.conf": { "content": "key=value\n", "owner": "app", "mode": "000640" } }
//! ```
//!
//! String content is written verbatim. Any other JSON value is written as
//! 4-space indented JSON.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Group, Uid, User, chown};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FilesError {
  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize content for {path}: {source}")]
  Serialize {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to change ownership of {path}: {source}")]
  Chown {
    path: PathBuf,
    #[source]
    source: nix::Error,
  },

  #[error("invalid mode '{mode}' for {path}")]
  InvalidMode { path: PathBuf, mode: String },

  #[error("failed to change mode of {path}: {source}")]
  Chmod {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Desired state of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
  #[serde(default)]
  pub content: Option<Value>,
  /// Remote location of the content. Accepted but not fetched.
  #[serde(default)]
  pub source: Option<String>,
  #[serde(default)]
  pub owner: Option<String>,
  #[serde(default)]
  pub group: Option<String>,
  /// Octal permission bits, e.g. `"000644"`.
  #[serde(default)]
  pub mode: Option<String>,
}

/// Render structured content the way it is written to disk.
pub fn render_content(path: &Path, content: &Value) -> Result<Vec<u8>, FilesError> {
  if let Value::String(s) = content {
    return Ok(s.as_bytes().to_vec());
  }

  let mut buf = Vec::new();
  let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
  content.serialize(&mut ser).map_err(|source| FilesError::Serialize {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(buf)
}

fn lookup_uid(owner: &str) -> Option<Uid> {
  match User::from_name(owner) {
    Ok(Some(user)) => Some(user.uid),
    Ok(None) => {
      debug!(owner = %owner, "unknown owner, leaving unchanged");
      None
    }
    Err(e) => {
      debug!(owner = %owner, error = %e, "owner lookup failed, leaving unchanged");
      None
    }
  }
}

fn lookup_gid(group: &str) -> Option<Gid> {
  match Group::from_name(group) {
    Ok(Some(group)) => Some(group.gid),
    Ok(None) => {
      debug!(group = %group, "unknown group, leaving unchanged");
      None
    }
    Err(e) => {
      debug!(group = %group, error = %e, "group lookup failed, leaving unchanged");
      None
    }
  }
}

/// Applies the `files` category of a config section.
#[derive(Debug, Default)]
pub struct FilesHandler {
  files: BTreeMap<String, FileEntry>,
}

impl FilesHandler {
  pub fn new(files: BTreeMap<String, FileEntry>) -> Self {
    Self { files }
  }

  /// Write every file, then apply ownership and mode.
  ///
  /// Entries with neither content nor source are skipped. I/O failures stop
  /// the pass.
  pub fn apply(&self) -> Result<(), FilesError> {
    for (dest, entry) in &self.files {
      self.apply_file(Path::new(dest), entry)?;
    }
    Ok(())
  }

  fn apply_file(&self, dest: &Path, entry: &FileEntry) -> Result<(), FilesError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
      match fs::create_dir_all(parent) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => debug!(path = %parent.display(), error = %e, "directory exists"),
        Err(e) => error!(path = %parent.display(), error = %e, "failed to create parent directory"),
      }
    }

    match (&entry.content, &entry.source) {
      (Some(content), _) => {
        let bytes = render_content(dest, content)?;
        fs::write(dest, bytes).map_err(|source| FilesError::Write {
          path: dest.to_path_buf(),
          source,
        })?;
        info!(path = %dest.display(), "wrote file");
      }
      (None, Some(source)) => {
        warn!(path = %dest.display(), source = %source, "file sources are not fetched, skipping");
        return Ok(());
      }
      (None, None) => {
        error!(path = %dest.display(), "file has neither content nor source, skipping");
        return Ok(());
      }
    }

    let uid = entry.owner.as_deref().and_then(lookup_uid);
    let gid = entry.group.as_deref().and_then(lookup_gid);
    if uid.is_some() || gid.is_some() {
      chown(dest, uid, gid).map_err(|source| FilesError::Chown {
        path: dest.to_path_buf(),
        source,
      })?;
    }

    if let Some(mode) = &entry.mode {
      let bits = u32::from_str_radix(mode, 8).map_err(|_| FilesError::InvalidMode {
        path: dest.to_path_buf(),
        mode: mode.clone(),
      })?;
      fs::set_permissions(dest, fs::Permissions::from_mode(bits)).map_err(|source| FilesError::Chmod {
        path: dest.to_path_buf(),
        source,
      })?;
    }

    Ok(())
  }
}
