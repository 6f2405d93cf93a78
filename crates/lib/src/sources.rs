//! Archive sources.
//!
//! The `sources` category maps a destination directory to an archive URL.
//! Each entry becomes one shell pipeline that downloads and unpacks the
//! archive into the destination. Transfers are not retried.

use std::collections::BTreeMap;
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::exec::{CommandRunner, Host};

/// Archive formats recognised from a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
  Tgz,
  Tbz2,
  Zip,
  Tar,
  Gz,
  Bz2,
}

impl SourceKind {
  fn from_extension(ext: &str) -> Option<Self> {
    match ext {
      ".tgz" => Some(Self::Tgz),
      ".tbz2" => Some(Self::Tbz2),
      ".zip" => Some(Self::Zip),
      ".tar" => Some(Self::Tar),
      ".gz" => Some(Self::Gz),
      ".bz2" => Some(Self::Bz2),
      _ => None,
    }
  }

  /// Classify `url` by its suffix.
  ///
  /// `.tar.gz` and `.tar.bz2` count as their short forms. URLs without a
  /// suffix that follow GitHub's `/tarball/<ref>` or `/zipball/<ref>` layout
  /// are treated as tgz and zip.
  pub fn classify(url: &str) -> Option<Self> {
    let (rest, ext) = splitext(url);
    match ext.as_str() {
      ".gz" if splitext(rest).1 == ".tar" => Some(Self::Tgz),
      ".bz2" if splitext(rest).1 == ".tar" => Some(Self::Tbz2),
      "" => github_ball_kind(url),
      other => Self::from_extension(other),
    }
  }
}

/// Split a path at its final extension, lower-casing the extension.
///
/// Only the last path component is considered and leading dots belong to the
/// name, so `dir/.profile` has no extension.
fn splitext(path: &str) -> (&str, String) {
  let start = path.rfind('/').map_or(0, |i| i + 1);
  let base = &path[start..];
  let name = base.trim_start_matches('.');
  let offset = start + (base.len() - name.len());

  match name.rfind('.') {
    Some(i) => {
      let dot = offset + i;
      (&path[..dot], path[dot..].to_lowercase())
    }
    None => (path, String::new()),
  }
}

/// Download name for zip archives whose URL ends in a slash.
const ZIP_FALLBACK_NAME: &str = "archive.zip";

fn basename(url: &str) -> &str {
  url.rsplit('/').next().unwrap_or(url)
}

fn github_ball_kind(url: &str) -> Option<SourceKind> {
  let url = url.strip_suffix('/').unwrap_or(url);
  let parts: Vec<&str> = url.split('/').collect();
  if parts.len() <= 2 {
    return None;
  }
  if !parts[0].starts_with("http") || !parts[2].ends_with("github.com") {
    return None;
  }
  match parts[parts.len() - 2] {
    "zipball" => Some(SourceKind::Zip),
    "tarball" => Some(SourceKind::Tgz),
    _ => None,
  }
}

/// Build the fetch-and-extract pipeline for one source.
///
/// `scratch` is where zip archives are downloaded before unpacking. Returns
/// `None` when the URL is not a recognised archive.
pub fn source_command(dest: &str, url: &str, scratch: &Path) -> Option<String> {
  let kind = SourceKind::classify(url)?;
  let name = basename(url);

  let fetch = match kind {
    SourceKind::Tgz => format!("curl -s '{url}' | gunzip | tar -xvf -"),
    SourceKind::Tbz2 => format!("curl -s '{url}' | bunzip2 | tar -xvf -"),
    SourceKind::Zip => {
      let tmp = scratch.join(if name.is_empty() { ZIP_FALLBACK_NAME } else { name });
      let tmp = tmp.display();
      format!("curl -s -o '{tmp}' '{url}' && unzip -o '{tmp}'")
    }
    SourceKind::Tar => format!("curl -s '{url}' | tar -xvf -"),
    SourceKind::Gz => format!("curl -s '{url}' | gunzip > '{}'", splitext(name).0),
    SourceKind::Bz2 => format!("curl -s '{url}' | bunzip2 > '{}'", splitext(name).0),
  };

  Some(format!("mkdir -p '{dest}'; cd '{dest}'; {fetch}"))
}

/// Applies the `sources` category of a config section.
#[derive(Debug, Default)]
pub struct SourcesHandler {
  sources: BTreeMap<String, String>,
}

impl SourcesHandler {
  pub fn new(sources: BTreeMap<String, String>) -> Self {
    Self { sources }
  }

  /// Download and unpack every source. Scratch directories for zip
  /// downloads are removed once all sources have been processed.
  pub fn apply(&self, host: &dyn Host) {
    let mut scratch_dirs = Vec::new();

    for (dest, url) in &self.sources {
      let scratch = match TempDir::new() {
        Ok(dir) => dir,
        Err(e) => {
          error!(url = %url, error = %e, "failed to create scratch directory");
          continue;
        }
      };

      let Some(cmd) = source_command(dest, url, scratch.path()) else {
        debug!(url = %url, "unrecognised archive type, skipping");
        continue;
      };

      info!(dest = %dest, url = %url, "fetching source");
      let result = CommandRunner::shell(cmd).run_default(host);
      if !result.success() {
        debug!(dest = %dest, url = %url, status = ?result.status, "source pipeline returned non-zero");
      }

      if SourceKind::classify(url) == Some(SourceKind::Zip) {
        scratch_dirs.push(scratch);
      }
    }
  }
}
