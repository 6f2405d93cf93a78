//! Default on-disk locations.
//!
//! Every directory can be redirected with an environment variable, which is
//! how tests and non-standard images relocate state:
//! - `CFNBOOT_DATA_DIR` (default `/var/lib/heat-cfntools`)
//! - `CFNBOOT_CACHE_DIR` (default `/var/cache/heat-cfntools`)
//! - `CFNBOOT_CONFIG_DIR` (default `/etc/cfn`)

use std::path::PathBuf;

use crate::consts::{
  HOOKS_DIRNAME, HOOKS_FILENAME, HUP_CONFIG_FILENAME, INIT_DATA_FILENAME, LAST_METADATA_FILENAME,
};

const DEFAULT_DATA_DIR: &str = "/var/lib/heat-cfntools";
const DEFAULT_CACHE_DIR: &str = "/var/cache/heat-cfntools";
const DEFAULT_CONFIG_DIR: &str = "/etc/cfn";

fn dir_from_env(var: &str, default: &str) -> PathBuf {
  std::env::var(var)
    .ok()
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(default))
}

/// Returns the directory holding provisioning data (the boot-time metadata).
pub fn data_dir() -> PathBuf {
  dir_from_env("CFNBOOT_DATA_DIR", DEFAULT_DATA_DIR)
}

/// Returns the directory holding the last applied metadata snapshot.
pub fn cache_dir() -> PathBuf {
  dir_from_env("CFNBOOT_CACHE_DIR", DEFAULT_CACHE_DIR)
}

/// Returns the directory holding cfn-hup configuration and credentials.
pub fn config_dir() -> PathBuf {
  dir_from_env("CFNBOOT_CONFIG_DIR", DEFAULT_CONFIG_DIR)
}

/// The metadata document written by the provisioning layer, used as the last
/// resort when the provider and the snapshots are unavailable.
pub fn default_metadata_path() -> PathBuf {
  data_dir().join(INIT_DATA_FILENAME)
}

/// The global last-applied snapshot.
pub fn last_metadata_path() -> PathBuf {
  cache_dir().join(LAST_METADATA_FILENAME)
}

/// The cfn-hup configuration files in load order: the main file, the hooks
/// file, then every `*.conf` in `hooks.d` sorted by name. Missing files are
/// left out.
pub fn hup_config_paths() -> Vec<PathBuf> {
  let dir = config_dir();
  let mut paths: Vec<PathBuf> = [dir.join(HUP_CONFIG_FILENAME), dir.join(HOOKS_FILENAME)]
    .into_iter()
    .filter(|p| p.is_file())
    .collect();

  if let Ok(entries) = std::fs::read_dir(dir.join(HOOKS_DIRNAME)) {
    let mut extra: Vec<PathBuf> = entries
      .filter_map(|e| e.ok())
      .map(|e| e.path())
      .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "conf"))
      .collect();
    extra.sort();
    paths.extend(extra);
  }

  paths
}
