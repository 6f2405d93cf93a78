mod get_metadata;
mod hup;
mod init;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

use cfnboot_lib::metadata::{FileProvider, Metadata, MetadataProvider, Unreachable};
use cfnboot_lib::paths;

pub use get_metadata::{GetMetadataArgs, cmd_get_metadata};
pub use hup::{HupArgs, cmd_hup};
pub use init::{InitArgs, cmd_init};

/// Where metadata comes from and where snapshots go.
#[derive(Debug, Args)]
pub struct SourceArgs {
  /// Read the current metadata from this file instead of the remote API
  #[arg(long, value_name = "PATH")]
  pub metadata_file: Option<PathBuf>,

  /// Path of the last-metadata snapshot
  #[arg(long, value_name = "PATH")]
  pub cache_path: Option<PathBuf>,
}

impl SourceArgs {
  fn provider(&self) -> Box<dyn MetadataProvider> {
    match &self.metadata_file {
      Some(path) => Box::new(FileProvider::new(path)),
      None => Box::new(Unreachable),
    }
  }

  fn last_path(&self) -> PathBuf {
    self.cache_path.clone().unwrap_or_else(paths::last_metadata_path)
  }

  /// Retrieve the metadata of `resource`, refreshing the snapshots.
  ///
  /// Returns `None` when neither the provider nor any local copy yielded a
  /// document.
  pub fn retrieve(&self, stack: &str, resource: Option<&str>) -> Result<Option<Metadata>> {
    let mut metadata = Metadata::new(stack, resource);
    let found = metadata
      .retrieve(
        self.provider().as_ref(),
        &paths::default_metadata_path(),
        &self.last_path(),
      )
      .context("Failed to store metadata snapshot")?;

    Ok(found.then_some(metadata))
  }

  /// Like [`retrieve`](Self::retrieve), but a missing document is an error.
  pub fn require(&self, stack: &str, resource: Option<&str>) -> Result<Metadata> {
    match self.retrieve(stack, resource)? {
      Some(metadata) => Ok(metadata),
      None => bail!("No valid metadata found for stack '{}'", stack),
    }
  }
}
