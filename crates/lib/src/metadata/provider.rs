//! Metadata sources.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("unable to retrieve metadata: {0}")]
  Connection(String),
}

/// Metadata as handed over by a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMetadata {
  /// JSON text, parsed by the caller.
  Text(String),
  Value(Value),
}

/// Supplies the current metadata document.
pub trait MetadataProvider {
  fn fetch(&self) -> Result<RawMetadata, ProviderError>;
}

impl<F> MetadataProvider for F
where
  F: Fn() -> Result<RawMetadata, ProviderError>,
{
  fn fetch(&self) -> Result<RawMetadata, ProviderError> {
    self()
  }
}

/// Reads the metadata from a local file.
#[derive(Debug, Clone)]
pub struct FileProvider {
  path: PathBuf,
}

impl FileProvider {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl MetadataProvider for FileProvider {
  fn fetch(&self) -> Result<RawMetadata, ProviderError> {
    fs::read_to_string(&self.path)
      .map(RawMetadata::Text)
      .map_err(|e| ProviderError::Connection(format!("{}: {}", self.path.display(), e)))
  }
}

/// A provider with no reachable source. Retrieval always falls back to the
/// local snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unreachable;

impl MetadataProvider for Unreachable {
  fn fetch(&self) -> Result<RawMetadata, ProviderError> {
    Err(ProviderError::Connection("no metadata source configured".to_string()))
  }
}
