//! Metadata retrieval.
//!
//! [`Metadata::retrieve`] asks the provider for the current document and
//! falls back to local files when it is unreachable:
//!
//! 1. the per-resource snapshot (`last_metadata_<resource>`)
//! 2. the global snapshot (`last_metadata`)
//! 3. the boot-time document (`cfn-init-data`)
//!
//! The first file that reads and parses wins. The retrieved document is
//! compared with the last snapshot to detect drift and then saved as the
//! new snapshot.

mod provider;

use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::snapshot::{SnapshotError, SnapshotStore};

pub use provider::{FileProvider, MetadataProvider, ProviderError, RawMetadata, Unreachable};

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error(transparent)]
  Snapshot(#[from] SnapshotError),
}

/// Split the first segment off a dotted key. Segments containing dots are
/// quoted: `foo.'bar.1'.baz`.
fn split_key(key: &str) -> Option<(&str, &str)> {
  fn rest_after(tail: &str) -> Option<&str> {
    if tail.is_empty() {
      Some(tail)
    } else {
      tail.strip_prefix('.')
    }
  }

  if let Some(quoted) = key.strip_prefix('\'')
    && let Some(end) = quoted.find('\'')
    && end > 0
    && let Some(rest) = rest_after(&quoted[end + 1..])
  {
    return Some((&quoted[..end], rest));
  }

  let end = key.find('.').unwrap_or(key.len());
  if end == 0 {
    return None;
  }
  Some((&key[..end], rest_after(&key[end..])?))
}

/// The metadata document of one stack resource.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
  stack: String,
  resource: Option<String>,
  document: Option<Value>,
  changed: bool,
}

impl Metadata {
  pub fn new(stack: &str, resource: Option<&str>) -> Self {
    Self {
      stack: stack.to_string(),
      resource: resource.map(String::from),
      ..Self::default()
    }
  }

  /// Wrap an already retrieved document.
  pub fn from_document(stack: &str, resource: Option<&str>, document: Value, changed: bool) -> Self {
    Self {
      document: Some(document),
      changed,
      ..Self::new(stack, resource)
    }
  }

  pub fn stack(&self) -> &str {
    &self.stack
  }

  pub fn resource(&self) -> Option<&str> {
    self.resource.as_deref()
  }

  /// The retrieved document, if any.
  pub fn document(&self) -> Option<&Value> {
    self.document.as_ref()
  }

  /// Whether the retrieved document differs from the last snapshot.
  pub fn has_changed(&self) -> bool {
    self.changed
  }

  fn fetch(&self, provider: &dyn MetadataProvider) -> Option<Value> {
    match provider.fetch() {
      Ok(RawMetadata::Value(value)) => Some(value),
      Ok(RawMetadata::Text(text)) => match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
          warn!(error = %e, "retrieved metadata is not valid JSON");
          None
        }
      },
      Err(e) => {
        warn!(error = %e, "unable to retrieve remote metadata");
        None
      }
    }
  }

  /// Retrieve the document and refresh the snapshots.
  ///
  /// Returns `Ok(false)` when no source yielded a document; the pass should
  /// then be skipped.
  pub fn retrieve(
    &mut self,
    provider: &dyn MetadataProvider,
    default_path: &Path,
    last_path: &Path,
  ) -> Result<bool, MetadataError> {
    let store = SnapshotStore::new(last_path, self.resource.as_deref());

    let document = match self.fetch(provider) {
      Some(document) => document,
      None => {
        let resource_path = store.resource_path();
        let fallback = [resource_path.as_path(), last_path, default_path]
          .into_iter()
          .find_map(|path| {
            let value = SnapshotStore::read(path)?;
            info!(path = %path.display(), "opened local metadata");
            Some(value)
          });

        match fallback {
          Some(document) => document,
          None => {
            error!("unable to read any valid metadata");
            return Ok(false);
          }
        }
      }
    };

    self.changed = store.load_last().as_ref() != Some(&document);
    store.save(&document)?;
    self.document = Some(document);
    Ok(true)
  }

  /// Value at a dotted `key`, e.g. `AWS::CloudFormation::Init.config`.
  /// Segments containing dots are single-quoted.
  pub fn lookup(&self, key: &str) -> Option<&Value> {
    let mut value = self.document.as_ref()?;
    let mut key = key;

    while !key.is_empty() {
      let (segment, rest) = split_key(key)?;
      value = value.as_object()?.get(segment)?;
      key = rest;
    }

    Some(value)
  }

  /// JSON text of the whole document or of the value at `key`.
  pub fn display(&self, key: Option<&str>) -> Option<String> {
    let value = match key {
      Some(key) => self.lookup(key)?,
      None => self.document.as_ref()?,
    };
    Some(value.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::fs;
  use tempfile::TempDir;

  struct Paths {
    _temp: TempDir,
    default: std::path::PathBuf,
    last: std::path::PathBuf,
  }

  fn paths() -> Paths {
    let temp = TempDir::new().unwrap();
    Paths {
      default: temp.path().join("lib/cfn-init-data"),
      last: temp.path().join("cache/last_metadata"),
      _temp: temp,
    }
  }

  fn value(doc: Value) -> impl Fn() -> Result<RawMetadata, ProviderError> {
    move || Ok(RawMetadata::Value(doc.clone()))
  }

  #[test]
  fn provider_document_is_used_and_saved() {
    let p = paths();
    let mut md = Metadata::new("stack", Some("Web"));

    assert!(md.retrieve(&value(json!({"a": 1})), &p.default, &p.last).unwrap());

    assert_eq!(md.document(), Some(&json!({"a": 1})));
    assert!(md.has_changed());
    assert_eq!(SnapshotStore::read(&p.last), Some(json!({"a": 1})));
    assert_eq!(SnapshotStore::read(&p.last.with_file_name("last_metadata_Web")), Some(json!({"a": 1})));
  }

  #[test]
  fn text_documents_are_parsed() {
    let p = paths();
    let mut md = Metadata::new("stack", None);
    let provider = || -> Result<RawMetadata, ProviderError> { Ok(RawMetadata::Text(r#"{"b": [true]}"#.to_string())) };
    assert!(md.retrieve(&provider, &p.default, &p.last).unwrap());
    assert_eq!(md.document(), Some(&json!({"b": [true]})));
  }

  #[test]
  fn same_document_twice_is_not_a_change() {
    let p = paths();
    let provider = value(json!({"a": 1}));

    let mut first = Metadata::new("stack", Some("Web"));
    first.retrieve(&provider, &p.default, &p.last).unwrap();
    let mut second = Metadata::new("stack", Some("Web"));
    second.retrieve(&provider, &p.default, &p.last).unwrap();

    assert!(first.has_changed());
    assert!(!second.has_changed());

    let mut third = Metadata::new("stack", Some("Web"));
    third.retrieve(&value(json!({"a": 2})), &p.default, &p.last).unwrap();
    assert!(third.has_changed());
  }

  #[test]
  fn unreachable_provider_falls_back_in_order() {
    let p = paths();
    fs::create_dir_all(p.default.parent().unwrap()).unwrap();
    fs::create_dir_all(p.last.parent().unwrap()).unwrap();
    fs::write(&p.default, r#"{"from": "default"}"#).unwrap();

    let mut md = Metadata::new("stack", Some("Web"));
    assert!(md.retrieve(&Unreachable, &p.default, &p.last).unwrap());
    assert_eq!(md.document(), Some(&json!({"from": "default"})));

    // The resource snapshot now exists and wins over the default document.
    fs::write(p.last.with_file_name("last_metadata_Web"), r#"{"from": "resource"}"#).unwrap();
    let mut md = Metadata::new("stack", Some("Web"));
    md.retrieve(&Unreachable, &p.default, &p.last).unwrap();
    assert_eq!(md.document(), Some(&json!({"from": "resource"})));
  }

  #[test]
  fn malformed_fallbacks_are_skipped() {
    let p = paths();
    fs::create_dir_all(p.default.parent().unwrap()).unwrap();
    fs::create_dir_all(p.last.parent().unwrap()).unwrap();
    fs::write(&p.last, "{broken").unwrap();
    fs::write(&p.default, r#"{"ok": 1}"#).unwrap();

    let mut md = Metadata::new("stack", None);
    assert!(md.retrieve(&Unreachable, &p.default, &p.last).unwrap());
    assert_eq!(md.document(), Some(&json!({"ok": 1})));
  }

  #[test]
  fn total_failure_skips_the_pass() {
    let p = paths();
    let mut md = Metadata::new("stack", Some("Web"));
    assert!(!md.retrieve(&Unreachable, &p.default, &p.last).unwrap());
    assert!(md.document().is_none());
    assert!(!p.last.exists());
  }

  #[test]
  fn invalid_provider_text_falls_back() {
    let p = paths();
    fs::create_dir_all(p.default.parent().unwrap()).unwrap();
    fs::write(&p.default, r#"{"ok": 2}"#).unwrap();

    let mut md = Metadata::new("stack", None);
    let provider = || -> Result<RawMetadata, ProviderError> { Ok(RawMetadata::Text("not json".to_string())) };
    assert!(md.retrieve(&provider, &p.default, &p.last).unwrap());
    assert_eq!(md.document(), Some(&json!({"ok": 2})));
  }

  #[test]
  fn lookup_handles_quoted_segments() {
    let md = Metadata::from_document(
      "stack",
      None,
      json!({"foo": {"bar.1": {"baz": 3}, "plain": "x"}, "list": [1]}),
      false,
    );

    assert_eq!(md.lookup("foo.plain"), Some(&json!("x")));
    assert_eq!(md.lookup("foo.'bar.1'.baz"), Some(&json!(3)));
    assert_eq!(md.lookup("'foo'"), Some(&json!({"bar.1": {"baz": 3}, "plain": "x"})));
    assert_eq!(md.lookup("foo.missing"), None);
    assert_eq!(md.lookup("list.0"), None);
    assert_eq!(md.lookup("foo..plain"), None);
  }

  #[test]
  fn display_renders_json() {
    let md = Metadata::from_document("stack", None, json!({"a": {"b": "c"}}), false);
    assert_eq!(md.display(None).unwrap(), r#"{"a":{"b":"c"}}"#);
    assert_eq!(md.display(Some("a.b")).unwrap(), r#""c""#);
    assert_eq!(md.display(Some("nope")), None);
    assert_eq!(Metadata::new("stack", None).display(None), None);
  }
}
