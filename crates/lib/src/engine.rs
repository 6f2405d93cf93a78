//! The reconciliation engine.
//!
//! [`Engine::apply`] converges the host to a metadata document (cfn-init);
//! [`Engine::hup_pass`] re-checks services and notifies hooks about
//! metadata changes (cfn-hup).

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::accounts::{GroupsHandler, UsersHandler};
use crate::commands::{CommandsError, CommandsHandler};
use crate::configsets::{ConfigSetError, ConfigSets};
use crate::consts::{CONFIGSETS_KEY, DEFAULT_SECTION, EVENT_POST_UPDATE, INIT_KEY};
use crate::exec::Host;
use crate::files::{FilesError, FilesHandler};
use crate::hooks::Hook;
use crate::metadata::Metadata;
use crate::packages::PackagesHandler;
use crate::services::ServicesHandler;
use crate::sources::SourcesHandler;
use crate::util::is_truthy;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("invalid metadata: missing or empty {INIT_KEY} section")]
  InvalidMetadata,

  #[error("could not find '{section}' set in template (requested by '{selection}'), may need to specify another set")]
  SectionNotFound { section: String, selection: String },

  #[error("invalid '{category}' in section '{section}': {source}")]
  Schema {
    section: String,
    category: &'static str,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  ConfigSets(#[from] ConfigSetError),

  #[error(transparent)]
  Commands(#[from] CommandsError),

  #[error(transparent)]
  Files(#[from] FilesError),
}

/// The init document inside `document`, when present and non-empty.
pub fn init_document(document: &Value) -> Option<&Value> {
  document.get(INIT_KEY).filter(|v| is_truthy(v))
}

fn category<T>(section: &str, config: &Value, key: &'static str) -> Result<T, EngineError>
where
  T: DeserializeOwned + Default,
{
  match config.get(key) {
    None | Some(Value::Null) => Ok(T::default()),
    Some(value) => serde_json::from_value(value.clone()).map_err(|source| EngineError::Schema {
      section: section.to_string(),
      category: key,
      source,
    }),
  }
}

/// Drives reconciliation passes against a host.
pub struct Engine<'a> {
  host: &'a dyn Host,
}

impl<'a> Engine<'a> {
  pub fn new(host: &'a dyn Host) -> Self {
    Self { host }
  }

  /// Apply the sections selected by `configsets` (comma separated) from
  /// `document`.
  pub fn apply(&self, document: &Value, configsets: Option<&str>) -> Result<(), EngineError> {
    let init = init_document(document).ok_or(EngineError::InvalidMetadata)?;

    let sets = ConfigSets::new(init.get(CONFIGSETS_KEY))?;
    let sections = sets.resolve(configsets)?;
    let selection = sets.selection(configsets);

    for section in &sections {
      let config = init.get(section).ok_or_else(|| EngineError::SectionNotFound {
        section: section.clone(),
        selection: selection.to_string(),
      })?;
      self.apply_section(section, config)?;
    }

    Ok(())
  }

  /// Apply one config section: packages, sources, groups, users, files,
  /// commands, then services.
  pub fn apply_section(&self, section: &str, config: &Value) -> Result<(), EngineError> {
    info!(section = %section, "applying config section");

    PackagesHandler::new(category(section, config, "packages")?).apply(self.host);
    SourcesHandler::new(category(section, config, "sources")?).apply(self.host);
    GroupsHandler::new(category(section, config, "groups")?).apply(self.host);
    UsersHandler::new(category(section, config, "users")?).apply(self.host);
    FilesHandler::new(category(section, config, "files")?).apply()?;
    CommandsHandler::new(category(section, config, "commands")?).apply(self.host)?;
    ServicesHandler::new(category(section, config, "services")?).apply(self.host);

    Ok(())
  }

  /// One cfn-hup pass: restart services of the `config` section that should
  /// be running, then fire `post.update` to every hook if the metadata
  /// changed since the last snapshot.
  pub fn hup_pass(&self, metadata: &Metadata, hooks: &[Hook]) -> Result<(), EngineError> {
    let Some(document) = metadata.document() else {
      debug!("no metadata retrieved, skipping pass");
      return Ok(());
    };

    let working = match init_document(document) {
      Some(init) => init,
      None => {
        debug!("metadata does not contain a {} section", INIT_KEY);
        document
      }
    };
    let resource = metadata.resource().unwrap_or_default();

    if let Some(config) = working.get(DEFAULT_SECTION) {
      let services = category(DEFAULT_SECTION, config, "services")?;
      ServicesHandler::new(services).monitor(self.host, resource, hooks);
    }

    if metadata.has_changed() {
      info!(resource = %resource, "metadata changed, notifying hooks");
      for hook in hooks {
        hook.event(self.host, EVENT_POST_UPDATE, resource, resource);
      }
    }

    Ok(())
  }
}
