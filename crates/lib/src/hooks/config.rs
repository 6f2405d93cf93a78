//! cfn-hup configuration.
//!
//! The configuration is INI text spread over several files (the main file,
//! `hooks.conf` and `hooks.d/*.conf`) read in order into one document:
//!
//! ```ini
//! [main]
//! stack=MyStack
//! credential-file=/etc/cfn/cfn-credentials
//! region=nova
//! interval=10
//!
//! [reload-app]
//! triggers=post.update
//! path=Resources.WebServer.Metadata
//! runas=root
//! action=/usr/local/bin/reload-app
//! ```
//!
//! Every section other than `main` declares a [`Hook`].

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::Hook;
use super::credentials::{Credentials, CredentialsError};

const MAIN_SECTION: &str = "main";
const DEFAULT_REGION: &str = "nova";
const DEFAULT_INTERVAL: u64 = 10;

#[derive(Debug, Error)]
pub enum HupConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("line {line}: option outside of any section")]
  MissingSectionHeader { line: usize },

  #[error("line {line}: cannot parse '{text}'")]
  Syntax { line: usize, text: String },

  #[error("no [{0}] section")]
  MissingSection(String),

  #[error("no option '{option}' in section [{section}]")]
  MissingOption { section: String, option: String },

  #[error("invalid interval '{0}'")]
  InvalidInterval(String),

  #[error("hook [{hook}] has no resource in path '{path}'")]
  InvalidHookPath { hook: String, path: String },

  #[error(transparent)]
  Credentials(#[from] CredentialsError),
}

/// Options of one INI section, keyed by lower-cased option name.
pub type IniSection = BTreeMap<String, String>;

/// Parsed INI text. Sections keep the order they first appeared in; a
/// section repeated later (possibly in another file) is merged into the
/// first, later values winning.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ini {
  sections: Vec<(String, IniSection)>,
}

impl Ini {
  pub fn section(&self, name: &str) -> Option<&IniSection> {
    self.sections.iter().find(|(n, _)| n == name).map(|(_, s)| s)
  }

  pub fn sections(&self) -> impl Iterator<Item = (&str, &IniSection)> {
    self.sections.iter().map(|(n, s)| (n.as_str(), s))
  }

  fn section_index(&mut self, name: &str) -> usize {
    match self.sections.iter().position(|(n, _)| n == name) {
      Some(idx) => idx,
      None => {
        self.sections.push((name.to_string(), IniSection::new()));
        self.sections.len() - 1
      }
    }
  }

  /// Parse `content` into this document.
  ///
  /// Supports `key = value` and `key: value`, `#`/`;` comment lines and
  /// indented continuation lines, which extend the previous value.
  pub fn read_str(&mut self, content: &str) -> Result<(), HupConfigError> {
    let mut current: Option<usize> = None;
    let mut last_key: Option<String> = None;

    for (idx, raw) in content.lines().enumerate() {
      let line_no = idx + 1;
      let line = raw.trim();

      if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        continue;
      }

      if raw.starts_with(char::is_whitespace) {
        if let (Some(section), Some(key)) = (current, &last_key) {
          let value = self.sections[section].1.entry(key.clone()).or_default();
          if !value.is_empty() {
            value.push('\n');
          }
          value.push_str(line);
          continue;
        }
      }

      if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
        current = Some(self.section_index(name.trim()));
        last_key = None;
        continue;
      }

      let Some(section) = current else {
        return Err(HupConfigError::MissingSectionHeader { line: line_no });
      };

      let split = line.find(['=', ':']).ok_or_else(|| HupConfigError::Syntax {
        line: line_no,
        text: line.to_string(),
      })?;
      let key = line[..split].trim().to_lowercase();
      let value = line[split + 1..].trim().to_string();
      if key.is_empty() {
        return Err(HupConfigError::Syntax {
          line: line_no,
          text: line.to_string(),
        });
      }

      self.sections[section].1.insert(key.clone(), value);
      last_key = Some(key);
    }

    Ok(())
  }

  /// Read and merge the file at `path`.
  pub fn read_file(&mut self, path: &Path) -> Result<(), HupConfigError> {
    let content = fs::read_to_string(path).map_err(|source| HupConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    self.read_str(&content)
  }
}

/// Parse a single INI text.
pub fn parse_ini(content: &str) -> Result<Ini, HupConfigError> {
  let mut ini = Ini::default();
  ini.read_str(content)?;
  Ok(ini)
}

fn required<'a>(section_name: &str, section: &'a IniSection, option: &str) -> Result<&'a str, HupConfigError> {
  section
    .get(option)
    .map(String::as_str)
    .ok_or_else(|| HupConfigError::MissingOption {
      section: section_name.to_string(),
      option: option.to_string(),
    })
}

/// The cfn-hup configuration: the `[main]` settings and the hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HupConfig {
  pub stack: String,
  pub credential_file: PathBuf,
  pub credentials: Credentials,
  pub region: String,
  /// Polling interval in minutes, for the external scheduler.
  pub interval: u64,
  pub hooks: Vec<Hook>,
}

impl HupConfig {
  /// Load the configuration from `paths`, read in order.
  pub fn load(paths: &[PathBuf]) -> Result<Self, HupConfigError> {
    let mut ini = Ini::default();
    for path in paths {
      debug!(path = %path.display(), "reading hook configuration");
      ini.read_file(path)?;
    }
    Self::from_ini(&ini)
  }

  /// Build the configuration from a parsed document. The credentials file
  /// named in `[main]` must be readable.
  pub fn from_ini(ini: &Ini) -> Result<Self, HupConfigError> {
    let main = ini
      .section(MAIN_SECTION)
      .ok_or_else(|| HupConfigError::MissingSection(MAIN_SECTION.to_string()))?;

    let stack = required(MAIN_SECTION, main, "stack")?.to_string();
    let credential_file = PathBuf::from(required(MAIN_SECTION, main, "credential-file")?);
    let credentials = Credentials::load(&credential_file)?;

    let region = main.get("region").cloned().unwrap_or_else(|| DEFAULT_REGION.to_string());
    let interval = match main.get("interval") {
      Some(raw) => raw
        .parse()
        .map_err(|_| HupConfigError::InvalidInterval(raw.clone()))?,
      None => DEFAULT_INTERVAL,
    };

    let mut hooks = Vec::new();
    for (name, section) in ini.sections().filter(|(name, _)| *name != MAIN_SECTION) {
      let path = required(name, section, "path")?;
      let hook = Hook::new(
        name,
        required(name, section, "triggers")?,
        path,
        required(name, section, "runas")?,
        required(name, section, "action")?,
      )
      .ok_or_else(|| HupConfigError::InvalidHookPath {
        hook: name.to_string(),
        path: path.to_string(),
      })?;
      hooks.push(hook);
    }

    Ok(Self {
      stack,
      credential_file,
      credentials,
      region,
      interval,
      hooks,
    })
  }

  /// Resources watched by at least one hook, in first-seen order.
  pub fn unique_resources(&self) -> Vec<String> {
    let mut resources: Vec<String> = Vec::new();
    for hook in &self.hooks {
      if !resources.iter().any(|r| r == hook.resource()) {
        resources.push(hook.resource().to_string());
      }
    }
    resources
  }
}
