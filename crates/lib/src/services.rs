//! Service supervision.
//!
//! The `services` category maps an init system to the services it manages:
//!
//! ```json
//! { "sysvinit": { "httpd": { "enabled": "true", "ensureRunning": "true" } } }
//! ```
//!
//! Both `systemd` and `sysvinit` entries are driven through whichever control
//! binaries exist on the host, probed again for every action.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::consts::EVENT_SERVICE_RESTARTED;
use crate::exec::{CommandResult, CommandRunner, Host};
use crate::hooks::Hook;
use crate::util::to_boolean;

const SYSTEMCTL: &str = "/bin/systemctl";
const SBIN_SERVICE: &str = "/sbin/service";
const USR_SBIN_SERVICE: &str = "/usr/sbin/service";
const CHKCONFIG: &str = "/sbin/chkconfig";
const UPDATE_RC_D: &str = "/usr/sbin/update-rc.d";

/// Desired state of one service. Absent keys are not managed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
  #[serde(default)]
  pub enabled: Option<Value>,
  #[serde(default)]
  pub ensure_running: Option<Value>,
}

/// Init system name -> service name -> desired state.
pub type ServiceRequest = BTreeMap<String, BTreeMap<String, ServiceEntry>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
  Enable,
  Disable,
  Start,
  Stop,
  Status,
}

impl ServiceAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Enable => "enable",
      Self::Disable => "disable",
      Self::Start => "start",
      Self::Stop => "stop",
      Self::Status => "status",
    }
  }
}

impl fmt::Display for ServiceAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Supported init systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceManager {
  Systemd,
  Sysvinit,
  Unsupported(String),
}

impl ServiceManager {
  pub fn from_name(name: &str) -> Self {
    match name {
      "systemd" => Self::Systemd,
      "sysvinit" => Self::Sysvinit,
      other => Self::Unsupported(other.to_string()),
    }
  }

  /// The concrete command for `action` on `service`, given the control
  /// binaries present on `host`.
  pub fn command(host: &dyn Host, service: &str, action: ServiceAction) -> CommandRunner {
    let systemctl = host.exists(Path::new(SYSTEMCTL));
    let unit = format!("{service}.service");

    match action {
      ServiceAction::Start | ServiceAction::Stop | ServiceAction::Status => {
        if systemctl {
          CommandRunner::argv([SYSTEMCTL, action.as_str(), unit.as_str()])
        } else if host.exists(Path::new(SBIN_SERVICE)) {
          CommandRunner::argv([SBIN_SERVICE, service, action.as_str()])
        } else {
          CommandRunner::argv([USR_SBIN_SERVICE, service, action.as_str()])
        }
      }
      ServiceAction::Enable | ServiceAction::Disable => {
        let on = action == ServiceAction::Enable;
        if systemctl {
          CommandRunner::argv([SYSTEMCTL, action.as_str(), unit.as_str()])
        } else if host.exists(Path::new(CHKCONFIG)) {
          CommandRunner::argv([CHKCONFIG, service, if on { "on" } else { "off" }])
        } else {
          CommandRunner::argv([UPDATE_RC_D, service, action.as_str()])
        }
      }
    }
  }

  /// Run `action` on `service`. Unsupported managers run nothing.
  pub fn run(&self, host: &dyn Host, service: &str, action: ServiceAction) -> Option<CommandResult> {
    match self {
      Self::Systemd | Self::Sysvinit => Some(Self::command(host, service, action).run_default(host)),
      Self::Unsupported(_) => None,
    }
  }

  fn is_running(&self, host: &dyn Host, service: &str) -> bool {
    self
      .run(host, service, ServiceAction::Status)
      .is_some_and(|r| r.success())
  }
}

/// Applies and monitors the `services` category of a config section.
#[derive(Debug, Default)]
pub struct ServicesHandler {
  services: ServiceRequest,
}

impl ServicesHandler {
  pub fn new(services: ServiceRequest) -> Self {
    Self { services }
  }

  fn managers(&self) -> impl Iterator<Item = (ServiceManager, &BTreeMap<String, ServiceEntry>)> {
    self.services.iter().filter_map(|(name, entries)| match ServiceManager::from_name(name) {
      ServiceManager::Unsupported(name) => {
        warn!(manager = %name, "skipping invalid service type");
        None
      }
      manager => Some((manager, entries)),
    })
  }

  /// Bring services to their declared enabled and running state.
  pub fn apply(&self, host: &dyn Host) {
    for (manager, entries) in self.managers() {
      for (service, entry) in entries {
        if let Some(enabled) = &entry.enabled {
          if to_boolean(enabled) {
            info!(service = %service, "enabling service");
            manager.run(host, service, ServiceAction::Enable);
          } else {
            info!(service = %service, "disabling service");
            manager.run(host, service, ServiceAction::Disable);
          }
        }

        if let Some(ensure_running) = &entry.ensure_running {
          let ensure_running = to_boolean(ensure_running);
          let running = manager.is_running(host, service);
          if ensure_running && !running {
            info!(service = %service, "starting service");
            manager.run(host, service, ServiceAction::Start);
          } else if !ensure_running && running {
            info!(service = %service, "stopping service");
            manager.run(host, service, ServiceAction::Stop);
          }
        }
      }
    }
  }

  /// Restart services that should be running but are not, notifying every
  /// hook with `service.restarted` after each restart attempt, whether or
  /// not it succeeded.
  pub fn monitor(&self, host: &dyn Host, resource: &str, hooks: &[Hook]) {
    for (manager, entries) in self.managers() {
      for (service, entry) in entries {
        let Some(ensure_running) = &entry.ensure_running else {
          continue;
        };
        if !to_boolean(ensure_running) || manager.is_running(host, service) {
          continue;
        }

        warn!(service = %service, "restarting service");
        if let Some(result) = manager.run(host, service, ServiceAction::Start)
          && !result.success()
        {
          warn!(service = %service, stderr = %result.stderr, "service did not start");
        }

        for hook in hooks {
          hook.event(host, EVENT_SERVICE_RESTARTED, service, resource);
        }
      }
    }
  }
}
