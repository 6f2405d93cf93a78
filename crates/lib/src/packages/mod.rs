//! Package installation.
//!
//! The `packages` category maps a package manager to the packages it should
//! provide:
//!
//! ```json
//! { "yum": { "httpd": [], "mysql": "5.5.20", "php": ["5.3", "5.4"] } }
//! ```
//!
//! RPM-based managers (yum, dnf, zypper) decide per package between install,
//! upgrade, downgrade and nothing, then issue one batched install and one
//! batched downgrade. The other managers install unconditionally.

pub mod version;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::exec::{CommandRunner, Host, RunOptions};

pub use version::{VersionSpec, compare_versions, newest_version, rpmvercmp};

/// Package name -> requested version(s) for one manager.
pub type PackageEntries = BTreeMap<String, VersionSpec>;

/// Manager name -> its package entries, as found in a config section.
pub type PackageRequest = BTreeMap<String, PackageEntries>;

/// Managers processed first, in this order. Others follow alphabetically.
const PACKAGE_ORDER: [&str; 5] = ["dpkg", "rpm", "apt", "yum", "dnf"];

/// Supported package managers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageManager {
  Yum,
  Dnf,
  Zypper,
  /// Low-level archive installer; no version-aware store, nothing installed.
  Rpm,
  Apt,
  Rubygems,
  Python,
  Unsupported(String),
}

impl PackageManager {
  pub fn from_name(name: &str) -> Self {
    match name {
      "yum" => Self::Yum,
      "dnf" => Self::Dnf,
      "zypper" => Self::Zypper,
      "rpm" => Self::Rpm,
      "apt" => Self::Apt,
      "rubygems" => Self::Rubygems,
      "python" => Self::Python,
      other => Self::Unsupported(other.to_string()),
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Yum => "yum",
      Self::Dnf => "dnf",
      Self::Zypper => "zypper",
      Self::Rpm => "rpm",
      Self::Apt => "apt",
      Self::Rubygems => "rubygems",
      Self::Python => "python",
      Self::Unsupported(name) => name,
    }
  }

  fn is_rpm_frontend(&self) -> bool {
    matches!(self, Self::Yum | Self::Dnf | Self::Zypper)
  }

  /// Whether `pkg` (a name, optionally suffixed with `-version`) is installed.
  pub fn probe_installed(&self, host: &dyn Host, pkg: &str) -> bool {
    match self {
      Self::Yum | Self::Dnf | Self::Zypper | Self::Rpm => {
        CommandRunner::argv(["rpm", "-q", pkg]).run_default(host).success()
      }
      _ => false,
    }
  }

  /// Whether the manager's repositories offer exactly `pkg`.
  pub fn probe_available(&self, host: &dyn Host, pkg: &str) -> bool {
    let runner = match self {
      Self::Yum => CommandRunner::argv(["yum", "-y", "--showduplicates", "list", "available", pkg]),
      Self::Dnf => CommandRunner::argv(["dnf", "-y", "--showduplicates", "list", "available", pkg]),
      Self::Zypper => CommandRunner::argv(["zypper", "-n", "--no-refresh", "search", pkg]),
      _ => return true,
    };
    runner.run_default(host).success()
  }

  /// Install (or upgrade) all `packages` in a single invocation.
  pub fn install(&self, host: &dyn Host, packages: &[String]) {
    let (base, options) = match self {
      Self::Yum => (vec!["yum", "-y", "install"], RunOptions::default()),
      Self::Dnf => (vec!["dnf", "-y", "--best", "install"], RunOptions::default()),
      Self::Zypper => (vec!["zypper", "-n", "install"], RunOptions::default()),
      Self::Apt => {
        let mut options = RunOptions::default();
        options.env = Some(BTreeMap::from([(
          "DEBIAN_FRONTEND".to_string(),
          "noninteractive".to_string(),
        )]));
        (vec!["apt-get", "-y", "install"], options)
      }
      _ => return,
    };

    let args: Vec<String> = base.iter().map(|s| s.to_string()).chain(packages.iter().cloned()).collect();
    info!(manager = self.name(), packages = ?packages, "installing packages");
    let result = CommandRunner::argv(args).run(host, &options);
    if !result.success() {
      warn!(manager = self.name(), packages = ?packages, status = ?result.status, "failed to install packages");
    }
  }

  /// Downgrade all `packages` in a single invocation.
  pub fn downgrade(&self, host: &dyn Host, packages: &[String]) {
    let base = match self {
      Self::Yum => vec!["yum", "-y", "downgrade"],
      Self::Dnf => vec!["dnf", "-y", "downgrade"],
      Self::Zypper => vec!["zypper", "-n", "install", "--oldpackage"],
      _ => return,
    };

    let args: Vec<String> = base.iter().map(|s| s.to_string()).chain(packages.iter().cloned()).collect();
    info!(manager = self.name(), packages = ?packages, "downgrading packages");
    let result = CommandRunner::argv(args).run_default(host);
    if !result.success() {
      warn!(manager = self.name(), packages = ?packages, status = ?result.status, "failed to downgrade packages");
    }
  }

  /// Reconcile one manager's entries against the host.
  pub fn apply(&self, host: &dyn Host, entries: &PackageEntries) {
    match self {
      Self::Yum => {
        // Hosts without yum get the same request through dnf.
        let which = CommandRunner::argv(["which", "yum"]).run_default(host);
        match which.status {
          Some(1) => {
            info!("yum not available, using dnf");
            return Self::Dnf.apply(host, entries);
          }
          Some(127) => info!("`which` not found, using yum without checking for dnf"),
          _ => {}
        }
        self.apply_rpm_family(host, entries);
      }
      Self::Dnf | Self::Zypper => self.apply_rpm_family(host, entries),
      Self::Rpm => {
        if !entries.is_empty() {
          warn!(packages = ?entries.keys().collect::<Vec<_>>(), "rpm package installs are not supported, skipping");
        }
      }
      Self::Apt => {
        let packages: Vec<String> = entries.keys().cloned().collect();
        if !packages.is_empty() {
          self.install(host, &packages);
        }
      }
      Self::Rubygems => {
        for (name, spec) in entries {
          let mut args = vec!["gem", "install", "-b", "-y"];
          if let Some(version) = spec.first() {
            args.extend(["--version", version]);
          }
          args.push(name);
          CommandRunner::argv(args).run_default(host);
        }
      }
      Self::Python => {
        for name in entries.keys() {
          CommandRunner::argv(["easy_install", name.as_str()]).run_default(host);
        }
      }
      Self::Unsupported(name) => warn!(manager = %name, "skipping invalid package type"),
    }
  }

  fn apply_rpm_family(&self, host: &dyn Host, entries: &PackageEntries) {
    let plan = self.plan(host, entries);
    if !plan.installs.is_empty() {
      self.install(host, &plan.installs);
    }
    if !plan.downgrades.is_empty() {
      self.downgrade(host, &plan.downgrades);
    }
  }

  /// Decide, for an RPM-based manager, which packages to install and which
  /// to downgrade.
  pub fn plan(&self, host: &dyn Host, entries: &PackageEntries) -> PackagePlan {
    let mut plan = PackagePlan::default();
    if !self.is_rpm_frontend() {
      return plan;
    }

    for (name, spec) in entries {
      let version = newest_version(spec);
      let pkg = match &version {
        Some(v) => format!("{}-{}", name, v),
        None => name.clone(),
      };

      if self.probe_installed(host, &pkg) {
        debug!(package = %pkg, "already installed");
        continue;
      }

      if !self.probe_available(host, &pkg) {
        warn!(package = %pkg, manager = self.name(), "skipping package, not available");
        continue;
      }

      let Some(version) = version else {
        plan.installs.push(pkg);
        continue;
      };

      let installed = rpm_package_version(host, name);
      match compare_versions(installed.as_deref(), Some(&version)) {
        Ordering::Less => plan.installs.push(pkg),
        Ordering::Greater => plan.downgrades.push(pkg),
        Ordering::Equal => debug!(package = %pkg, "installed version matches"),
      }
    }

    plan
  }
}

/// Packages batched for one RPM-based manager.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackagePlan {
  pub installs: Vec<String>,
  pub downgrades: Vec<String>,
}

/// Installed `VERSION-RELEASE` of a package, if any.
pub fn rpm_package_version(host: &dyn Host, name: &str) -> Option<String> {
  let result = CommandRunner::argv(["rpm", "-q", "--queryformat", "%{VERSION}-%{RELEASE}", name]).run_default(host);
  let version = result.stdout.trim();
  if result.success() && !version.is_empty() {
    Some(version.to_string())
  } else {
    None
  }
}

/// Order manager names: the known low-level managers first, then the rest
/// alphabetically (case-insensitive).
pub fn manager_order(a: &str, b: &str) -> Ordering {
  let pa = PACKAGE_ORDER.iter().position(|m| *m == a);
  let pb = PACKAGE_ORDER.iter().position(|m| *m == b);
  match (pa, pb) {
    (Some(x), Some(y)) => x.cmp(&y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => a.to_lowercase().cmp(&b.to_lowercase()),
  }
}

/// Applies the `packages` category of a config section.
#[derive(Debug, Default)]
pub struct PackagesHandler {
  packages: PackageRequest,
}

impl PackagesHandler {
  pub fn new(packages: PackageRequest) -> Self {
    Self { packages }
  }

  /// Install, upgrade or downgrade every listed package, manager by manager.
  pub fn apply(&self, host: &dyn Host) {
    if self.packages.is_empty() {
      return;
    }

    let mut managers: Vec<(&String, &PackageEntries)> = self.packages.iter().collect();
    managers.sort_by(|a, b| manager_order(a.0, b.0));

    for (manager, entries) in managers {
      PackageManager::from_name(manager).apply(host, entries);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::FakeHost;
  use tracing_test::traced_test;

  fn entries(pairs: &[(&str, VersionSpec)]) -> PackageEntries {
    pairs.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
  }

  fn any() -> VersionSpec {
    VersionSpec::default()
  }

  fn exact(v: &str) -> VersionSpec {
    VersionSpec::Single(v.to_string())
  }

  #[test]
  fn manager_order_puts_low_level_first() {
    let mut names = vec!["zypper", "yum", "Python", "apt", "rpm", "dpkg", "dnf", "rubygems"];
    names.sort_by(|a, b| manager_order(a, b));
    assert_eq!(names, vec!["dpkg", "rpm", "apt", "yum", "dnf", "Python", "rubygems", "zypper"]);
  }

  #[test]
  fn uninstalled_available_package_is_batched_once() {
    let host = FakeHost::new().respond("which yum", 0, "/usr/bin/yum").respond("rpm -q", 1, "");
    let handler = PackagesHandler::new(BTreeMap::from([("yum".to_string(), entries(&[("httpd", any())]))]));

    handler.apply(&host);

    assert_eq!(host.commands_starting_with("yum -y install"), vec!["yum -y install httpd"]);
    assert!(host.commands_starting_with("yum -y downgrade").is_empty());
  }

  #[test]
  fn installed_package_without_version_is_left_alone() {
    let host = FakeHost::new();
    let plan = PackageManager::Dnf.plan(&host, &entries(&[("httpd", any())]));
    assert_eq!(plan, PackagePlan::default());
    assert_eq!(host.commands(), vec!["rpm -q httpd"]);
  }

  #[test]
  fn newer_request_upgrades_older_downgrades() {
    let host = FakeHost::new()
      .respond("rpm -q", 1, "")
      .respond("rpm -q --queryformat %{VERSION}-%{RELEASE} httpd", 0, "2.2.15-1")
      .respond("rpm -q --queryformat %{VERSION}-%{RELEASE} mysql", 0, "5.5.30-1");

    let plan = PackageManager::Yum.plan(
      &host,
      &entries(&[
        ("httpd", VersionSpec::Candidates(vec!["2.2.22".into(), "2.0".into()])),
        ("mysql", exact("5.5.20")),
      ]),
    );

    assert_eq!(plan.installs, vec!["httpd-2.2.22"]);
    assert_eq!(plan.downgrades, vec!["mysql-5.5.20"]);
  }

  #[test]
  fn equal_installed_version_is_a_no_op() {
    let host = FakeHost::new()
      .respond("rpm -q httpd-2.2.22", 1, "")
      .respond("rpm -q --queryformat", 0, "2.2.22");

    let plan = PackageManager::Zypper.plan(&host, &entries(&[("httpd", exact("2.2.22"))]));
    assert_eq!(plan, PackagePlan::default());
  }

  #[test]
  fn empty_candidate_version_installs_bare_name() {
    let host = FakeHost::new().respond("rpm -q", 1, "");
    let spec = VersionSpec::Candidates(vec![String::new()]);
    let plan = PackageManager::Dnf.plan(&host, &entries(&[("httpd", spec)]));
    assert_eq!(plan.installs, vec!["httpd"]);
    assert!(plan.downgrades.is_empty());
  }

  #[test]
  fn versioned_package_not_installed_is_installed() {
    let host = FakeHost::new().respond("rpm -q", 1, "");
    let plan = PackageManager::Dnf.plan(&host, &entries(&[("httpd", exact("2.4"))]));
    assert_eq!(plan.installs, vec!["httpd-2.4"]);
    assert!(host.commands().contains(&"dnf -y --showduplicates list available httpd-2.4".to_string()));
  }

  #[test]
  #[traced_test]
  fn unavailable_package_is_skipped_with_warning() {
    let host = FakeHost::new()
      .respond("rpm -q", 1, "")
      .respond("zypper -n --no-refresh search ghost", 104, "");

    let handler = PackagesHandler::new(BTreeMap::from([(
      "zypper".to_string(),
      entries(&[("ghost", any()), ("vim", any())]),
    )]));
    handler.apply(&host);

    assert_eq!(host.commands_starting_with("zypper -n install"), vec!["zypper -n install vim"]);
    assert!(logs_contain("skipping package, not available"));
  }

  #[test]
  fn downgrades_use_manager_specific_commands() {
    let host = FakeHost::new()
      .respond("rpm -q", 1, "")
      .respond("rpm -q --queryformat", 0, "9.0");
    let request = entries(&[("a", exact("1.0")), ("b", exact("2.0"))]);

    PackageManager::Dnf.apply(&host, &request);
    assert_eq!(host.commands_starting_with("dnf -y downgrade"), vec!["dnf -y downgrade a-1.0 b-2.0"]);

    let host = FakeHost::new()
      .respond("rpm -q", 1, "")
      .respond("rpm -q --queryformat", 0, "9.0");
    PackageManager::Zypper.apply(&host, &request);
    assert_eq!(
      host.commands_starting_with("zypper -n install"),
      vec!["zypper -n install --oldpackage a-1.0 b-2.0"]
    );
  }

  #[test]
  fn yum_falls_back_to_dnf_when_missing() {
    let host = FakeHost::new().respond("which yum", 1, "").respond("rpm -q", 1, "");
    PackageManager::Yum.apply(&host, &entries(&[("httpd", any())]));

    assert_eq!(host.commands_starting_with("dnf -y --best install"), vec!["dnf -y --best install httpd"]);
    assert!(host.commands_starting_with("yum").is_empty());
  }

  #[test]
  fn apt_installs_everything_noninteractively() {
    let host = FakeHost::new();
    PackageManager::Apt.apply(&host, &entries(&[("nginx", any()), ("curl", exact("7.0"))]));

    let calls = host.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command.to_string(), "apt-get -y install curl nginx");
    let env = calls[0].options.env.as_ref().unwrap();
    assert_eq!(env.get("DEBIAN_FRONTEND").map(String::as_str), Some("noninteractive"));
  }

  #[test]
  fn language_installers_run_per_package() {
    let host = FakeHost::new();
    PackageManager::Rubygems.apply(
      &host,
      &entries(&[("rails", VersionSpec::Candidates(vec!["3.2".into()])), ("rake", any())]),
    );
    PackageManager::Python.apply(&host, &entries(&[("boto", any())]));

    assert_eq!(
      host.commands(),
      vec![
        "gem install -b -y --version 3.2 rails",
        "gem install -b -y rake",
        "easy_install boto",
      ]
    );
  }

  #[test]
  #[traced_test]
  fn rpm_and_unknown_managers_do_nothing() {
    let host = FakeHost::new();
    let handler = PackagesHandler::new(BTreeMap::from([
      ("rpm".to_string(), entries(&[("epel", exact("http://example.com/epel.rpm"))])),
      ("pacman".to_string(), entries(&[("vim", any())])),
    ]));

    handler.apply(&host);

    assert!(host.commands().is_empty());
    assert!(logs_contain("skipping invalid package type"));
  }
}
