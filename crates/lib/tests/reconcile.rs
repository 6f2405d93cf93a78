//! End-to-end reconciliation passes through the public API.

use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use cfnboot_lib::engine::{Engine, EngineError};
use cfnboot_lib::exec::{CommandResult, Host, Invocation, LocalHost};
use cfnboot_lib::hooks::HupConfig;
use cfnboot_lib::metadata::{FileProvider, Metadata, Unreachable};
use serde_json::json;
use tempfile::TempDir;

/// Records commands; `rpm -q` probes report "not installed", everything
/// else succeeds.
#[derive(Default)]
struct RecordingHost {
  commands: RefCell<Vec<String>>,
}

impl RecordingHost {
  fn commands(&self) -> Vec<String> {
    self.commands.borrow().clone()
  }
}

impl Host for RecordingHost {
  fn execute(&self, invocation: &Invocation) -> CommandResult {
    let rendered = invocation.command.to_string();
    self.commands.borrow_mut().push(rendered.clone());
    if rendered.starts_with("rpm -q") {
      CommandResult::with_status(1)
    } else {
      CommandResult::with_status(0)
    }
  }

  fn exists(&self, _path: &Path) -> bool {
    false
  }
}

#[test]
fn files_are_written_on_the_local_host() {
  let temp = TempDir::new().unwrap();
  let target = temp.path().join("etc/motd");
  let doc = json!({"AWS::CloudFormation::Init": {"config": {"files": {
    target.to_str().unwrap(): {"content": "hello\n", "mode": "000640"}
  }}}});

  Engine::new(&LocalHost).apply(&doc, None).unwrap();

  assert_eq!(fs::read_to_string(&target).unwrap(), "hello\n");
  assert_eq!(fs::metadata(&target).unwrap().mode() & 0o777, 0o640);
}

#[test]
fn yum_packages_install_in_one_batch() {
  let host = RecordingHost::default();
  let doc = json!({"AWS::CloudFormation::Init": {"config": {"packages": {
    "yum": {"httpd": [], "mod_ssl": []}
  }}}});

  Engine::new(&host).apply(&doc, None).unwrap();

  let installs: Vec<String> = host
    .commands()
    .into_iter()
    .filter(|c| c.starts_with("yum -y install"))
    .collect();
  assert_eq!(installs, vec!["yum -y install httpd mod_ssl"]);
}

#[test]
fn commands_run_in_label_order() {
  let host = RecordingHost::default();
  let doc = json!({"AWS::CloudFormation::Init": {"config": {"commands": {
    "20_second": {"command": "echo second"},
    "10_first": {"command": ["echo", "first"]},
  }}}});

  Engine::new(&host).apply(&doc, None).unwrap();
  assert_eq!(host.commands(), vec!["echo first", "echo second"]);
}

#[test]
fn unknown_configset_is_reported() {
  let doc = json!({"AWS::CloudFormation::Init": {"config": {}}});
  let err = Engine::new(&RecordingHost::default())
    .apply(&doc, Some("missing"))
    .unwrap_err();
  assert!(matches!(err, EngineError::ConfigSets(_)));
}

#[test]
fn hup_passes_notify_only_on_change() {
  let temp = TempDir::new().unwrap();
  let creds = temp.path().join("cfn-credentials");
  fs::write(&creds, "AWSAccessKeyId=key\nAWSSecretKey=secret\n").unwrap();
  let conf = temp.path().join("cfn-hup.conf");
  fs::write(
    &conf,
    format!("[main]\nstack=teststack\ncredential-file={}\n", creds.display()),
  )
  .unwrap();
  let hooks_conf = temp.path().join("hooks.conf");
  fs::write(
    &hooks_conf,
    "[reload]\ntriggers=post.update\npath=Resources.WebServer.Metadata\naction=/usr/local/bin/reload\nrunas=root\n",
  )
  .unwrap();

  let config = HupConfig::load(&[conf, hooks_conf]).unwrap();
  let source = temp.path().join("metadata.json");
  let default_path = temp.path().join("lib/cfn-init-data");
  let last_path = temp.path().join("cache/last_metadata");

  let pass = |document: serde_json::Value| {
    fs::write(&source, document.to_string()).unwrap();
    let mut metadata = Metadata::new(&config.stack, Some("WebServer"));
    assert!(
      metadata
        .retrieve(&FileProvider::new(&source), &default_path, &last_path)
        .unwrap()
    );
    let host = RecordingHost::default();
    Engine::new(&host).hup_pass(&metadata, &config.hooks).unwrap();
    host.commands()
  };

  let v1 = json!({"AWS::CloudFormation::Init": {"config": {}}, "version": 1});
  assert_eq!(pass(v1.clone()), vec!["/usr/local/bin/reload"]);
  assert!(pass(v1).is_empty());
  assert_eq!(
    pass(json!({"AWS::CloudFormation::Init": {"config": {}}, "version": 2})),
    vec!["/usr/local/bin/reload"]
  );

  let cache = last_path.parent().unwrap();
  assert_eq!(fs::metadata(cache).unwrap().mode() & 0o777, 0o700);
  assert_eq!(fs::metadata(&last_path).unwrap().mode() & 0o777, 0o600);
}

#[test]
fn offline_pass_uses_boot_document() {
  let temp = TempDir::new().unwrap();
  let default_path = temp.path().join("cfn-init-data");
  let last_path = temp.path().join("cache/last_metadata");
  fs::write(&default_path, r#"{"AWS::CloudFormation::Init": {"config": {}}}"#).unwrap();

  let mut metadata = Metadata::new("teststack", None);
  assert!(metadata.retrieve(&Unreachable, &default_path, &last_path).unwrap());
  assert!(metadata.has_changed());
  assert_eq!(
    metadata.display(Some("AWS::CloudFormation::Init")).unwrap(),
    r#"{"config":{}}"#
  );
}
