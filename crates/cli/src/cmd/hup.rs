//! Implementation of the `cfnboot hup` command.
//!
//! Runs a single cfn-hup pass for every resource watched by a hook. Periodic
//! execution is left to the host's scheduler (cron or a systemd timer).

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::{info, warn};

use cfnboot_lib::engine::Engine;
use cfnboot_lib::exec::LocalHost;
use cfnboot_lib::hooks::HupConfig;
use cfnboot_lib::paths;

use super::SourceArgs;
use crate::output::{print_info, print_warning};

#[derive(Debug, Args)]
pub struct HupArgs {
  /// Configuration files read in order (default: cfn-hup.conf, hooks.conf
  /// and hooks.d/*.conf under the config directory)
  #[arg(long = "config", value_name = "PATH")]
  pub configs: Vec<PathBuf>,

  #[command(flatten)]
  pub source: SourceArgs,
}

pub fn cmd_hup(args: &HupArgs) -> Result<()> {
  let configs = if args.configs.is_empty() {
    paths::hup_config_paths()
  } else {
    args.configs.clone()
  };
  if configs.is_empty() {
    bail!("No configuration files found in {}", paths::config_dir().display());
  }

  let config = HupConfig::load(&configs).context("Failed to load hook configuration")?;
  info!(stack = %config.stack, hooks = config.hooks.len(), "loaded hook configuration");

  let engine = Engine::new(&LocalHost);
  for resource in config.unique_resources() {
    let Some(metadata) = args.source.retrieve(&config.stack, Some(&resource))? else {
      print_warning(&format!("No metadata for {}, skipping", resource));
      continue;
    };

    if let Err(e) = engine.hup_pass(&metadata, &config.hooks) {
      warn!(resource = %resource, error = %e, "hup pass failed");
      print_warning(&format!("Pass for {} failed: {}", resource, e));
      continue;
    }
    print_info(&format!("Checked {}", resource));
  }

  Ok(())
}
