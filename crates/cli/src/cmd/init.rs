//! Implementation of the `cfnboot init` command.
//!
//! Retrieves the metadata of one stack resource and applies the selected
//! configSets to this host.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use cfnboot_lib::engine::Engine;
use cfnboot_lib::exec::LocalHost;

use super::SourceArgs;
use crate::output::{format_duration, print_stat, print_success};

#[derive(Debug, Args)]
pub struct InitArgs {
  /// Stack name
  #[arg(short, long)]
  pub stack: String,

  /// Logical resource id whose metadata is applied
  #[arg(short, long)]
  pub resource: String,

  /// Comma separated configSets to apply (default: "default")
  #[arg(short, long)]
  pub configsets: Option<String>,

  #[command(flatten)]
  pub source: SourceArgs,
}

pub fn cmd_init(args: &InitArgs) -> Result<()> {
  let start = Instant::now();

  let metadata = args.source.require(&args.stack, Some(&args.resource))?;
  let document = metadata
    .document()
    .context("Metadata retrieval returned no document")?;

  Engine::new(&LocalHost)
    .apply(document, args.configsets.as_deref())
    .with_context(|| format!("Failed to apply metadata of '{}'", args.resource))?;

  print_success("Init complete");
  print_stat("Resource", &args.resource);
  print_stat("Changed since last run", if metadata.has_changed() { "yes" } else { "no" });
  print_stat("Elapsed", &format_duration(start.elapsed()));

  Ok(())
}
