//! Implementation of the `cfnboot get-metadata` command.

use anyhow::{Result, bail};
use clap::Args;

use super::SourceArgs;

#[derive(Debug, Args)]
pub struct GetMetadataArgs {
  /// Stack name
  #[arg(short, long)]
  pub stack: String,

  /// Logical resource id
  #[arg(short, long)]
  pub resource: String,

  /// Dotted key to print; quote segments containing dots ('a.b')
  #[arg(short, long)]
  pub key: Option<String>,

  #[command(flatten)]
  pub source: SourceArgs,
}

pub fn cmd_get_metadata(args: &GetMetadataArgs) -> Result<()> {
  let metadata = args.source.require(&args.stack, Some(&args.resource))?;

  match metadata.display(args.key.as_deref()) {
    Some(text) => println!("{}", text),
    None => bail!("Key '{}' not found in metadata", args.key.as_deref().unwrap_or_default()),
  }

  Ok(())
}
