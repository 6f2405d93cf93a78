mod cmd;
mod output;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{GetMetadataArgs, HupArgs, InitArgs, cmd_get_metadata, cmd_hup, cmd_init};
use output::print_error;

/// cfnboot - declarative bootstrap for cloud instances
#[derive(Parser)]
#[command(name = "cfnboot")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Append logs to this file instead of stderr
  #[arg(long, global = true, value_name = "PATH")]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Converge this host to the metadata of a stack resource
  Init(InitArgs),

  /// Restart dropped services and run hooks for changed metadata
  Hup(HupArgs),

  /// Print the metadata of a stack resource
  GetMetadata(GetMetadataArgs),
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  let builder = tracing_subscriber::fmt().with_env_filter(filter).without_time();

  match log_file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
      builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    None => builder.with_writer(std::io::stderr).init(),
  }

  Ok(())
}

fn run(cli: Cli) -> Result<()> {
  init_logging(cli.verbose, cli.log_file.as_deref())?;

  match cli.command {
    Commands::Init(args) => cmd_init(&args),
    Commands::Hup(args) => cmd_hup(&args),
    Commands::GetMetadata(args) => cmd_get_metadata(&args),
  }
}

fn main() -> ExitCode {
  match run(Cli::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
