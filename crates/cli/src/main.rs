mod cmd;
mod output;
mod plan;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use stagecraft_lib::execute::Verbosity;
use tracing_subscriber::EnvFilter;

/// stagecraft - run staged compiler build targets
#[derive(Parser)]
#[command(name = "stagecraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every target in a plan
  Run {
    /// Path to the JSON build plan
    plan: PathBuf,

    /// Skip targets whose flags are unchanged and whose outputs exist
    #[arg(long)]
    only_stale: bool,

    #[command(flatten)]
    engine: EngineArgs,
  },

  /// Report which targets in a plan have changed flags
  Stale {
    /// Path to the JSON build plan
    plan: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,
  },
}

/// Options shared by every command that builds an engine.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
  /// Maximum number of targets running at once (default: available cores)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Progress output: normal, brief, decorative or silent
  #[arg(long, default_value_t = Verbosity::Normal)]
  pub verbosity: Verbosity,

  /// Directory for argument hash records (default: $STAGECRAFT_CACHE or the user cache dir)
  #[arg(long)]
  pub cache_dir: Option<PathBuf>,

  /// Directory that relative archive inputs are resolved against
  #[arg(long, default_value = ".")]
  pub top_dir: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run {
      plan,
      only_stale,
      engine,
    } => cmd::cmd_run(&plan, only_stale, &engine),
    Commands::Stale { plan, engine } => cmd::cmd_stale(&plan, &engine),
  }
}
