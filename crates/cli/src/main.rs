mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use srcpkg_lib::config::Config;

#[derive(Parser)]
#[command(name = "srcpkg")]
#[command(author, version, about = "Build system packages from source recipes", long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the config file
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a recipe and its local dependencies into packages
  Build {
    /// Path to the recipe (default: recipe.lua)
    #[arg(default_value = "recipe.lua")]
    recipe: PathBuf,

    /// Extra directory of recipes to resolve dependencies from (repeatable)
    #[arg(long = "repo-dir")]
    repo_dirs: Vec<PathBuf>,
  },

  /// Show a recipe's package metadata for this system
  Info {
    /// Path to the recipe (default: recipe.lua)
    #[arg(default_value = "recipe.lua")]
    recipe: PathBuf,

    /// Show every declared variant instead of the resolved values
    #[arg(short, long)]
    all: bool,
  },

  /// Clone or update the configured recipe repositories
  Refresh,
}

fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
  let config = Config::load(cli.config.as_deref())?;

  match cli.command {
    Commands::Build { recipe, repo_dirs } => cmd::cmd_build(&recipe, repo_dirs, &config),
    Commands::Info { recipe, all } => cmd::cmd_info(&recipe, all, &config),
    Commands::Refresh => cmd::cmd_refresh(&config),
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{:#}", e);
      ExitCode::FAILURE
    }
  }
}
