mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln_lib::recipe::BuildPolicy;

use crate::cmd::ConfigArgs;
use crate::output::{OutputFormat, print_error};

/// kiln - build native packages from declarative recipes
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a recipe and publish the package into the store
  Create {
    #[command(flatten)]
    config: ConfigArgs,

    /// When to build: `missing` reuses a published package, `always` rebuilds
    #[arg(long, value_name = "POLICY")]
    build: Option<BuildPolicy>,
  },

  /// Print the package id a configuration produces, without building
  Id {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Show the finalized options of a recipe for a configuration
  Options {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Show a published package, or the host and store when no package is given
  Info {
    /// Package directory inside the store
    package: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "info,kiln_lib=debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Create { config, build } => cmd::cmd_create(&config, build, cli.verbose),
    Commands::Id { config, output } => cmd::cmd_id(&config, output),
    Commands::Options { config, output } => cmd::cmd_options(&config, output),
    Commands::Info { package, output } => cmd::cmd_info(package.as_deref(), output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
