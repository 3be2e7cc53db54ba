//! maprelay CLI - command-line front end for the fetch core.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use error::CliError;
use runner::CliRunner;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "maprelay")]
#[command(version = maprelay::VERSION)]
#[command(about = "Fetch map resources with request coalescing", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.maprelay/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch URLs from concurrent workers and report coalescing statistics
    Fetch(FetchArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch(args) => run_fetch(args, cli.config.as_deref()),
        Commands::Config(command) => commands::config::run(command, cli.config.as_deref()),
    };

    if let Err(e) = result {
        e.exit();
    }
}

fn run_fetch(args: FetchArgs, config_path: Option<&std::path::Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("fetch");
    commands::fetch::run(args, runner.config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_requires_a_url() {
        assert!(Cli::try_parse_from(["maprelay", "fetch"]).is_err());
        assert!(Cli::try_parse_from([
            "maprelay",
            "fetch",
            "https://example.com/0/0/0.pbf",
            "--kind",
            "sprite-json",
            "--workers",
            "4",
        ])
        .is_ok());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["maprelay", "fetch", "x", "--kind", "banana"]).is_err());
    }
}
