//! Tessera launcher
//!
//! `tessera serve` (the default) runs the MCP server on stdio. `tessera config`
//! validates the environment and prints the resolved endpoints.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tessera_logging::{init_logging, LogConfig};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "tessera", version, about = "MCP server for semantic layer, discovery and CLI tools")]
struct Cli {
    /// Mirror log output on stderr (info and above)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(flatten)]
    settings: cli::SettingsArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve,

    /// Validate configuration and show the resolved endpoints
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings.into_settings();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cli::serve::run(settings),
        Commands::Config { json } => cli::config::run(settings, json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "tessera",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:?}", err);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
