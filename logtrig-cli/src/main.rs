//! logtrig CLI entry point
//!
//! Parses arguments, loads configuration, initializes logging and dispatches to
//! the command handlers. Reports go to stdout; logs and errors go to stderr.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use logtrig_core::config::GeneralConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            let code = e
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let loaded = commands::load_effective_config(&cli.config).await;

    // A broken config still gets default logging; the error surfaces in the command.
    let general = loaded
        .as_ref()
        .map(|c| c.general.clone())
        .unwrap_or_else(|_| GeneralConfig::default());
    logging::init_tracing(&general, cli.log_level.as_deref())?;

    tracing::debug!(config = %cli.config.display(), "logtrig starting");

    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await?,
        Commands::Trigger(args) => {
            let config = loaded.map_err(CliError::from)?;
            commands::trigger::execute(args, &config, &writer).await?;
        }
        Commands::Source(args) => {
            loaded.map_err(CliError::from)?;
            commands::source::execute(args, &writer).await?;
        }
    }

    Ok(())
}
