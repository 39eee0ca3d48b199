//! # deskpilot CLI
//!
//! Entry point: parse arguments, set up logging, dispatch the subcommand.

mod cli;
mod commands;
mod render;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Commands};
use commands::run::RunOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default to warn to keep output clean; RUST_LOG or -v for more
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            instruction,
            provider,
            model,
            max_iterations,
            yes,
            json,
            desktop,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let options = RunOptions {
                provider,
                model,
                max_iterations,
                acknowledge_safety_checks: yes,
                json,
                desktop,
            };
            commands::run::run(instruction, config, options).await?;
        }
        Commands::Screenshot {
            path,
            native,
            desktop,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::screenshot::run(&path, native, config, &desktop).await?;
        }
        Commands::Config => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::config::run(&config)?;
        }
        Commands::Completions { shell } => {
            cli::generate_completions(shell);
        }
    }

    Ok(())
}
