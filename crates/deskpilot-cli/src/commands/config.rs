//! # Config Command
//!
//! Print the effective configuration.

use colored::Colorize;
use deskpilot_core::Config;

/// Run the config command
pub fn run(config: &Config) -> anyhow::Result<()> {
    match &config.loaded_from {
        Some(path) => println!("{} {}", "# Loaded from".dimmed(), path.display().to_string().dimmed()),
        None => println!("{}", "# Defaults (no config file found)".dimmed()),
    }
    if let Some(path) = Config::global_config_path() {
        println!("{} {}", "# Global config:".dimmed(), path.display().to_string().dimmed());
    }
    println!();
    print!("{}", config.to_toml()?);

    if let Err(e) = config.validate() {
        eprintln!("{} {}", "Warning:".bright_yellow().bold(), e);
    }
    Ok(())
}
