//! # CLI Commands
//!
//! Subcommand implementations for the deskpilot CLI.

pub mod config;
pub mod run;
pub mod screenshot;

use crate::cli::DesktopArgs;
use anyhow::Context;
use deskpilot_core::{AgentConfig, Config, DesktopConfig, Transport};
use deskpilot_desktop::{
    CommandRunner, LocalRunner, SshRunner, XdotoolDesktop, XdotoolOptions,
};
use deskpilot_providers::{create_provider, ComputerUseProvider, ProviderSettings};
use std::path::Path;
use tracing::debug;

/// Desktop backend used by every command
pub type Desktop = XdotoolDesktop<Box<dyn CommandRunner>>;

/// Load configuration: an explicit file, or the global and project files.
/// Environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .apply_env_overrides(),
        None => Config::load().context("Failed to load configuration")?,
    };
    debug!("Configuration loaded from {:?}", config.loaded_from);
    Ok(config)
}

/// Apply desktop flags on top of the loaded configuration
pub fn apply_desktop_args(config: &mut Config, args: &DesktopArgs) {
    if let Some(display) = &args.display {
        config.desktop.display = display.clone();
    }
    if let Some(destination) = &args.ssh {
        config.desktop.transport = Transport::Ssh;
        config.desktop.ssh_destination = Some(destination.clone());
    }
    if let Some(max_display) = args.max_display {
        config.agent.max_display = max_display;
    }
}

/// Build the xdotool desktop for the configured transport
pub fn build_desktop(config: &DesktopConfig) -> anyhow::Result<Desktop> {
    config.validate()?;

    let runner: Box<dyn CommandRunner> = match config.transport {
        Transport::Local => Box::new(
            LocalRunner::new(config.display.clone()).with_timeout(config.command_timeout()),
        ),
        Transport::Ssh => {
            let destination = config
                .ssh_destination
                .clone()
                .context("ssh transport requires ssh_destination")?;
            Box::new(
                SshRunner::new(destination, config.display.clone())
                    .with_timeout(config.command_timeout()),
            )
        }
    };

    let options = XdotoolOptions {
        type_chunk_size: config.type_chunk_size,
        type_delay_ms: config.type_delay_ms,
        ..Default::default()
    };
    Ok(XdotoolDesktop::with_options(runner, options))
}

/// Build the model transport; the API key comes from the environment
pub fn build_provider(config: &AgentConfig) -> anyhow::Result<Box<dyn ComputerUseProvider>> {
    let settings = ProviderSettings {
        kind: config.provider_kind()?,
        api_key: None,
        base_url: config.base_url.clone(),
        model: config.model.clone(),
        scroll_step: Some(config.scroll_pixels_per_click),
    };
    Ok(create_provider(&settings)?)
}
