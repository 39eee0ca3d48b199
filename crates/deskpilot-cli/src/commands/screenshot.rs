//! # Screenshot Command
//!
//! Capture the desktop the way the model would see it.

use super::{apply_desktop_args, build_desktop};
use crate::cli::DesktopArgs;
use anyhow::Context;
use colored::Colorize;
use deskpilot_core::Config;
use deskpilot_desktop::{DesktopSandbox, ResolutionScaler};
use std::path::Path;

/// Run the screenshot command
pub async fn run(path: &Path, native: bool, mut config: Config, args: &DesktopArgs) -> anyhow::Result<()> {
    apply_desktop_args(&mut config, args);
    config.agent.validate()?;

    let desktop = build_desktop(&config.desktop)?;
    let resolution = desktop.resolution().await?;
    let scaler = if native {
        ResolutionScaler::identity(resolution)
    } else {
        ResolutionScaler::new(resolution, config.agent.max_display)
    };

    let png = desktop.screenshot().await?;
    let scaled = scaler.scale_screenshot(&png)?;
    std::fs::write(path, &scaled.png)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Saved {}x{} screenshot to {} (native {})",
        "✓".bright_green().bold(),
        scaled.width,
        scaled.height,
        path.display().to_string().bright_cyan(),
        resolution
    );
    Ok(())
}
