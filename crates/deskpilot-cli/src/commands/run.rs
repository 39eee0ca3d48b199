//! # Run Command
//!
//! Carry out one instruction and stream the agent's events.

use super::{apply_desktop_args, build_desktop, build_provider};
use crate::cli::DesktopArgs;
use crate::render::{print_event, OutputMode};
use colored::Colorize;
use deskpilot_core::{AgentOutcome, ComputerAgent, Config, StopReason};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Flags of `deskpilot run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
    pub acknowledge_safety_checks: bool,
    pub json: bool,
    pub desktop: DesktopArgs,
}

/// Apply run flags on top of the loaded configuration
pub fn apply_options(config: &mut Config, options: &RunOptions) {
    if let Some(provider) = &options.provider {
        config.agent.provider = provider.clone();
    }
    if let Some(model) = &options.model {
        config.agent.model = Some(model.clone());
    }
    if let Some(max) = options.max_iterations {
        config.agent.max_iterations = max;
    }
    if options.acknowledge_safety_checks {
        config.agent.auto_acknowledge_safety_checks = true;
    }
    apply_desktop_args(config, &options.desktop);
}

/// First Ctrl+C cancels the run, the second exits.
fn install_interrupt_handler(cancel: CancellationToken) -> anyhow::Result<()> {
    let presses = Arc::new(AtomicUsize::new(0));
    ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::SeqCst) == 0 {
            eprintln!("\n{} (press Ctrl+C again to quit)", "Stopping...".bright_yellow());
            cancel.cancel();
        } else {
            std::process::exit(130);
        }
    })?;
    Ok(())
}

/// Run the run command
pub async fn run(instruction: String, mut config: Config, options: RunOptions) -> anyhow::Result<()> {
    apply_options(&mut config, &options);
    config.validate()?;

    let provider = build_provider(&config.agent)?;
    let desktop = build_desktop(&config.desktop)?;
    let agent = ComputerAgent::new(provider, desktop, config.agent.clone()).await?;

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone())?;

    let mode = if options.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    };

    let events = agent.stream(instruction, cancel);
    futures::pin_mut!(events);

    let mut outcome = AgentOutcome::default();
    while let Some(event) = events.next().await {
        print_event(&event, mode);
        outcome.record(&event);
    }

    info!(
        "Run ended: {:?} after {} iterations, {} actions",
        outcome.stop_reason, outcome.iterations, outcome.actions
    );

    match outcome.stop_reason {
        StopReason::Failed => anyhow::bail!("run failed: {}", outcome.text),
        StopReason::Completed | StopReason::Interrupted | StopReason::IterationLimit => Ok(()),
    }
}
