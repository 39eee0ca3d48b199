//! # Computer Agent
//!
//! Alternates model turns and tool turns until the model stops asking for
//! actions:
//!
//! 1. Request a model turn for the conversation so far
//! 2. Report reasoning and text
//! 3. Dispatch each action call, then capture a scaled screenshot
//! 4. Append one output per call and go back to 1
//!
//! Action failures are reported to the model and the run goes on. Transport
//! failures end the run.

use crate::config::AgentConfig;
use crate::dispatch::{dispatch, DispatchError};
use crate::events::{AgentEvent, AgentOutcome, StopReason, STOPPED_BY_USER};
use crate::{prompt, AgentError, Result};
use async_stream::stream;
use deskpilot_desktop::{DesktopSandbox, ResolutionScaler};
use deskpilot_providers::{
    ActionCall, ActionOutput, ComputerAction, ComputerUseProvider, Conversation, Display,
    Screenshot, TurnOptions,
};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Drives a [`DesktopSandbox`] with a [`ComputerUseProvider`].
pub struct ComputerAgent<P, D> {
    provider: P,
    desktop: D,
    scaler: ResolutionScaler,
    config: AgentConfig,
    instructions: String,
}

impl<P: ComputerUseProvider, D: DesktopSandbox> ComputerAgent<P, D> {
    /// Validate the config and size the model display from the desktop's
    /// native resolution.
    pub async fn new(provider: P, desktop: D, config: AgentConfig) -> Result<Self> {
        config.validate()?;

        let native = desktop.resolution().await?;
        let scaler = ResolutionScaler::new(native, config.max_display);
        let instructions = prompt::load_instructions(&config, scaler.scaled())?;

        info!(
            "Agent ready: provider={} desktop={} native={} model-space={}",
            provider.name(),
            desktop.name(),
            scaler.original(),
            scaler.scaled()
        );

        Ok(Self {
            provider,
            desktop,
            scaler,
            config,
            instructions,
        })
    }

    /// Replace the system instructions
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    pub fn scaler(&self) -> &ResolutionScaler {
        &self.scaler
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Options sent with every model turn
    pub fn turn_options(&self) -> TurnOptions {
        let scaled = self.scaler.scaled();
        TurnOptions {
            model: self.config.model.clone(),
            instructions: self.instructions.clone(),
            display: Display::new(scaled.width, scaled.height),
            environment: self.config.environment.clone(),
            reasoning_effort: Some(self.config.reasoning_effort.clone()),
            ..TurnOptions::default()
        }
    }

    /// Capture the screen scaled to model space
    pub async fn screenshot(&self) -> Result<Screenshot> {
        let png = self.desktop.screenshot().await?;
        let scaled = self.scaler.scale_screenshot(&png)?;
        Ok(Screenshot::new(scaled.png, scaled.width, scaled.height))
    }

    /// Dispatch one action, let the screen settle, capture the result.
    async fn perform(
        &self,
        action: &ComputerAction,
    ) -> (std::result::Result<String, DispatchError>, Result<Screenshot>) {
        let result = dispatch(action, &self.desktop, &self.scaler, &self.config).await;

        let settles = !matches!(
            action,
            ComputerAction::Screenshot | ComputerAction::Wait { .. }
        );
        if settles && self.config.settle_delay_ms > 0 {
            tokio::time::sleep(self.config.settle_delay()).await;
        }

        (result, self.screenshot().await)
    }

    /// Run an instruction, streaming every step.
    ///
    /// The stream always ends with exactly one `done` or `error` event.
    pub fn stream(
        &self,
        instruction: String,
        cancel: CancellationToken,
    ) -> impl Stream<Item = AgentEvent> + '_ {
        stream! {
            let run_id = Uuid::new_v4().to_string();
            let options = self.turn_options();
            info!(run_id = %run_id, "Starting run: {}", instruction);

            yield AgentEvent::Started {
                run_id: run_id.clone(),
                display: options.display,
            };

            let mut conversation = Conversation::new(instruction);
            let mut iterations = 0usize;

            'run: loop {
                if cancel.is_cancelled() {
                    yield stopped(iterations);
                    break;
                }

                if iterations >= self.config.max_iterations {
                    warn!("Iteration limit reached ({})", iterations);
                    yield AgentEvent::Done {
                        content: format!("Stopped after {iterations} iterations without finishing"),
                        iterations,
                        reason: StopReason::IterationLimit,
                    };
                    break;
                }

                let unanswered = conversation.unanswered_calls();
                if !unanswered.is_empty() {
                    yield AgentEvent::Error {
                        content: format!("Unanswered action calls: {}", unanswered.join(", ")),
                    };
                    break;
                }

                iterations += 1;
                debug!("Requesting model turn {}", iterations);

                let turn = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    turn = self.provider.next_turn(&conversation, &options) => Some(turn),
                };

                let turn = match turn {
                    None => {
                        yield stopped(iterations);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Model turn failed: {}", e);
                        yield AgentEvent::Error {
                            content: AgentError::from(e).to_string(),
                        };
                        break;
                    }
                    Some(Ok(turn)) => turn,
                };

                if let Some(usage) = &turn.usage {
                    debug!(
                        "Tokens: {} in, {} out",
                        usage.input_tokens, usage.output_tokens
                    );
                }

                for summary in &turn.reasoning {
                    yield AgentEvent::Reasoning {
                        content: summary.clone(),
                    };
                }
                if let Some(text) = &turn.text {
                    yield AgentEvent::Message {
                        content: text.clone(),
                    };
                }

                conversation.push_model_turn(&turn);

                if turn.is_final() {
                    info!("Run finished after {} iterations", iterations);
                    yield AgentEvent::Done {
                        content: turn.text.clone().unwrap_or_default(),
                        iterations,
                        reason: StopReason::Completed,
                    };
                    break;
                }

                for call in &turn.calls {
                    for check in &call.pending_safety_checks {
                        yield AgentEvent::SafetyCheck {
                            call_id: call.call_id.clone(),
                            check: check.clone(),
                        };
                    }
                    if !call.pending_safety_checks.is_empty()
                        && !self.config.auto_acknowledge_safety_checks
                    {
                        warn!("Unacknowledged safety check on {}", call.call_id);
                        yield AgentEvent::Error {
                            content: AgentError::SafetyCheck(describe_checks(call)).to_string(),
                        };
                        break 'run;
                    }

                    yield AgentEvent::Action {
                        call_id: call.call_id.clone(),
                        action: call.action.clone(),
                    };

                    let step = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        step = self.perform(&call.action) => Some(step),
                    };
                    let (result, screenshot) = match step {
                        Some(step) => step,
                        None => {
                            yield stopped(iterations);
                            break 'run;
                        }
                    };

                    let error = match result {
                        Ok(summary) => {
                            debug!("{}: {}", call.call_id, summary);
                            yield AgentEvent::ActionCompleted {
                                call_id: call.call_id.clone(),
                            };
                            None
                        }
                        Err(e) => {
                            warn!("Action {} failed: {}", call.action, e);
                            yield AgentEvent::ActionFailed {
                                call_id: call.call_id.clone(),
                                error: e.to_string(),
                            };
                            Some(e.to_string())
                        }
                    };

                    let screenshot = match screenshot {
                        Ok(screenshot) => screenshot,
                        Err(e) => {
                            warn!("Screenshot failed: {}", e);
                            yield AgentEvent::Error {
                                content: format!("Failed to capture screenshot: {e}"),
                            };
                            break 'run;
                        }
                    };

                    conversation.push_output(action_output(call, screenshot, error));
                }
            }
        }
    }

    /// Run an instruction to the end and summarize it.
    pub async fn run(&self, instruction: impl Into<String>, cancel: CancellationToken) -> AgentOutcome {
        let events = self.stream(instruction.into(), cancel);
        futures::pin_mut!(events);

        let mut outcome = AgentOutcome::default();
        while let Some(event) = events.next().await {
            outcome.record(&event);
        }
        outcome
    }
}

fn stopped(iterations: usize) -> AgentEvent {
    info!("Run interrupted");
    AgentEvent::Done {
        content: STOPPED_BY_USER.to_string(),
        iterations,
        reason: StopReason::Interrupted,
    }
}

fn describe_checks(call: &ActionCall) -> String {
    call.pending_safety_checks
        .iter()
        .map(|c| {
            c.message
                .clone()
                .or_else(|| c.code.clone())
                .unwrap_or_else(|| c.id.clone())
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn action_output(call: &ActionCall, screenshot: Screenshot, error: Option<String>) -> ActionOutput {
    let output = match error {
        Some(error) => ActionOutput::failed(&call.call_id, screenshot, error),
        None => ActionOutput::ok(&call.call_id, screenshot),
    };
    if call.pending_safety_checks.is_empty() {
        output
    } else {
        output.with_acknowledged(call.pending_safety_checks.clone())
    }
}
