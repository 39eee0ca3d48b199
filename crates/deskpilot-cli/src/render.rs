//! # Terminal Rendering
//!
//! Prints agent events, colored for people or as JSON lines for tools.

use colored::Colorize;
use deskpilot_core::{AgentEvent, StopReason};

/// How events are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Pretty,
    Json,
}

/// Print one event to stdout
pub fn print_event(event: &AgentEvent, mode: OutputMode) {
    match mode {
        OutputMode::Json => match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("{} {}", "Error:".bright_red().bold(), e),
        },
        OutputMode::Pretty => {
            if let Some(line) = format_event(event) {
                println!("{}", line);
            }
        }
    }
}

/// Human-readable line for an event
pub fn format_event(event: &AgentEvent) -> Option<String> {
    let line = match event {
        AgentEvent::Started { run_id, display } => format!(
            "{} run {} on a {} display",
            "▶".bright_cyan().bold(),
            run_id.dimmed(),
            display
        ),
        AgentEvent::Reasoning { content } => {
            format!("{} {}", "💭".dimmed(), content.dimmed().italic())
        }
        AgentEvent::Message { content } => format!("{} {}", "🤖".bold(), content),
        AgentEvent::Action { action, .. } => {
            format!("  {} {}", "→".bright_blue().bold(), action.to_string().bright_blue())
        }
        AgentEvent::ActionCompleted { .. } => return None,
        AgentEvent::ActionFailed { error, .. } => {
            format!("  {} {}", "✗".bright_red().bold(), error.red())
        }
        AgentEvent::SafetyCheck { check, .. } => {
            let detail = check
                .message
                .as_deref()
                .or(check.code.as_deref())
                .unwrap_or(check.id.as_str());
            format!("{} {}", "Safety check:".bright_yellow().bold(), detail)
        }
        AgentEvent::Done {
            content,
            iterations,
            reason,
        } => {
            let marker = match reason {
                StopReason::Completed => "✓".bright_green().bold(),
                StopReason::Interrupted | StopReason::IterationLimit => "■".bright_yellow().bold(),
                StopReason::Failed => "✗".bright_red().bold(),
            };
            let turns = format!("({} iterations)", iterations).dimmed();
            if content.is_empty() {
                format!("{} {}", marker, turns)
            } else {
                format!("{} {} {}", marker, content, turns)
            }
        }
        AgentEvent::Error { content } => {
            format!("{} {}", "Error:".bright_red().bold(), content)
        }
    };
    Some(line)
}
