//! # Deskpilot Core
//!
//! The agent loop that lets a computer-use model drive a desktop.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────── ComputerAgent ──────────────────────┐
//! │                                                            │
//! │  provider.next_turn ──► reasoning / text / action calls    │
//! │        ▲                              │                    │
//! │        │                     dispatch (scaled coords)      │
//! │        │                              ▼                    │
//! │  conversation ◄──── screenshot + result per call           │
//! │                                                            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step is reported as an [`AgentEvent`] on a stream. A
//! [`CancellationToken`](tokio_util::sync::CancellationToken) interrupts the
//! run before or during any model request or action.

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod prompt;

pub use agent::ComputerAgent;
pub use config::{AgentConfig, Config, ConfigError, DesktopConfig, Transport};
pub use dispatch::{dispatch, DispatchError};
pub use events::{AgentEvent, AgentOutcome, StopReason, STOPPED_BY_USER};

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    Provider(#[from] deskpilot_providers::ProviderError),

    #[error("Desktop error: {0}")]
    Desktop(#[from] deskpilot_desktop::DesktopError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Safety check requires confirmation: {0}")]
    SafetyCheck(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
