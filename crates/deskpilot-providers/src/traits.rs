//! # Provider Traits
//!
//! The contract every computer-use transport implements.

use crate::action::ActionCall;
use crate::conversation::Conversation;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Model-space display size advertised in the computer tool definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub width: u32,
    pub height: u32,
}

impl Display {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Options for one model turn
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Model to use (None = provider default)
    pub model: Option<String>,
    /// System instructions
    pub instructions: String,
    pub display: Display,
    /// Environment name for the computer tool ("linux", "browser", ...)
    pub environment: String,
    /// Reasoning effort ("low", "medium", "high")
    pub reasoning_effort: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            model: None,
            instructions: String::new(),
            display: Display::new(1024, 768),
            environment: "linux".to_string(),
            reasoning_effort: Some("medium".to_string()),
            max_tokens: Some(4096),
        }
    }
}

/// What the model produced in one turn
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Provider response id (used for stateful chaining)
    pub response_id: Option<String>,
    /// Reasoning summaries, in order
    pub reasoning: Vec<String>,
    /// Text addressed to the user
    pub text: Option<String>,
    /// Requested actions, in order
    pub calls: Vec<ActionCall>,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

impl ModelTurn {
    /// A turn with no action calls ends the run
    pub fn is_final(&self) -> bool {
        self.calls.is_empty()
    }
}

/// A model transport that speaks a computer-use tool protocol
#[async_trait]
pub trait ComputerUseProvider: Send + Sync {
    /// Provider name (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Get the default model for this provider
    fn default_model(&self) -> &str;

    /// Request the next model turn for the conversation
    async fn next_turn(&self, conversation: &Conversation, options: &TurnOptions)
        -> Result<ModelTurn>;
}

#[async_trait]
impl<P: ComputerUseProvider + ?Sized> ComputerUseProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn default_model(&self) -> &str {
        (**self).default_model()
    }

    async fn next_turn(
        &self,
        conversation: &Conversation,
        options: &TurnOptions,
    ) -> Result<ModelTurn> {
        (**self).next_turn(conversation, options).await
    }
}
