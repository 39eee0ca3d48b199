//! # Conversation
//!
//! The linear history shared between the agent loop and the providers.
//! Items are only ever appended.

use crate::action::{ActionCall, SafetyCheck};
use crate::traits::ModelTurn;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A PNG screenshot in model space
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    #[serde(skip)]
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Screenshot {
    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self { png, width, height }
    }

    /// Base64 of the PNG bytes
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }

    /// `data:image/png;base64,...` URL
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }
}

impl std::fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Screenshot({}x{}, {} bytes)",
            self.width,
            self.height,
            self.png.len()
        )
    }
}

/// Result of dispatching one action call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutput {
    pub call_id: String,
    pub screenshot: Screenshot,
    /// Stringified dispatch error, if the action failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acknowledged_safety_checks: Vec<SafetyCheck>,
}

impl ActionOutput {
    pub fn ok(call_id: impl Into<String>, screenshot: Screenshot) -> Self {
        Self {
            call_id: call_id.into(),
            screenshot,
            error: None,
            acknowledged_safety_checks: Vec::new(),
        }
    }

    pub fn failed(call_id: impl Into<String>, screenshot: Screenshot, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            screenshot,
            error: Some(error.into()),
            acknowledged_safety_checks: Vec::new(),
        }
    }

    pub fn with_acknowledged(mut self, checks: Vec<SafetyCheck>) -> Self {
        self.acknowledged_safety_checks = checks;
        self
    }
}

/// One entry in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ConversationItem {
    UserMessage(String),
    AssistantMessage(String),
    /// Reasoning summary text
    Reasoning(String),
    ActionCall(ActionCall),
    ActionOutput(ActionOutput),
}

/// Linear conversation history
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    items: Vec<ConversationItem>,
    last_response_id: Option<String>,
    /// Index of the first item appended after the last model turn
    turn_start: usize,
}

impl Conversation {
    /// Start a conversation with the user's instruction
    pub fn new(instruction: impl Into<String>) -> Self {
        let mut conversation = Self::default();
        conversation.push_user(instruction);
        conversation
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.items.push(ConversationItem::UserMessage(content.into()));
    }

    /// Record a model turn. Everything after it is pending until the next turn.
    pub fn push_model_turn(&mut self, turn: &ModelTurn) {
        for summary in &turn.reasoning {
            self.items.push(ConversationItem::Reasoning(summary.clone()));
        }
        if let Some(text) = &turn.text {
            self.items.push(ConversationItem::AssistantMessage(text.clone()));
        }
        for call in &turn.calls {
            self.items.push(ConversationItem::ActionCall(call.clone()));
        }
        if turn.response_id.is_some() {
            self.last_response_id = turn.response_id.clone();
        }
        self.turn_start = self.items.len();
    }

    pub fn push_output(&mut self, output: ActionOutput) {
        self.items.push(ConversationItem::ActionOutput(output));
    }

    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    /// Items appended since the last model turn
    pub fn pending_items(&self) -> &[ConversationItem] {
        &self.items[self.turn_start..]
    }

    pub fn last_response_id(&self) -> Option<&str> {
        self.last_response_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Call ids that have no output yet
    pub fn unanswered_calls(&self) -> Vec<&str> {
        let answered: HashSet<&str> = self
            .items
            .iter()
            .filter_map(|item| match item {
                ConversationItem::ActionOutput(output) => Some(output.call_id.as_str()),
                _ => None,
            })
            .collect();

        self.items
            .iter()
            .filter_map(|item| match item {
                ConversationItem::ActionCall(call) => Some(call.call_id.as_str()),
                _ => None,
            })
            .filter(|id| !answered.contains(id))
            .collect()
    }
}
