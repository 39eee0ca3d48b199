//! # OpenAI Provider
//!
//! Computer use through the OpenAI Responses API. The server keeps the
//! conversation: after the first turn only the items appended since the
//! previous response are sent, chained with `previous_response_id`.

use crate::{
    error_for_status, ActionCall, ApiKey, ComputerAction, ComputerUseProvider, Conversation,
    ConversationItem, ModelTurn, ProviderError, Result, SafetyCheck, TurnOptions, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_MODEL: &str = "computer-use-preview";

/// OpenAI Responses API provider
pub struct OpenAiProvider {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    default_model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1")
    }

    /// Create with a custom base URL (for compatible APIs and proxies)
    pub fn with_base_url(api_key: impl Into<ApiKey>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the default model
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Convert conversation items to Responses API input items.
    ///
    /// Reasoning and earlier calls live server-side once a response id
    /// exists, so they are skipped. Failed actions still send their
    /// screenshot; the failure is reported in a trailing user message.
    fn convert_items(items: &[ConversationItem]) -> Vec<InputItem> {
        let mut input = Vec::new();
        let mut failures = Vec::new();

        for item in items {
            match item {
                ConversationItem::UserMessage(text) => input.push(InputItem::Message {
                    role: "user",
                    content: text.clone(),
                }),
                ConversationItem::AssistantMessage(text) => input.push(InputItem::Message {
                    role: "assistant",
                    content: text.clone(),
                }),
                ConversationItem::ActionOutput(output) => {
                    if let Some(error) = &output.error {
                        failures.push(format!("Action {} failed: {}", output.call_id, error));
                    }
                    input.push(InputItem::ComputerCallOutput {
                        r#type: "computer_call_output",
                        call_id: output.call_id.clone(),
                        output: InputImage {
                            r#type: "input_image",
                            image_url: output.screenshot.to_data_url(),
                        },
                        acknowledged_safety_checks: output.acknowledged_safety_checks.clone(),
                    });
                }
                ConversationItem::Reasoning(_) | ConversationItem::ActionCall(_) => {
                    debug!("Skipping server-side item in OpenAI input");
                }
            }
        }

        if !failures.is_empty() {
            input.push(InputItem::Message {
                role: "user",
                content: failures.join("\n"),
            });
        }

        input
    }

    fn parse_response(response: ResponsesResponse) -> Result<ModelTurn> {
        let mut turn = ModelTurn {
            response_id: Some(response.id),
            stop_reason: response.status,
            usage: response.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u.total_tokens,
            }),
            ..Default::default()
        };

        let mut texts = Vec::new();
        for item in response.output {
            match item {
                OutputItem::Reasoning { summary } => {
                    turn.reasoning.extend(
                        summary
                            .into_iter()
                            .map(|part| part.text)
                            .filter(|text| !text.trim().is_empty()),
                    );
                }
                OutputItem::Message { content } => {
                    texts.extend(content.into_iter().filter_map(|part| match part {
                        MessagePart::OutputText { text } => Some(text),
                        MessagePart::Other => None,
                    }));
                }
                OutputItem::ComputerCall {
                    call_id,
                    action,
                    pending_safety_checks,
                } => {
                    let kind = action["type"].as_str().unwrap_or("<missing>").to_string();
                    let action: ComputerAction =
                        serde_json::from_value(action).map_err(|e| {
                            if ComputerAction::KINDS.contains(&kind.as_str()) {
                                ProviderError::InvalidResponse(format!("{kind}: {e}"))
                            } else {
                                ProviderError::UnsupportedAction(kind)
                            }
                        })?;
                    turn.calls.push(ActionCall {
                        call_id,
                        action,
                        pending_safety_checks,
                    });
                }
                OutputItem::Other => debug!("Ignoring unknown output item"),
            }
        }

        if !texts.is_empty() {
            turn.text = Some(texts.join(""));
        }

        Ok(turn)
    }
}

#[async_trait]
impl ComputerUseProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn next_turn(
        &self,
        conversation: &Conversation,
        options: &TurnOptions,
    ) -> Result<ModelTurn> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let previous_response_id = conversation.last_response_id();
        let items = match previous_response_id {
            Some(_) => conversation.pending_items(),
            None => conversation.items(),
        };

        debug!(
            "OpenAI turn with model {} ({} input items, previous: {:?})",
            model,
            items.len(),
            previous_response_id
        );

        let request = ResponsesRequest {
            model,
            tools: vec![ComputerTool {
                r#type: "computer_use_preview",
                display_width: options.display.width,
                display_height: options.display.height,
                environment: &options.environment,
            }],
            input: Self::convert_items(items),
            instructions: &options.instructions,
            previous_response_id,
            truncation: "auto",
            reasoning: options.reasoning_effort.as_deref().map(|effort| Reasoning {
                effort,
                summary: "concise",
            }),
            max_output_tokens: options.max_tokens,
        };

        let url = format!("{}/responses", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response = error_for_status(response).await?;
        let body: ResponsesResponse = response.json().await?;

        if let Some(error) = body.error.as_ref().filter(|e| !e.is_null()) {
            return Err(ProviderError::InvalidResponse(error.to_string()));
        }

        Self::parse_response(body)
    }
}

// Responses API types

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    tools: Vec<ComputerTool<'a>>,
    input: Vec<InputItem>,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
    truncation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<Reasoning<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ComputerTool<'a> {
    r#type: &'static str,
    display_width: u32,
    display_height: u32,
    environment: &'a str,
}

#[derive(Debug, Serialize)]
struct Reasoning<'a> {
    effort: &'a str,
    summary: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum InputItem {
    Message {
        role: &'static str,
        content: String,
    },
    ComputerCallOutput {
        r#type: &'static str,
        call_id: String,
        output: InputImage,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        acknowledged_safety_checks: Vec<SafetyCheck>,
    },
}

#[derive(Debug, Serialize)]
struct InputImage {
    r#type: &'static str,
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    id: String,
    #[serde(default)]
    output: Vec<OutputItem>,
    status: Option<String>,
    usage: Option<ResponsesUsage>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Reasoning {
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },
    Message {
        #[serde(default)]
        content: Vec<MessagePart>,
    },
    ComputerCall {
        call_id: String,
        action: serde_json::Value,
        #[serde(default)]
        pending_safety_checks: Vec<SafetyCheck>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SummaryPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessagePart {
    OutputText { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    input_tokens: u32,
    output_tokens: u32,
    total_tokens: u32,
}
