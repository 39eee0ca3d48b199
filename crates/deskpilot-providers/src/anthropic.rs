//! # Anthropic Provider
//!
//! Computer use through the Anthropic Messages API. The API is stateless,
//! so the whole conversation is replayed on every turn.

use crate::{
    error_for_status, ActionCall, ApiKey, ComputerAction, ComputerUseProvider, Conversation,
    ConversationItem, ModelTurn, MouseButton, Point, ProviderError, Result, TurnOptions, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const COMPUTER_USE_BETA: &str = "computer-use-2025-01-24";
const COMPUTER_TOOL_TYPE: &str = "computer_20250124";
const COMPUTER_TOOL_NAME: &str = "computer";
const DEFAULT_SCROLL_STEP: u32 = 100;

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    default_model: String,
    /// Pixels per wheel click when expressing scroll amounts as pixels
    scroll_step: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com")
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<ApiKey>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: "claude-sonnet-4-20250514".to_string(),
            scroll_step: DEFAULT_SCROLL_STEP,
        }
    }

    /// Set the default model
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the pixels-per-click used for scroll conversion
    pub fn with_scroll_step(mut self, step: u32) -> Self {
        self.scroll_step = step.max(1);
        self
    }

    /// Convert the conversation to Anthropic messages, merging consecutive
    /// items of the same role into one message.
    fn convert_messages(&self, items: &[ConversationItem]) -> Result<Vec<AnthropicMessage>> {
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for item in items {
            let (role, block) = match item {
                ConversationItem::UserMessage(text) => ("user", json!({"type": "text", "text": text})),
                ConversationItem::AssistantMessage(text) => {
                    ("assistant", json!({"type": "text", "text": text}))
                }
                ConversationItem::Reasoning(_) => continue,
                ConversationItem::ActionCall(call) => (
                    "assistant",
                    json!({
                        "type": "tool_use",
                        "id": call.call_id,
                        "name": COMPUTER_TOOL_NAME,
                        "input": self.encode_action(&call.action)?,
                    }),
                ),
                ConversationItem::ActionOutput(output) => {
                    let mut content = vec![json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": output.screenshot.to_base64(),
                        }
                    })];
                    if let Some(error) = &output.error {
                        content.push(json!({"type": "text", "text": error}));
                    }
                    (
                        "user",
                        json!({
                            "type": "tool_result",
                            "tool_use_id": output.call_id,
                            "content": content,
                            "is_error": output.error.is_some(),
                        }),
                    )
                }
            };

            match messages.last_mut() {
                Some(last) if last.role == role => last.content.push(block),
                _ => messages.push(AnthropicMessage {
                    role,
                    content: vec![block],
                }),
            }
        }

        Ok(messages)
    }

    /// Translate a `computer` tool input into a [`ComputerAction`].
    fn decode_action(&self, input: &Value) -> Result<ComputerAction> {
        let kind = input["action"].as_str().unwrap_or("<missing>");

        let coordinate = |field: &str| -> Result<Point> {
            let pair = input[field].as_array().filter(|a| a.len() == 2).ok_or_else(|| {
                ProviderError::InvalidResponse(format!("{kind}: missing '{field}'"))
            })?;
            match (json_i32(&pair[0]), json_i32(&pair[1])) {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(ProviderError::InvalidResponse(format!(
                    "{kind}: '{field}' must be two integers, got {}",
                    input[field]
                ))),
            }
        };
        let text = |field: &str| -> Result<String> {
            input[field].as_str().map(str::to_string).ok_or_else(|| {
                ProviderError::InvalidResponse(format!("{kind}: missing '{field}'"))
            })
        };

        let action = match kind {
            "screenshot" => ComputerAction::Screenshot,
            "left_click" | "right_click" | "middle_click" => {
                let p = coordinate("coordinate")?;
                let button = match kind {
                    "right_click" => MouseButton::Right,
                    "middle_click" => MouseButton::Middle,
                    _ => MouseButton::Left,
                };
                ComputerAction::Click { x: p.x, y: p.y, button }
            }
            "double_click" => {
                let p = coordinate("coordinate")?;
                ComputerAction::DoubleClick { x: p.x, y: p.y }
            }
            "mouse_move" => {
                let p = coordinate("coordinate")?;
                ComputerAction::Move { x: p.x, y: p.y }
            }
            "type" => ComputerAction::Type { text: text("text")? },
            "key" => ComputerAction::Keypress {
                keys: text("text")?
                    .split('+')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect(),
            },
            "left_click_drag" => ComputerAction::Drag {
                path: vec![coordinate("start_coordinate")?, coordinate("coordinate")?],
            },
            "scroll" => {
                let p = coordinate("coordinate")?;
                let amount = match &input["scroll_amount"] {
                    Value::Null => 3,
                    value => json_i32(value).filter(|a| *a >= 0).ok_or_else(|| {
                        ProviderError::InvalidResponse(format!(
                            "scroll: invalid scroll_amount {value}"
                        ))
                    })?,
                };
                let pixels = i32::try_from(self.scroll_step)
                    .ok()
                    .and_then(|step| amount.checked_mul(step))
                    .ok_or_else(|| {
                        ProviderError::InvalidResponse(format!(
                            "scroll: scroll_amount {amount} is out of range"
                        ))
                    })?;
                let (scroll_x, scroll_y) = match input["scroll_direction"].as_str() {
                    Some("up") => (0, -pixels),
                    Some("down") => (0, pixels),
                    Some("left") => (-pixels, 0),
                    Some("right") => (pixels, 0),
                    other => {
                        return Err(ProviderError::InvalidResponse(format!(
                            "scroll: invalid direction {other:?}"
                        )))
                    }
                };
                ComputerAction::Scroll {
                    x: p.x,
                    y: p.y,
                    scroll_x,
                    scroll_y,
                }
            }
            "wait" => {
                let seconds = input["duration"].as_f64().unwrap_or(1.0);
                ComputerAction::Wait {
                    ms: Some((seconds * 1000.0).round().max(0.0) as u64),
                }
            }
            other => return Err(ProviderError::UnsupportedAction(other.to_string())),
        };

        Ok(action)
    }

    /// Inverse of [`decode_action`](Self::decode_action), for replaying history.
    fn encode_action(&self, action: &ComputerAction) -> Result<Value> {
        let value = match action {
            ComputerAction::Screenshot => json!({"action": "screenshot"}),
            ComputerAction::Click { x, y, button } => {
                let name = match button {
                    MouseButton::Left => "left_click",
                    MouseButton::Right => "right_click",
                    MouseButton::Middle => "middle_click",
                    MouseButton::Back | MouseButton::Forward => {
                        return Err(ProviderError::UnsupportedAction(format!(
                            "{} click",
                            button.as_str()
                        )))
                    }
                };
                json!({"action": name, "coordinate": [x, y]})
            }
            ComputerAction::DoubleClick { x, y } => {
                json!({"action": "double_click", "coordinate": [x, y]})
            }
            ComputerAction::Move { x, y } => json!({"action": "mouse_move", "coordinate": [x, y]}),
            ComputerAction::Type { text } => json!({"action": "type", "text": text}),
            ComputerAction::Keypress { keys } => json!({"action": "key", "text": keys.join("+")}),
            ComputerAction::Drag { path } => match (path.first(), path.last()) {
                (Some(start), Some(end)) => json!({
                    "action": "left_click_drag",
                    "start_coordinate": [start.x, start.y],
                    "coordinate": [end.x, end.y],
                }),
                _ => return Err(ProviderError::UnsupportedAction("empty drag".to_string())),
            },
            ComputerAction::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            } => {
                let (direction, pixels) = if *scroll_y != 0 {
                    (if *scroll_y < 0 { "up" } else { "down" }, scroll_y.unsigned_abs())
                } else {
                    (if *scroll_x < 0 { "left" } else { "right" }, scroll_x.unsigned_abs())
                };
                let amount = (pixels / self.scroll_step).max(1);
                json!({
                    "action": "scroll",
                    "coordinate": [x, y],
                    "scroll_direction": direction,
                    "scroll_amount": amount,
                })
            }
            ComputerAction::Wait { ms } => json!({
                "action": "wait",
                "duration": ms.unwrap_or(1000) as f64 / 1000.0,
            }),
        };
        Ok(value)
    }

    fn parse_response(&self, response: AnthropicResponse) -> Result<ModelTurn> {
        let mut texts = Vec::new();
        let mut reasoning = Vec::new();
        let mut calls = Vec::new();

        for block in response.content {
            match block {
                ResponseBlock::Text { text } => texts.push(text),
                ResponseBlock::Thinking { thinking } => reasoning.push(thinking),
                ResponseBlock::ToolUse { id, name, input } => {
                    if name != COMPUTER_TOOL_NAME {
                        return Err(ProviderError::UnsupportedAction(name));
                    }
                    calls.push(ActionCall::new(id, self.decode_action(&input)?));
                }
                ResponseBlock::Other => debug!("Ignoring unknown content block"),
            }
        }

        Ok(ModelTurn {
            response_id: Some(response.id),
            reasoning,
            text: (!texts.is_empty()).then(|| texts.join("\n")),
            calls,
            usage: Some(Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
                total_tokens: response.usage.input_tokens + response.usage.output_tokens,
            }),
            stop_reason: response.stop_reason,
        })
    }
}

/// A JSON number as `i32`. Integral floats such as `512.0` are accepted.
fn json_i32(value: &Value) -> Option<i32> {
    if let Some(n) = value.as_i64() {
        return i32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

#[async_trait]
impl ComputerUseProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
        debug!(
            "Anthropic turn with model {} ({} history items)",
            model,
            conversation.len()
        );

        let request = AnthropicRequest {
            model,
            max_tokens: options.max_tokens.unwrap_or(4096),
            system: (!options.instructions.is_empty()).then_some(options.instructions.as_str()),
            tools: vec![ComputerTool {
                r#type: COMPUTER_TOOL_TYPE,
                name: COMPUTER_TOOL_NAME,
                display_width_px: options.display.width,
                display_height_px: options.display.height,
            }],
            messages: self.convert_messages(conversation.items())?,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("anthropic-beta", COMPUTER_USE_BETA)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response = error_for_status(response).await?;
        let body: AnthropicResponse = response.json().await?;
        self.parse_response(body)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    tools: Vec<ComputerTool>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct ComputerTool {
    r#type: &'static str,
    name: &'static str,
    display_width_px: u32,
    display_height_px: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
