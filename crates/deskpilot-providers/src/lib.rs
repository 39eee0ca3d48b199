//! # Deskpilot Providers
//!
//! Computer-use model transports. A provider turns the linear
//! [`Conversation`] into a vendor request and parses the reply into a
//! [`ModelTurn`]: reasoning summaries, text, and typed [`ComputerAction`]s.
//!
//! ## Supported Providers
//!
//! - OpenAI Responses API (`computer_use_preview` tool, stateful chaining
//!   through `previous_response_id`)
//! - Anthropic Messages API (`computer_20250124` tool, full history resent
//!   each turn)

pub mod action;
pub mod anthropic;
pub mod conversation;
pub mod openai;
pub mod traits;

pub use action::{ActionCall, ComputerAction, MouseButton, Point, SafetyCheck};
pub use anthropic::AnthropicProvider;
pub use conversation::{ActionOutput, Conversation, ConversationItem, Screenshot};
pub use openai::OpenAiProvider;
pub use traits::{ComputerUseProvider, Display, ModelTurn, TurnOptions, Usage};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<u64> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Map a non-success HTTP response to a [`ProviderError`].
pub(crate) async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(match status.as_u16() {
        429 => ProviderError::RateLimited { retry_after },
        401 | 403 => ProviderError::AuthError(body),
        code => ProviderError::ApiError {
            status: code,
            message: body,
        },
    })
}

/// An API key that never shows up in Debug output
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Which transport to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(ProviderError::ConfigError(format!(
                "unknown provider '{other}' (expected: openai, anthropic)"
            ))),
        }
    }
}

/// Settings for [`create_provider`]
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<ApiKey>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Pixels per wheel click, used to express click-based scrolls as pixels
    pub scroll_step: Option<u32>,
}

/// Build a provider from settings, reading the API key from the environment
/// when none is given.
pub fn create_provider(settings: &ProviderSettings) -> Result<Box<dyn ComputerUseProvider>> {
    let api_key = match &settings.api_key {
        Some(key) => key.clone(),
        None => std::env::var(settings.kind.api_key_env())
            .map(ApiKey::new)
            .map_err(|_| {
                ProviderError::ConfigError(format!(
                    "{} is not set",
                    settings.kind.api_key_env()
                ))
            })?,
    };
    if api_key.is_empty() {
        return Err(ProviderError::AuthError(format!(
            "empty API key for {}",
            settings.kind
        )));
    }

    let provider: Box<dyn ComputerUseProvider> = match settings.kind {
        ProviderKind::OpenAi => {
            let mut provider = match &settings.base_url {
                Some(url) => OpenAiProvider::with_base_url(api_key, url.clone()),
                None => OpenAiProvider::new(api_key),
            };
            if let Some(model) = &settings.model {
                provider = provider.with_default_model(model.clone());
            }
            Box::new(provider)
        }
        ProviderKind::Anthropic => {
            let mut provider = match &settings.base_url {
                Some(url) => AnthropicProvider::with_base_url(api_key, url.clone()),
                None => AnthropicProvider::new(api_key),
            };
            if let Some(model) = &settings.model {
                provider = provider.with_default_model(model.clone());
            }
            if let Some(step) = settings.scroll_step {
                provider = provider.with_scroll_step(step);
            }
            Box::new(provider)
        }
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(" Anthropic ".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        let err = "gemini".parse::<ProviderKind>().unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn test_api_key_masks_in_debug() {
        let key = ApiKey::new("sk-secret123");
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert_eq!(key.as_str(), "sk-secret123");
    }

    #[test]
    fn test_create_provider_with_explicit_key() {
        let settings = ProviderSettings {
            kind: ProviderKind::Anthropic,
            api_key: Some(ApiKey::new("sk-ant-test")),
            model: Some("claude-test".to_string()),
            ..Default::default()
        };
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.default_model(), "claude-test");
    }

    #[test]
    fn test_create_provider_rejects_blank_key() {
        let settings = ProviderSettings {
            kind: ProviderKind::OpenAi,
            api_key: Some(ApiKey::new("   ")),
            ..Default::default()
        };
        assert!(matches!(
            create_provider(&settings),
            Err(ProviderError::AuthError(_))
        ));
    }

    #[tokio::test]
    async fn test_error_for_status_maps_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let response = reqwest::get(format!("{}/limited", server.url())).await.unwrap();
        match error_for_status(response).await {
            Err(ProviderError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(7)),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }
}
