//! # Configuration
//!
//! Loads configuration from TOML files and environment variables.
//!
//! ## Configuration Sources (in priority order)
//!
//! 1. Command-line flags (applied by the binary)
//! 2. Environment variables (DESKPILOT_* prefix)
//! 3. Project-level config (.deskpilot/config.toml)
//! 4. Global config (~/.config/deskpilot/config.toml)
//! 5. Default values
//!
//! ```toml
//! [agent]
//! provider = "anthropic"
//! max_iterations = 30
//!
//! [agent.max_display]
//! width = 1280
//! height = 800
//!
//! [desktop]
//! transport = "ssh"
//! ssh_destination = "user@sandbox"
//! display = ":1"
//! ```

use deskpilot_desktop::Resolution;
use deskpilot_providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur in configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Agent loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model transport ("openai" or "anthropic")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model override (None = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model turns before the run is stopped
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,

    /// Environment advertised in the computer tool
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Largest display the model sees; the screen is scaled down to fit
    #[serde(default = "default_max_display")]
    pub max_display: Resolution,

    /// Pause after each action before the screenshot is taken
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Upper bound for model-requested waits
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Pixels of scroll delta per wheel click
    #[serde(default = "default_scroll_pixels_per_click")]
    pub scroll_pixels_per_click: u32,

    #[serde(default)]
    pub auto_acknowledge_safety_checks: bool,

    /// File replacing the built-in system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_path: Option<PathBuf>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_max_iterations() -> usize {
    50
}

fn default_reasoning_effort() -> String {
    "medium".to_string()
}

fn default_environment() -> String {
    "linux".to_string()
}

fn default_max_display() -> Resolution {
    Resolution::new(1024, 768)
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_max_wait_ms() -> u64 {
    10_000
}

fn default_scroll_pixels_per_click() -> u32 {
    100
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            max_iterations: default_max_iterations(),
            reasoning_effort: default_reasoning_effort(),
            environment: default_environment(),
            max_display: default_max_display(),
            settle_delay_ms: default_settle_delay_ms(),
            max_wait_ms: default_max_wait_ms(),
            scroll_pixels_per_click: default_scroll_pixels_per_click(),
            auto_acknowledge_safety_checks: false,
            instructions_path: None,
        }
    }
}

impl AgentConfig {
    /// Parsed provider kind
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        self.provider
            .parse()
            .map_err(|e: deskpilot_providers::ProviderError| ConfigError::InvalidConfig(e.to_string()))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        if self.max_display.width == 0 || self.max_display.height == 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "max_display must be non-zero, got {}",
                self.max_display
            )));
        }

        if self.scroll_pixels_per_click == 0 {
            return Err(ConfigError::InvalidConfig(
                "scroll_pixels_per_click must be greater than 0".to_string(),
            ));
        }

        self.provider_kind()?;
        Ok(())
    }
}

/// How desktop commands reach the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Local,
    Ssh,
}

/// Desktop backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopConfig {
    #[serde(default)]
    pub transport: Transport,

    /// X display name
    #[serde(default = "default_display")]
    pub display: String,

    /// `user@host` for the ssh transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_destination: Option<String>,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Characters per xdotool type call
    #[serde(default = "default_type_chunk_size")]
    pub type_chunk_size: usize,

    #[serde(default = "default_type_delay_ms")]
    pub type_delay_ms: u64,
}

fn default_display() -> String {
    ":0".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

fn default_type_chunk_size() -> usize {
    50
}

fn default_type_delay_ms() -> u64 {
    12
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Local,
            display: default_display(),
            ssh_destination: None,
            command_timeout_secs: default_command_timeout(),
            type_chunk_size: default_type_chunk_size(),
            type_delay_ms: default_type_delay_ms(),
        }
    }
}

impl DesktopConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.transport == Transport::Ssh && self.ssh_destination.is_none() {
            return Err(ConfigError::InvalidConfig(
                "ssh transport requires ssh_destination".to_string(),
            ));
        }

        if self.command_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "command_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.type_chunk_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "type_chunk_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Full deskpilot configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub desktop: DesktopConfig,

    /// Last file merged into this configuration
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load global and project files, then environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = config.merge_from_file(&global_path)?;
            }
        }

        if let Some(project_path) = Self::project_config_path() {
            if project_path.exists() {
                debug!("Loading project config from {:?}", project_path);
                config = config.merge_from_file(&project_path)?;
            }
        }

        Ok(config.apply_env_overrides())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::default().merge_from_file(path)
    }

    /// Overlay a TOML file. Sections present in the file replace ours.
    pub fn merge_from_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let table: toml::Table = content.parse()?;
        let file_config: Self = toml::from_str(&content)?;

        if table.contains_key("agent") {
            self.agent = file_config.agent;
        }
        if table.contains_key("desktop") {
            self.desktop = file_config.desktop;
        }
        self.loaded_from = Some(path.to_path_buf());

        Ok(self)
    }

    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(provider) = std::env::var("DESKPILOT_PROVIDER") {
            self.agent.provider = provider;
        }

        if let Ok(model) = std::env::var("DESKPILOT_MODEL") {
            self.agent.model = Some(model);
        }

        if let Ok(val) = std::env::var("DESKPILOT_MAX_ITERATIONS") {
            if let Ok(n) = val.parse() {
                self.agent.max_iterations = n;
            }
        }

        if let Ok(display) = std::env::var("DESKPILOT_DISPLAY") {
            self.desktop.display = display;
        }

        if let Ok(destination) = std::env::var("DESKPILOT_SSH") {
            if !destination.trim().is_empty() {
                debug!("SSH transport from env: {}", destination);
                self.desktop.transport = Transport::Ssh;
                self.desktop.ssh_destination = Some(destination);
            }
        }

        self
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml()?)?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializationError(e.to_string()))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("deskpilot").join("config.toml"))
    }

    pub fn project_config_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|d| d.join(".deskpilot").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;
        self.desktop.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.provider, "openai");
        assert_eq!(config.agent.max_iterations, 50);
        assert_eq!(config.agent.max_display, Resolution::new(1024, 768));
        assert_eq!(config.agent.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.desktop.display, ":0");
        assert_eq!(config.desktop.transport, Transport::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_agent_validation() {
        let mut agent = AgentConfig::default();

        agent.max_iterations = 0;
        assert!(agent.validate().is_err());
        agent.max_iterations = 5;

        agent.max_display = Resolution::new(0, 768);
        assert!(agent.validate().is_err());
        agent.max_display = Resolution::new(800, 600);

        agent.scroll_pixels_per_click = 0;
        assert!(agent.validate().is_err());
        agent.scroll_pixels_per_click = 50;

        agent.provider = "gemini".to_string();
        assert!(agent.validate().is_err());
        agent.provider = "claude".to_string();
        assert!(agent.validate().is_ok());
    }

    #[test]
    fn test_ssh_requires_destination() {
        let mut desktop = DesktopConfig {
            transport: Transport::Ssh,
            ..Default::default()
        };
        assert!(desktop.validate().is_err());

        desktop.ssh_destination = Some("user@vm".to_string());
        assert!(desktop.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[agent]\nprovider = \"anthropic\"\nmax_iterations = 7\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.agent.provider, "anthropic");
        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.agent.reasoning_effort, "medium");
        assert_eq!(config.desktop, DesktopConfig::default());
        assert_eq!(config.loaded_from.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_project_file_overrides_global_sections() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let project = temp_dir.path().join("project.toml");
        std::fs::write(
            &global,
            "[agent]\nprovider = \"anthropic\"\n\n[desktop]\ndisplay = \":2\"\n",
        )
        .unwrap();
        std::fs::write(&project, "[desktop]\ndisplay = \":5\"\n").unwrap();

        let config = Config::default()
            .merge_from_file(&global)
            .unwrap()
            .merge_from_file(&project)
            .unwrap();
        assert_eq!(config.agent.provider, "anthropic");
        assert_eq!(config.desktop.display, ":5");
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.agent.model = Some("test-model".to_string());
        config.agent.max_display = Resolution::new(1280, 800);
        config.desktop.transport = Transport::Ssh;
        config.desktop.ssh_destination = Some("me@box".to_string());

        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.agent, config.agent);
        assert_eq!(loaded.desktop, config.desktop);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nprovider = ").unwrap();
        assert!(matches!(
            Config::load_from_file(&path),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("DESKPILOT_PROVIDER", "anthropic");
        std::env::set_var("DESKPILOT_MAX_ITERATIONS", "12");
        std::env::set_var("DESKPILOT_SSH", "pilot@10.0.0.5");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.agent.provider, "anthropic");
        assert_eq!(config.agent.max_iterations, 12);
        assert_eq!(config.desktop.transport, Transport::Ssh);
        assert_eq!(config.desktop.ssh_destination.as_deref(), Some("pilot@10.0.0.5"));

        std::env::remove_var("DESKPILOT_PROVIDER");
        std::env::remove_var("DESKPILOT_MAX_ITERATIONS");
        std::env::remove_var("DESKPILOT_SSH");
    }
}
