//! # Deskpilot Desktop
//!
//! Control of a remote Linux desktop.
//!
//! - [`DesktopSandbox`]: the input and capture primitives the agent loop
//!   drives. Coordinates are always sandbox-native pixels.
//! - [`XdotoolDesktop`]: a sandbox backed by `xdotool` and ImageMagick
//!   `import`, run locally or over SSH through a [`CommandRunner`].
//! - [`ResolutionScaler`]: the linear map between the model's scaled display
//!   and the sandbox's native one.

pub mod keys;
pub mod runner;
pub mod scaler;
pub mod xdotool;

pub use keys::{to_xdotool_chord, to_xdotool_key};
pub use runner::{CommandOutput, CommandRunner, LocalRunner, SshRunner};
pub use scaler::{Resolution, ResolutionScaler, ScaledImage};
pub use xdotool::{XdotoolDesktop, XdotoolOptions};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from desktop control.
#[derive(Error, Debug)]
pub enum DesktopError {
    #[error("{program} exited with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: i32,
        stderr: String,
    },

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid display geometry: {0}")]
    InvalidGeometry(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for desktop operations.
pub type Result<T> = std::result::Result<T, DesktopError>;

/// Mouse buttons, numbered as X11 does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Left,
    Middle,
    Right,
    Back,
    Forward,
}

impl Button {
    /// X11 button number
    pub fn x11_number(&self) -> u8 {
        match self {
            Button::Left => 1,
            Button::Middle => 2,
            Button::Right => 3,
            Button::Back => 8,
            Button::Forward => 9,
        }
    }
}

/// Wheel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// X11 wheel button for this direction
    pub fn x11_button(&self) -> u8 {
        match self {
            ScrollDirection::Up => 4,
            ScrollDirection::Down => 5,
            ScrollDirection::Left => 6,
            ScrollDirection::Right => 7,
        }
    }
}

/// Input and capture primitives of a remote desktop.
#[async_trait]
pub trait DesktopSandbox: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Native screen resolution
    async fn resolution(&self) -> Result<Resolution>;

    /// Capture the full screen as PNG bytes
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Move the pointer
    async fn move_mouse(&self, x: i32, y: i32) -> Result<()>;

    /// Click a button at a position
    async fn click_button(&self, x: i32, y: i32, button: Button) -> Result<()>;

    /// Double-click the left button at a position
    async fn double_click(&self, x: i32, y: i32) -> Result<()>;

    /// Type text into the focused window
    async fn write(&self, text: &str) -> Result<()>;

    /// Press a key chord (keys held together)
    async fn press(&self, keys: &[String]) -> Result<()>;

    /// Turn the wheel at the current pointer position
    async fn scroll(&self, direction: ScrollDirection, clicks: u32) -> Result<()>;

    /// Press the left button at `from`, move to `to`, release
    async fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<()>;

    // Convenience methods with default implementations

    /// Left-click at coordinates.
    async fn left_click(&self, x: i32, y: i32) -> Result<()> {
        self.click_button(x, y, Button::Left).await
    }

    /// Right-click at coordinates.
    async fn right_click(&self, x: i32, y: i32) -> Result<()> {
        self.click_button(x, y, Button::Right).await
    }

    /// Middle-click at coordinates.
    async fn middle_click(&self, x: i32, y: i32) -> Result<()> {
        self.click_button(x, y, Button::Middle).await
    }
}
