//! System instructions for the computer-use model.

use crate::config::{AgentConfig, ConfigError};
use deskpilot_desktop::Resolution;
use tracing::debug;

/// Built-in instructions for a Linux desktop of the given model-space size.
pub fn default_instructions(display: Resolution) -> String {
    format!(
        r#"You are operating a Linux desktop through screenshots and computer actions.

## Environment
- The screen you see is {width}x{height} pixels. Coordinates start at (0, 0) in the top-left corner.
- Every action you request is followed by a fresh screenshot of the result.
- Applications may take a moment to respond. Use `wait` when the screen has not caught up yet.

## Rules
1. Look at the latest screenshot before every action.
2. Prefer keyboard shortcuts when they are reliable.
3. Click inside a text field before typing into it.
4. If an action fails, read the error and try a different approach.
5. Do not enter credentials, make purchases or send messages unless the user asked for it.
6. When the task is done, stop requesting actions and summarize what you did.
7. If the task cannot be done, explain why."#,
        width = display.width,
        height = display.height
    )
}

/// Instructions for a run: the configured file when set, else the built-in text.
pub fn load_instructions(config: &AgentConfig, display: Resolution) -> Result<String, ConfigError> {
    match &config.instructions_path {
        Some(path) => {
            debug!("Loading instructions from {:?}", path);
            let text = std::fs::read_to_string(path)?;
            if text.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "instructions file {} is empty",
                    path.display()
                )));
            }
            Ok(text)
        }
        None => Ok(default_instructions(display)),
    }
}
