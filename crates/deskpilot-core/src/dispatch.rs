//! Translation of model actions into desktop calls.
//!
//! Actions arrive in model space; every coordinate goes through
//! [`ResolutionScaler::to_original`] before it reaches the desktop.

use crate::config::AgentConfig;
use deskpilot_desktop::{Button, DesktopError, DesktopSandbox, ResolutionScaler, ScrollDirection};
use deskpilot_providers::{ComputerAction, MouseButton, Point};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Wait used when the model omits a duration
const DEFAULT_WAIT_MS: u64 = 1000;

/// Why one action could not be performed
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Desktop(#[from] DesktopError),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

/// Perform one action and describe what was done.
pub async fn dispatch<D: DesktopSandbox + ?Sized>(
    action: &ComputerAction,
    desktop: &D,
    scaler: &ResolutionScaler,
    config: &AgentConfig,
) -> Result<String, DispatchError> {
    debug!("Dispatching {}", action);

    match action {
        ComputerAction::Screenshot => Ok("screenshot taken".to_string()),

        ComputerAction::Click { x, y, button } => {
            let (nx, ny) = scaler.to_original(*x, *y);
            match button {
                MouseButton::Left => desktop.left_click(nx, ny).await?,
                MouseButton::Right => desktop.right_click(nx, ny).await?,
                MouseButton::Middle => desktop.middle_click(nx, ny).await?,
                MouseButton::Back => desktop.click_button(nx, ny, Button::Back).await?,
                MouseButton::Forward => desktop.click_button(nx, ny, Button::Forward).await?,
            }
            Ok(format!("{} click at ({nx}, {ny})", button.as_str()))
        }

        ComputerAction::DoubleClick { x, y } => {
            let (nx, ny) = scaler.to_original(*x, *y);
            desktop.double_click(nx, ny).await?;
            Ok(format!("double click at ({nx}, {ny})"))
        }

        ComputerAction::Type { text } => {
            desktop.write(text).await?;
            Ok(format!("typed {} characters", text.chars().count()))
        }

        ComputerAction::Keypress { keys } => {
            if keys.is_empty() {
                return Err(DispatchError::InvalidAction(
                    "keypress without keys".to_string(),
                ));
            }
            desktop.press(keys).await?;
            Ok(format!("pressed {}", keys.join("+")))
        }

        ComputerAction::Move { x, y } => {
            let (nx, ny) = scaler.to_original(*x, *y);
            desktop.move_mouse(nx, ny).await?;
            Ok(format!("moved to ({nx}, {ny})"))
        }

        ComputerAction::Scroll {
            x,
            y,
            scroll_x,
            scroll_y,
        } => {
            let (nx, ny) = scaler.to_original(*x, *y);
            desktop.move_mouse(nx, ny).await?;

            let step = config.scroll_pixels_per_click;
            if *scroll_y != 0 {
                let direction = if *scroll_y < 0 {
                    ScrollDirection::Up
                } else {
                    ScrollDirection::Down
                };
                desktop.scroll(direction, wheel_clicks(*scroll_y, step)).await?;
            }
            if *scroll_x != 0 {
                let direction = if *scroll_x < 0 {
                    ScrollDirection::Left
                } else {
                    ScrollDirection::Right
                };
                desktop.scroll(direction, wheel_clicks(*scroll_x, step)).await?;
            }
            Ok(format!("scrolled ({scroll_x}, {scroll_y}) at ({nx}, {ny})"))
        }

        ComputerAction::Drag { path } => {
            let (first, last) = drag_endpoints(path)?;
            let from = scaler.to_original(first.x, first.y);
            let to = scaler.to_original(last.x, last.y);
            desktop.drag(from, to).await?;
            Ok(format!("dragged from {from:?} to {to:?}"))
        }

        ComputerAction::Wait { ms } => {
            let wait =
                Duration::from_millis(ms.unwrap_or(DEFAULT_WAIT_MS)).min(config.max_wait());
            tokio::time::sleep(wait).await;
            Ok(format!("waited {}ms", wait.as_millis()))
        }
    }
}

/// Wheel clicks for a pixel delta, at least one for any nonzero delta.
pub fn wheel_clicks(delta: i32, pixels_per_click: u32) -> u32 {
    let step = pixels_per_click.max(1);
    let pixels = delta.unsigned_abs();
    if pixels == 0 {
        return 0;
    }
    ((pixels + step / 2) / step).max(1)
}

fn drag_endpoints(path: &[Point]) -> Result<(Point, Point), DispatchError> {
    match (path.first(), path.last()) {
        (Some(first), Some(last)) if path.len() >= 2 => Ok((*first, *last)),
        _ => Err(DispatchError::InvalidAction(format!(
            "drag needs at least two points, got {}",
            path.len()
        ))),
    }
}
