//! # Computer Actions
//!
//! Typed actions a computer-use model can request. Coordinates are in model
//! space, i.e. the scaled display advertised to the model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the model-space display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Mouse button named by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    #[serde(rename = "wheel", alias = "middle")]
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "wheel",
            Self::Back => "back",
            Self::Forward => "forward",
        }
    }
}

/// An action requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
    },
    DoubleClick {
        x: i32,
        y: i32,
    },
    Type {
        text: String,
    },
    /// Keys pressed together as one chord
    Keypress {
        keys: Vec<String>,
    },
    Move {
        x: i32,
        y: i32,
    },
    /// Scroll deltas are in pixels; positive `scroll_y` scrolls down
    Scroll {
        x: i32,
        y: i32,
        #[serde(default)]
        scroll_x: i32,
        #[serde(default)]
        scroll_y: i32,
    },
    Drag {
        path: Vec<Point>,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ms: Option<u64>,
    },
    Screenshot,
}

impl ComputerAction {
    /// Every wire name [`kind`](Self::kind) can return
    pub const KINDS: &'static [&'static str] = &[
        "click",
        "double_click",
        "type",
        "keypress",
        "move",
        "scroll",
        "drag",
        "wait",
        "screenshot",
    ];

    /// Wire name of the action
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::DoubleClick { .. } => "double_click",
            Self::Type { .. } => "type",
            Self::Keypress { .. } => "keypress",
            Self::Move { .. } => "move",
            Self::Scroll { .. } => "scroll",
            Self::Drag { .. } => "drag",
            Self::Wait { .. } => "wait",
            Self::Screenshot => "screenshot",
        }
    }

    /// The point this action acts at, if it has one
    pub fn target(&self) -> Option<Point> {
        match self {
            Self::Click { x, y, .. }
            | Self::DoubleClick { x, y }
            | Self::Move { x, y }
            | Self::Scroll { x, y, .. } => Some(Point::new(*x, *y)),
            Self::Drag { path } => path.first().copied(),
            Self::Type { .. } | Self::Keypress { .. } | Self::Wait { .. } | Self::Screenshot => {
                None
            }
        }
    }
}

impl fmt::Display for ComputerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click { x, y, button } => write!(f, "click({x}, {y}, {})", button.as_str()),
            Self::DoubleClick { x, y } => write!(f, "double_click({x}, {y})"),
            Self::Type { text } => write!(f, "type({text:?})"),
            Self::Keypress { keys } => write!(f, "keypress({})", keys.join("+")),
            Self::Move { x, y } => write!(f, "move({x}, {y})"),
            Self::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            } => write!(f, "scroll({x}, {y}, dx={scroll_x}, dy={scroll_y})"),
            Self::Drag { path } => match (path.first(), path.last()) {
                (Some(a), Some(b)) => {
                    write!(f, "drag(({}, {}) -> ({}, {}))", a.x, a.y, b.x, b.y)
                }
                _ => write!(f, "drag(<empty>)"),
            },
            Self::Wait { ms: Some(ms) } => write!(f, "wait({ms}ms)"),
            Self::Wait { ms: None } => write!(f, "wait"),
            Self::Screenshot => write!(f, "screenshot"),
        }
    }
}

/// A safety check the provider attached to an action call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One action call from a model turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub call_id: String,
    pub action: ComputerAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_safety_checks: Vec<SafetyCheck>,
}

impl ActionCall {
    pub fn new(call_id: impl Into<String>, action: ComputerAction) -> Self {
        Self {
            call_id: call_id.into(),
            action,
            pending_safety_checks: Vec::new(),
        }
    }
}
