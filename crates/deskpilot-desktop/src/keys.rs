//! Translation of model key names to xdotool keysyms.
//!
//! Models name keys loosely ("ENTER", "ctrl", "ArrowUp", "PAGE_DOWN").
//! Names are matched case-insensitively with `_`, `-` and spaces ignored.

use crate::{DesktopError, Result};

/// Translate one key name to an xdotool keysym.
///
/// Single letters are lowercased so a chord like `CTRL+A` does not add an
/// implicit shift. Punctuation maps to its keysym name. Unknown longer names
/// pass through unchanged.
pub fn to_xdotool_key(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DesktopError::InvalidKey(name.to_string()));
    }

    let mut chars = trimmed.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(single_char_key(c));
    }

    let normalized: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect();

    let keysym = match normalized.as_str() {
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "tab" => "Tab",
        "space" | "spacebar" => "space",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "insert" | "ins" => "Insert",
        "home" => "Home",
        "end" => "End",
        "pageup" | "pgup" => "Page_Up",
        "pagedown" | "pgdn" => "Page_Down",
        "up" | "arrowup" => "Up",
        "down" | "arrowdown" => "Down",
        "left" | "arrowleft" => "Left",
        "right" | "arrowright" => "Right",
        "ctrl" | "control" | "controlleft" | "lctrl" => "ctrl",
        "shift" | "shiftleft" | "lshift" => "shift",
        "alt" | "option" | "altleft" | "lalt" => "alt",
        "super" | "meta" | "win" | "windows" | "cmd" | "command" => "super",
        "capslock" => "Caps_Lock",
        "printscreen" | "print" => "Print",
        "menu" => "Menu",
        "plus" => "plus",
        "minus" => "minus",
        _ => {
            if let Some(n) = normalized.strip_prefix('f') {
                if let Ok(n) = n.parse::<u8>() {
                    if (1..=24).contains(&n) {
                        return Ok(format!("F{n}"));
                    }
                }
            }
            return Ok(trimmed.to_string());
        }
    };

    Ok(keysym.to_string())
}

fn single_char_key(c: char) -> String {
    match c {
        ' ' => "space".to_string(),
        '+' => "plus".to_string(),
        '-' => "minus".to_string(),
        '/' => "slash".to_string(),
        '\\' => "backslash".to_string(),
        '.' => "period".to_string(),
        ',' => "comma".to_string(),
        ';' => "semicolon".to_string(),
        '\'' => "apostrophe".to_string(),
        '=' => "equal".to_string(),
        '`' => "grave".to_string(),
        '[' => "bracketleft".to_string(),
        ']' => "bracketright".to_string(),
        c if c.is_ascii_alphabetic() => c.to_ascii_lowercase().to_string(),
        c => c.to_string(),
    }
}

/// Translate a chord (keys held together) into an xdotool `key` argument,
/// e.g. `["CTRL", "SHIFT", "T"]` -> `ctrl+shift+t`.
pub fn to_xdotool_chord(keys: &[String]) -> Result<String> {
    if keys.is_empty() {
        return Err(DesktopError::InvalidKey("empty key chord".to_string()));
    }
    let parts = keys
        .iter()
        .map(|k| to_xdotool_key(k))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("+"))
}
