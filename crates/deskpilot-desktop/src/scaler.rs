//! Resolution scaling between the model's display and the native screen.
//!
//! Computer-use models work best on small displays, so the model sees a
//! scaled copy of the screen and reports coordinates in that space. The
//! scaler maps those back to native pixels, linearly.

use crate::Result;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// A display size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `WIDTHxHEIGHT` (also the `WIDTH HEIGHT` form printed by
    /// `xdotool getdisplaygeometry`).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s
            .trim()
            .split(|c: char| c == 'x' || c == 'X' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let width = parts.next()?.parse().ok()?;
        let height = parts.next()?.parse().ok()?;
        if parts.next().is_some() || width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A PNG already scaled to the model's display.
#[derive(Clone, PartialEq, Eq)]
pub struct ScaledImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for ScaledImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScaledImage({}x{}, {} bytes)", self.width, self.height, self.png.len())
    }
}

/// Linear map between the scaled (model) and original (native) resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionScaler {
    original: Resolution,
    scaled: Resolution,
}

impl ResolutionScaler {
    /// Fit `original` inside `max`, keeping the aspect ratio. Never upscales.
    pub fn new(original: Resolution, max: Resolution) -> Self {
        let original = Resolution::new(original.width.max(1), original.height.max(1));
        let ratio = (max.width as f64 / original.width as f64)
            .min(max.height as f64 / original.height as f64)
            .min(1.0);

        let scaled = Resolution::new(
            ((original.width as f64 * ratio).round() as u32).max(1),
            ((original.height as f64 * ratio).round() as u32).max(1),
        );

        Self { original, scaled }
    }

    /// No scaling at all
    pub fn identity(resolution: Resolution) -> Self {
        Self::new(resolution, resolution)
    }

    pub fn original(&self) -> Resolution {
        self.original
    }

    pub fn scaled(&self) -> Resolution {
        self.scaled
    }

    pub fn is_identity(&self) -> bool {
        self.original == self.scaled
    }

    /// Model-space point to native pixels
    pub fn to_original(&self, x: i32, y: i32) -> (i32, i32) {
        (
            map_axis(x, self.scaled.width, self.original.width),
            map_axis(y, self.scaled.height, self.original.height),
        )
    }

    /// Native pixels to model-space point
    pub fn to_scaled(&self, x: i32, y: i32) -> (i32, i32) {
        (
            map_axis(x, self.original.width, self.scaled.width),
            map_axis(y, self.original.height, self.scaled.height),
        )
    }

    /// Resize a native screenshot to the scaled resolution.
    pub fn scale_screenshot(&self, png: &[u8]) -> Result<ScaledImage> {
        let img = image::load_from_memory(png)?;

        if img.width() == self.scaled.width && img.height() == self.scaled.height {
            return Ok(ScaledImage {
                png: png.to_vec(),
                width: img.width(),
                height: img.height(),
            });
        }

        let resized = img.resize_exact(self.scaled.width, self.scaled.height, FilterType::Lanczos3);
        let mut buffer = Cursor::new(Vec::new());
        resized.write_to(&mut buffer, image::ImageFormat::Png)?;

        Ok(ScaledImage {
            png: buffer.into_inner(),
            width: self.scaled.width,
            height: self.scaled.height,
        })
    }
}

fn map_axis(value: i32, from: u32, to: u32) -> i32 {
    let mapped = (value as f64 * to as f64 / from as f64).round() as i64;
    mapped.clamp(0, to.saturating_sub(1) as i64) as i32
}
