//! Viewer configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! is a valid configuration.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Gap between pages and around the document, in document units.
    pub page_border: f32,
    /// Extra device pixels rendered around the visible part of a page.
    pub render_margin_px: f32,
    /// Width of the dark frame drawn around each page.
    pub frame_width: f32,
    /// Stroke width of ink overlays, in page units.
    pub ink_width: f32,
    /// Ink points closer than this to the previous one are dropped.
    pub ink_min_distance: f32,
    /// Text boxes dragged narrower than this are auto-sized.
    pub min_text_box_width: f32,
    /// Relative zoom change that forces a text overlay re-render.
    pub text_zoom_tolerance: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub initial_zoom: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_border: 20.0,
            render_margin_px: 200.0,
            frame_width: 1.0,
            ink_width: 1.0,
            ink_min_distance: 0.5,
            min_text_box_width: 10.0,
            text_zoom_tolerance: 0.01,
            min_zoom: 0.1,
            max_zoom: 50.0,
            initial_zoom: 1.0,
        }
    }
}

impl ViewerConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("page_border", self.page_border),
            ("render_margin_px", self.render_margin_px),
            ("frame_width", self.frame_width),
            ("ink_min_distance", self.ink_min_distance),
            ("min_text_box_width", self.min_text_box_width),
            ("text_zoom_tolerance", self.text_zoom_tolerance),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be >= 0, got {value}")));
            }
        }
        if !(self.ink_width > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "ink_width must be > 0, got {}",
                self.ink_width
            )));
        }
        if !(self.min_zoom > 0.0) || !(self.max_zoom > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "zoom bounds must be positive, got {}..{}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(self.min_zoom..=self.max_zoom).contains(&self.initial_zoom) {
            return Err(ConfigError::Invalid(format!(
                "initial_zoom {} outside {}..{}",
                self.initial_zoom, self.min_zoom, self.max_zoom
            )));
        }
        Ok(())
    }

    /// Zoom bounds that are safe to clamp with, even for a config that
    /// never went through [`validate`](Self::validate): a bound that is
    /// not a positive finite number falls back to its default, and
    /// inverted bounds are swapped.
    pub fn zoom_bounds(&self) -> (f32, f32) {
        let defaults = Self::default();
        let usable = |z: f32| z > 0.0 && z.is_finite();
        let min = if usable(self.min_zoom) { self.min_zoom } else { defaults.min_zoom };
        let max = if usable(self.max_zoom) { self.max_zoom } else { defaults.max_zoom };
        if min <= max {
            (min, max)
        } else {
            (max, min)
        }
    }

    /// Never panics; NaN clamps to the lower bound.
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        let (min, max) = self.zoom_bounds();
        if zoom.is_nan() {
            return min;
        }
        zoom.clamp(min, max)
    }
}

// ===================================================================
// Tests
// ===================================================================
