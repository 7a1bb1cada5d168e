//! Viewer configuration: timeline fallbacks, waterfall layout, zoom limits.
//!
//! Every field has a default, so an empty TOML document (or none at all)
//! yields the stock viewer.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Duration assigned to observations without an end time or latency, and
/// to a trace whose observations carry no end time at all.
pub const DEFAULT_DURATION_MS: f64 = 100.0;

/// Upper bound for the fallback duration: one year.
pub const MAX_DEFAULT_DURATION_MS: f64 = 365.0 * 24.0 * 3_600_000.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub timeline: TimelineConfig,
    pub layout: LayoutConfig,
    pub zoom: ZoomConfig,
}

impl ViewerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let duration = self.timeline.default_duration_ms;
        if !positive(duration) || duration > MAX_DEFAULT_DURATION_MS {
            return Err(ConfigError::Invalid(
                "timeline.default_duration_ms must be positive and at most one year".into(),
            ));
        }
        if !positive(self.layout.row_height) || self.layout.bar_height > self.layout.row_height {
            return Err(ConfigError::Invalid(
                "layout.row_height must be positive and at least bar_height".into(),
            ));
        }
        if !positive(self.zoom.min_scale) || self.zoom.min_scale > self.zoom.max_scale {
            return Err(ConfigError::Invalid(
                "zoom.min_scale must be positive and not exceed zoom.max_scale".into(),
            ));
        }
        if !(self.zoom.in_factor.is_finite() && self.zoom.in_factor > 1.0)
            || !(positive(self.zoom.out_factor) && self.zoom.out_factor < 1.0)
        {
            return Err(ConfigError::Invalid(
                "zoom.in_factor must exceed 1 and zoom.out_factor must lie in (0, 1)".into(),
            ));
        }
        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelineConfig {
    pub default_duration_ms: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 40.0,
            right: 20.0,
            bottom: 20.0,
            left: 250.0,
        }
    }
}

/// Waterfall geometry in logical pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub margin: Margins,
    pub row_height: f64,
    pub bar_height: f64,
    pub indent_per_level: f64,
    /// Bars never render narrower than this, whatever the time scale.
    pub min_bar_width: f64,
    pub max_ticks: u32,
    pub min_tick_spacing: f64,
    pub font_size: f64,
    pub root_font_size: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin: Margins::default(),
            row_height: 32.0,
            bar_height: 24.0,
            indent_per_level: 20.0,
            min_bar_width: 2.0,
            max_ticks: 10,
            min_tick_spacing: 80.0,
            font_size: 13.0,
            root_font_size: 14.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoomConfig {
    pub in_factor: f64,
    pub out_factor: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub transition_ms: f64,
    pub fit_transition_ms: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            in_factor: 1.3,
            out_factor: 0.7,
            min_scale: 0.5,
            max_scale: 5.0,
            transition_ms: 300.0,
            fit_transition_ms: 750.0,
        }
    }
}
