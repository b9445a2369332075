//! Editor configuration
//!
//! Every tunable the engine reads lives here. Pixel-denominated values are in
//! screen pixels and get divided by the current zoom before use in document
//! space, so hit areas and handles keep a constant on-screen size.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid editor config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid editor config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Fraction of the viewport the page occupies after a page fit.
    pub fit_margin: f64,
    /// Never auto-zoom past native resolution when fitting a page.
    pub fit_caps_at_native: bool,
    /// Exponential zoom factor per wheel delta unit.
    pub wheel_zoom_sensitivity: f64,
    pub hit_tolerance_px: f64,
    pub handle_size_px: f64,
    /// Click radius around a polygon's first vertex that closes it.
    pub close_radius_px: f64,
    pub pin_radius_px: f64,
    /// Two-point shapes shorter than this on screen are discarded.
    pub min_shape_px: f64,
    /// Offset applied to duplicated markups, in document units.
    pub duplicate_offset: f64,
    pub symbol_size: f64,
    pub font_size: f64,
    /// Average glyph width as a fraction of the font size.
    pub glyph_width_factor: f64,
    pub line_height_factor: f64,
    pub highlighter_opacity: f64,
    pub highlighter_width_factor: f64,
    pub cloud_scallop_length: f64,
    /// Normalized distance under which photo pins are treated as colliding.
    pub pin_collision_tolerance: f64,
    pub history_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 10.0,
            fit_margin: 0.95,
            fit_caps_at_native: true,
            wheel_zoom_sensitivity: 0.0015,
            hit_tolerance_px: 3.0,
            handle_size_px: 8.0,
            close_radius_px: 10.0,
            pin_radius_px: 12.0,
            min_shape_px: 2.0,
            duplicate_offset: 20.0,
            symbol_size: 48.0,
            font_size: 16.0,
            glyph_width_factor: 0.6,
            line_height_factor: 1.2,
            highlighter_opacity: 0.4,
            highlighter_width_factor: 4.0,
            cloud_scallop_length: 12.0,
            pin_collision_tolerance: 0.005,
            history_limit: 100,
        }
    }
}

impl EditorConfig {
    /// Parse a JSON document; missing keys fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_zoom > 0.0 && self.min_zoom < self.max_zoom) {
            return Err(ConfigError::Invalid(format!(
                "zoom range {}..{} is empty or non-positive",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(self.fit_margin > 0.0 && self.fit_margin <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "fit_margin {} must be in (0, 1]",
                self.fit_margin
            )));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn text_metrics(&self) -> TextMetrics {
        TextMetrics {
            default_font_size: self.font_size,
            glyph_width_factor: self.glyph_width_factor,
            line_height_factor: self.line_height_factor,
        }
    }
}

/// Text box estimate without a real font: characters x font size x glyph factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub default_font_size: f64,
    pub glyph_width_factor: f64,
    pub line_height_factor: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        EditorConfig::default().text_metrics()
    }
}

impl TextMetrics {
    /// Width and height of a text block at the given font size.
    pub fn block_size(&self, text: &str, font_size: f64) -> (f64, f64) {
        let lines: Vec<&str> = text.split('\n').collect();
        let longest = lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        let width = longest as f64 * font_size * self.glyph_width_factor;
        let height = lines.len().max(1) as f64 * font_size * self.line_height_factor;
        (width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json_str(r#"{ "max_zoom": 6.0, "history_limit": 10 }"#)
            .expect("valid config");
        assert_eq!(config.max_zoom, 6.0);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.min_zoom, 0.1);
        assert_eq!(config.fit_margin, 0.95);
    }

    #[test]
    fn test_rejects_inverted_zoom_range() {
        let err = EditorConfig::from_json_str(r#"{ "min_zoom": 5.0, "max_zoom": 2.0 }"#)
            .expect_err("inverted range");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = EditorConfig::from_json_str("{ not json").expect_err("malformed");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_text_block_estimate() {
        let metrics = EditorConfig::default().text_metrics();
        let (width, height) = metrics.block_size("abcd\nab", 10.0);
        assert!((width - 24.0).abs() < 1e-9);
        assert!((height - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_has_a_clickable_box() {
        let (width, height) = TextMetrics::default().block_size("", 10.0);
        assert!(width > 0.0);
        assert!(height > 0.0);
    }
}
