//! Scene Configuration
//!
//! Settings that the editor used to keep in process-wide statics live here
//! and are handed to each [`crate::scene::Scene`] when it is created.
//!
//! Every field has a default, so a partial JSON document is valid:
//!
//! ```json
//! {
//!     "evaluation": { "slow_sweep_warning_ms": 50 },
//!     "properties": { "style": "union" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::properties::PropertiesStyle;

/// Top-level configuration for a scene editing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub evaluation: EvaluationConfig,
    pub primitives: PrimitiveConfig,
    pub properties: PropertiesConfig,
}

/// Settings for the graph sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Sweeps slower than this are logged at warn level.
    pub slow_sweep_warning_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            slow_sweep_warning_ms: 100,
        }
    }
}

/// Sizes of the gizmo primitives used as object bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimitiveConfig {
    /// Length of each axis drawn for a transform.
    pub transform_axis_length: f32,
    /// Half-size of the cross locator shape.
    pub locator_cross_size: f32,
    /// Half-size of the cube locator shape.
    pub locator_cube_size: f32,
    /// Half-size of the light pointer.
    pub light_pointer_extent: f32,
}

impl Default for PrimitiveConfig {
    fn default() -> Self {
        Self {
            transform_axis_length: 0.1,
            locator_cross_size: 1.0,
            locator_cube_size: 0.5,
            light_pointer_extent: 0.5,
        }
    }
}

/// Settings for the properties panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertiesConfig {
    pub style: PropertiesStyle,
}

impl SceneConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config = SceneConfig::from_json_str(
            r#"{ "evaluation": { "slow_sweep_warning_ms": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.evaluation.slow_sweep_warning_ms, 5);
        assert_eq!(config.primitives, PrimitiveConfig::default());
        assert_eq!(config.properties.style, PropertiesStyle::Intersection);
    }

    #[test]
    fn style_is_read_in_lowercase() {
        let config =
            SceneConfig::from_json_str(r#"{ "properties": { "style": "union" } }"#).unwrap();
        assert_eq!(config.properties.style, PropertiesStyle::Union);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SceneConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SceneConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
