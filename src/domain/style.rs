//! Style values pushed to the map host

use super::types::{EntityKind, JoinKey};
use serde::Deserialize;

/// Stroke and opacity settings shared by every entity of a layer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerStyle {
    pub stroke_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
    #[serde(default)]
    pub dash_array: Option<String>,
}

impl LayerStyle {
    /// Resting outline: thin dashed white border
    pub fn base_default() -> Self {
        Self {
            stroke_color: "white".to_string(),
            weight: 2.0,
            opacity: 1.0,
            fill_opacity: 0.7,
            dash_array: Some("3".to_string()),
        }
    }

    /// Hover outline: heavy solid grey border
    pub fn highlight_default() -> Self {
        Self {
            stroke_color: "#666".to_string(),
            weight: 5.0,
            opacity: 1.0,
            fill_opacity: 0.7,
            dash_array: None,
        }
    }

    pub fn apply(&self, key: &JoinKey, kind: EntityKind, color_key: &str, highlighted: bool) -> StyleApply {
        StyleApply {
            key: key.clone(),
            kind,
            color_key: color_key.to_string(),
            stroke_color: self.stroke_color.clone(),
            weight: self.weight,
            opacity: self.opacity,
            fill_opacity: self.fill_opacity,
            dash_array: self.dash_array.clone(),
            highlighted,
        }
    }
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self::base_default()
    }
}

/// A single style-apply call for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct StyleApply {
    pub key: JoinKey,
    pub kind: EntityKind,
    /// Fill colour chosen by the classifier
    pub color_key: String,
    pub stroke_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
    pub dash_array: Option<String>,
    pub highlighted: bool,
}
