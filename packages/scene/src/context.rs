//! Caller-supplied configuration for building and parsing scenes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Viewer instance used when no base URL is given
pub const DEFAULT_BASE_URL: &str = "https://neuroglancer-demo.appspot.com/";

/// Everything scene construction needs that is not part of the scene
/// itself. Passed explicitly; there is no process-wide default.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneContext {
    /// Root address for shareable URLs
    pub base_url: String,
    pub parse: ParseOptions,
    /// Coordinate metadata for synthesized local sources
    pub coordinates: CoordinateSpace,
}

impl SceneContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }

    pub fn with_coordinates(mut self, coordinates: CoordinateSpace) -> Self {
        self.coordinates = coordinates;
        self
    }
}

impl Default for SceneContext {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            parse: ParseOptions::default(),
            coordinates: CoordinateSpace::default(),
        }
    }
}

/// How layer records are turned into layers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Drop records with an unknown `type` instead of failing
    pub skip_unknown: bool,
    /// Keep records flagged `archived`
    pub include_archived: bool,
}

/// Named axes sharing one unit, e.g. x/y/z in nanometres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSpace {
    pub names: Vec<String>,
    pub units: String,
    pub scales: Vec<f64>,
}

impl CoordinateSpace {
    /// Viewer dimension mapping: `{"x": [scale, unit], ...}`
    pub fn to_json(&self) -> Value {
        let dimensions: Map<String, Value> = self
            .names
            .iter()
            .zip(&self.scales)
            .map(|(name, scale)| {
                (
                    name.clone(),
                    Value::Array(vec![Value::from(*scale), Value::from(self.units.clone())]),
                )
            })
            .collect();
        Value::Object(dimensions)
    }
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        Self {
            names: vec!["x".to_string(), "y".to_string(), "z".to_string()],
            units: "nm".to_string(),
            scales: vec![1.0, 1.0, 1.0],
        }
    }
}
