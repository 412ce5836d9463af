//! # Layer Kinds
//!
//! The closed set of layer variants and the registry mapping a record's
//! `type` string to one of them. Each kind carries:
//!
//! - default properties, overlaid by caller-supplied ones
//! - a validation [`Schema`] (`name` and `source` are always required)
//! - a normalizer; segmentation kinds coerce `segments` to strings

use crate::errors::SceneError;
use scenelink_state::{ObservedMap, Rules, Schema, SchemaError};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

pub const NAME: &str = "name";
pub const SOURCE: &str = "source";
pub const TYPE: &str = "type";
pub const SEGMENTS: &str = "segments";

const LAYER_RULES: Rules = Rules::require(&[NAME, SOURCE]);

const IMAGE: Schema = Schema::new("ImageLayer", LAYER_RULES).with_normalizer(normalize_layer);
const SEGMENTATION: Schema =
    Schema::new("SegmentationLayer", LAYER_RULES).with_normalizer(normalize_segmentation);
const ANNOTATION: Schema =
    Schema::new("AnnotationLayer", LAYER_RULES).with_normalizer(normalize_layer);
const MESH: Schema = Schema::new("MeshLayer", LAYER_RULES).with_normalizer(normalize_layer);
const GRAPHENE: Schema =
    Schema::new("GrapheneSegmentationLayer", LAYER_RULES).with_normalizer(normalize_segmentation);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Image,
    Segmentation,
    Annotation,
    Mesh,
    GrapheneSegmentation,
}

impl LayerKind {
    /// Every kind, in display order
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Image,
        LayerKind::Segmentation,
        LayerKind::Annotation,
        LayerKind::Mesh,
        LayerKind::GrapheneSegmentation,
    ];

    /// Value of the record's `type` field
    pub fn type_tag(self) -> &'static str {
        match self {
            LayerKind::Image => "image",
            LayerKind::Segmentation => "segmentation",
            LayerKind::Annotation => "annotation",
            LayerKind::Mesh => "mesh",
            LayerKind::GrapheneSegmentation => "segmentation_with_graph",
        }
    }

    pub fn from_type_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_tag() == tag)
    }

    pub fn schema(self) -> Schema {
        match self {
            LayerKind::Image => IMAGE,
            LayerKind::Segmentation => SEGMENTATION,
            LayerKind::Annotation => ANNOTATION,
            LayerKind::Mesh => MESH,
            LayerKind::GrapheneSegmentation => GRAPHENE,
        }
    }

    /// Kinds that hold a selected-segment list
    pub fn has_segments(self) -> bool {
        matches!(self, LayerKind::Segmentation | LayerKind::GrapheneSegmentation)
    }

    /// Fresh copy of this kind's default properties
    pub fn defaults(self) -> Map<String, Value> {
        let defaults = match self {
            LayerKind::Image => json!({
                "type": "image",
                "blend": "default",
                "shaderControls": {},
                "name": "img",
            }),
            LayerKind::Segmentation => json!({
                "type": "segmentation",
                "selectedAlpha": 0.14,
                "segments": [],
                "skeletonRendering": {"mode2d": "lines_and_points", "mode3d": "lines"},
                "name": "segmentation",
            }),
            LayerKind::Annotation => json!({
                "type": "annotation",
                "name": "annotations",
            }),
            LayerKind::Mesh => json!({
                "type": "mesh",
                "name": "meshes",
            }),
            LayerKind::GrapheneSegmentation => json!({
                "type": "segmentation_with_graph",
                "selectedAlpha": 0.14,
                "segments": [],
                "skeletonRendering": {"mode2d": "lines_and_points", "mode3d": "lines"},
                "graphOperationMarker": [
                    {"annotations": [], "tags": []},
                    {"annotations": [], "tags": []},
                ],
                "pathFinder": {
                    "color": "#ffff00",
                    "pathObject": {
                        "annotationPath": {"annotations": [], "tags": []},
                        "hasPath": false,
                    },
                },
                "name": "segmentation",
            }),
        };

        match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema().entity)
    }
}

impl FromStr for LayerKind {
    type Err = SceneError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::from_type_tag(tag).ok_or_else(|| SceneError::UnknownLayerType(tag.to_string()))
    }
}

/// Coerce one segment ID to its stored string form
fn segment_id(value: &Value) -> Result<String, SchemaError> {
    let invalid = || SchemaError::InvalidValue {
        key: SEGMENTS.to_string(),
        reason: format!("segment IDs must be integers or strings, got {}", value),
    };

    match value {
        Value::String(id) => Ok(id.clone()),
        Value::Number(n) => {
            if let Some(id) = n.as_u64() {
                Ok(id.to_string())
            } else if let Some(id) = n.as_i64() {
                Ok(id.to_string())
            } else {
                // Integral floats (e.g. 42.0) are accepted as IDs
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(63) => {
                        Ok((f as i64).to_string())
                    }
                    _ => Err(invalid()),
                }
            }
        }
        _ => Err(invalid()),
    }
}

/// Normalize a single ID or a list of IDs to a list of strings
pub fn segment_ids(value: &Value) -> Result<Vec<String>, SchemaError> {
    match value {
        Value::Array(items) => items.iter().map(segment_id).collect(),
        single => Ok(vec![segment_id(single)?]),
    }
}

fn normalize_layer(props: &mut ObservedMap) -> Result<(), SchemaError> {
    match props.get(NAME) {
        Some(name) if name.as_str().is_none() => Err(SchemaError::InvalidValue {
            key: NAME.to_string(),
            reason: format!("layer names must be strings, got {}", name.type_name()),
        }),
        _ => Ok(()),
    }
}

fn normalize_segmentation(props: &mut ObservedMap) -> Result<(), SchemaError> {
    normalize_layer(props)?;

    let Some(current) = props.get_value(SEGMENTS) else {
        return Ok(());
    };
    let normalized = Value::from(segment_ids(&current)?);
    if current != normalized {
        props.insert(SEGMENTS, normalized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_registry() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::from_type_tag(kind.type_tag()), Some(kind));
            assert_eq!(kind.defaults()[TYPE], json!(kind.type_tag()));
        }
        assert!(matches!(
            "volume".parse::<LayerKind>(),
            Err(SceneError::UnknownLayerType(tag)) if tag == "volume"
        ));
    }

    #[test]
    fn test_segment_ids_become_strings() {
        assert_eq!(segment_ids(&json!([1, "2", 3.0])).unwrap(), vec!["1", "2", "3"]);
        assert_eq!(segment_ids(&json!(720575940621039145u64)).unwrap(), vec!["720575940621039145"]);
        assert_eq!(segment_ids(&json!("9")).unwrap(), vec!["9"]);
    }

    #[test]
    fn test_invalid_segment_ids() {
        assert!(segment_ids(&json!([1.5])).is_err());
        assert!(segment_ids(&json!([{"id": 1}])).is_err());
        assert!(segment_ids(&json!(null)).is_err());
    }

    #[test]
    fn test_display_uses_class_name() {
        assert_eq!(LayerKind::Image.to_string(), "ImageLayer");
        assert_eq!(LayerKind::GrapheneSegmentation.to_string(), "GrapheneSegmentationLayer");
    }
}
