//! Error types for scenes and layers

use scenelink_state::SchemaError;
use scenelink_sync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("No layer named \"{0}\"")]
    LayerNotFound(String),

    #[error("Layer index {index} out of range for {len} layers")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{count} layers named \"{name}\"")]
    AmbiguousLayer { name: String, count: usize },

    #[error("Unable to combine {left} with {right}: {reason}")]
    TypeMismatch {
        left: String,
        right: String,
        reason: String,
    },

    #[error("Unable to parse layer of type \"{0}\"")]
    UnknownLayerType(String),

    #[error("Unable to parse scene: {0}")]
    Parse(String),

    #[error("Scenes stored on a state server are not supported: {0}")]
    UnsupportedStateUrl(String),

    #[error("Unable to encode: {0}")]
    Encode(String),
}
