//! # Scenelink Scene
//!
//! Programmatic construction, parsing and combining of viewer scenes,
//! with optional live sync against a running viewer.
//!
//! ## Architecture
//!
//! ```text
//!   URL / JSON ──parse──▶ Scene ──make_url──▶ URL
//!                          │
//!              ┌───────────┼────────────┐
//!              ▼           ▼            ▼
//!        PropertyState  LayerManager  RemoteLink ──▶ Viewer
//!                          │
//!                          ▼
//!                   Layer (kind + PropertyState + RemoteLink)
//! ```
//!
//! - `kind`: closed set of layer kinds with their schemas and defaults
//! - `layer` / `manager`: layers and the name-unique collection
//! - `merge`: layer merging and scene concat/merge
//! - `shareable`: URL encoding and decoding
//! - `bulk`: scoped suspension of remote sync
//! - `precomputed`: binary mesh/skeleton payloads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scenelink_scene::{Layer, Scene};
//!
//! let mut scene = Scene::new()?;
//! scene.add_layers([
//!     Layer::image("precomputed://gs://neuroglancer-fafb-data/fafb_v14/fafb_v14_clahe")?,
//!     Layer::segmentation("precomputed://gs://fafb-ffn1-20200412/segmentation")?
//!         .with("segments", serde_json::json!([710435991]))?,
//! ])?;
//! println!("{}", scene.url()?);
//! ```

mod bulk;
mod context;
mod errors;
mod kind;
mod layer;
mod manager;
mod merge;
pub mod precomputed;
mod scene;
pub mod shareable;

pub use bulk::BulkUpdate;
pub use context::{CoordinateSpace, ParseOptions, SceneContext, DEFAULT_BASE_URL};
pub use errors::SceneError;
pub use kind::LayerKind;
pub use layer::{Layer, LOCAL_ANNOTATIONS_URL};
pub use manager::{LayerManager, LayerRef};
pub use merge::{merge_layers, MergeOutcome};
pub use scene::{parse_layers, Scene};
pub use shareable::{is_state_url, is_url, make_url, parse_scene_string, ParsedScene};

pub use scenelink_state::PropertyState;
pub use scenelink_sync::{LinkState, MemoryViewer, PushMode, PushOutcome, Viewer};
