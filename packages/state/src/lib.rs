//! # Scenelink State
//!
//! Property storage shared by every scene entity.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ observed: JSON containers with a callback   │
//! │  - every mutation at any depth fires once   │
//! │  - unwrap back to plain serde_json values   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ properties: PropertyState                   │
//! │  - revision counter driven by the callback  │
//! │  - validate + normalize on every mutation   │
//! │  - stale / unsynced bookkeeping             │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ canonical: sorted-key JSON for URLs/export  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scenelink_state::{PropertyState, Rules, Schema};
//!
//! const LAYER: Schema = Schema::new("Layer", Rules::require(&["name", "source"]));
//!
//! let mut state = PropertyState::new(LAYER, initial)?;
//! state.update(|props| {
//!     if let Some(segments) = props.get_list_mut("segments") {
//!         segments.push("42");
//!     }
//! })?;
//! assert!(state.is_stale());
//! ```

mod canonical;
mod errors;
mod observed;
mod properties;
mod rules;

pub use canonical::{canonical_pretty, canonical_string, sort_keys};
pub use errors::{ContainerError, SchemaError};
pub use observed::{
    add_on_change_callback, compare_values, remove_callback, ChangeCallback, Observed,
    ObservedList, ObservedMap,
};
pub use properties::{ChangeTracker, Normalizer, PropertyState, Schema};
pub use rules::{validate, Rules};

// Re-export the JSON types every caller needs alongside the containers
pub use serde_json::{Map, Value};
