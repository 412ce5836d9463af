//! # Merge / Combine
//!
//! Layer merging dispatches on the pair of kinds:
//!
//! | left          | right         | result                                  |
//! |---------------|---------------|-----------------------------------------|
//! | image         | image         | left overlaid by right (same source)    |
//! | segmentation  | segmentation  | union of selected segments (same source)|
//! | anything else |               | [`MergeOutcome::Unmergeable`]           |
//!
//! A merged layer always keeps the left-hand name.
//!
//! Scene combining never fails: `concat` appends copies of every layer,
//! `merge` folds each right-hand layer into the first compatible
//! left-hand layer and appends it when none accepts. Inputs are never
//! mutated.

use crate::kind::{LayerKind, NAME};
use crate::layer::Layer;
use crate::scene::Scene;
use indexmap::IndexSet;
use tracing::debug;

#[derive(Debug, PartialEq)]
pub enum MergeOutcome {
    Merged(Layer),
    Unmergeable { reason: String },
}

impl MergeOutcome {
    fn refuse(reason: impl Into<String>) -> Self {
        MergeOutcome::Unmergeable {
            reason: reason.into(),
        }
    }
}

/// Merge `right` into a copy of `left`
pub fn merge_layers(left: &Layer, right: &Layer) -> MergeOutcome {
    if left.kind() != right.kind() {
        return MergeOutcome::refuse("layers are of different kinds");
    }

    let kind = left.kind();
    if kind != LayerKind::Image && !kind.has_segments() {
        return MergeOutcome::refuse(format!("merging is not supported for {}", kind));
    }

    if left.source() != right.source() {
        return MergeOutcome::refuse("layers have different sources");
    }

    let mut merged = left.clone();
    let result = if kind == LayerKind::Image {
        // The merged layer keeps its slot, so it keeps its name too
        let mut overlay = right.as_dict();
        overlay.remove(NAME);
        merged.overlay(overlay)
    } else {
        let mut segments: IndexSet<String> = left.segments().into_iter().collect();
        segments.extend(right.segments());
        merged.replace_segments(segments.into_iter().collect())
    };

    match result {
        Ok(()) => MergeOutcome::Merged(merged),
        Err(err) => MergeOutcome::refuse(err.to_string()),
    }
}

/// Copy of `left` followed by copies of every layer of `right`
pub fn concat(left: &Scene, right: &Scene) -> Scene {
    let mut combined = left.clone();
    combined.insert_layers_local(right.layers().iter().cloned(), None);
    combined
}

/// Copy of `left` with each layer of `right` merged in where possible
pub fn merge(left: &Scene, right: &Scene) -> Scene {
    let mut combined = left.clone();

    for incoming in right.layers().iter() {
        let merged = combined
            .layers()
            .iter()
            .enumerate()
            .find_map(|(index, existing)| match merge_layers(existing, incoming) {
                MergeOutcome::Merged(layer) => Some((index, layer)),
                MergeOutcome::Unmergeable { reason } => {
                    debug!(
                        existing = existing.name(),
                        incoming = incoming.name(),
                        %reason,
                        "Layers not merged"
                    );
                    None
                }
            });

        match merged {
            Some((index, layer)) => combined.replace_layer_local(index, layer),
            None => {
                combined.insert_layers_local([incoming.clone()], None);
            }
        }
    }

    combined
}
