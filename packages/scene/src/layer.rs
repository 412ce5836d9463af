//! # Layers
//!
//! A [`Layer`] is one entity of a scene: a kind, a validated property
//! state and an optional link to a remote viewer record.
//!
//! Properties are read and written through an explicit accessor surface
//! (`get`/`set`/`remove`/`update` plus `name`, `source`, `segments`).
//! When the layer is linked and unlocked, every successful write is
//! pushed to the viewer straight away.

use crate::context::CoordinateSpace;
use crate::errors::SceneError;
use crate::kind::{segment_ids, LayerKind, NAME, SEGMENTS, SOURCE, TYPE};
use crate::merge::{merge_layers, MergeOutcome};
use scenelink_state::{ObservedMap, PropertyState};
use scenelink_sync::{
    drop_record, link_record, pull_record, push_record, LinkState, PushMode, PushOutcome,
    RecordTarget, RemoteLink, SyncError, Viewer,
};
use serde_json::{json, Map, Value};
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

/// Source URL of synthesized local annotation layers
pub const LOCAL_ANNOTATIONS_URL: &str = "local://annotations";

#[derive(Debug)]
pub struct Layer {
    kind: LayerKind,
    state: PropertyState,
    link: RemoteLink,
}

impl Layer {
    /// Build a layer from the kind's defaults, then `source`, then
    /// `properties` (later entries win)
    pub fn new(
        kind: LayerKind,
        source: impl Into<Value>,
        properties: Map<String, Value>,
    ) -> Result<Self, SceneError> {
        let mut props = kind.defaults();
        props.insert(SOURCE.to_string(), source.into());
        props.extend(properties);
        Self::from_props(kind, props)
    }

    pub fn image(source: impl Into<Value>) -> Result<Self, SceneError> {
        Self::new(LayerKind::Image, source, Map::new())
    }

    pub fn segmentation(source: impl Into<Value>) -> Result<Self, SceneError> {
        Self::new(LayerKind::Segmentation, source, Map::new())
    }

    pub fn annotation(source: impl Into<Value>) -> Result<Self, SceneError> {
        Self::new(LayerKind::Annotation, source, Map::new())
    }

    pub fn mesh(source: impl Into<Value>) -> Result<Self, SceneError> {
        Self::new(LayerKind::Mesh, source, Map::new())
    }

    pub fn graphene(source: impl Into<Value>) -> Result<Self, SceneError> {
        Self::new(LayerKind::GrapheneSegmentation, source, Map::new())
    }

    /// Annotation layer whose source is synthesized from `coordinates`
    pub fn local_annotations(
        name: impl Into<String>,
        coordinates: &CoordinateSpace,
    ) -> Result<Self, SceneError> {
        let source = json!({
            "url": LOCAL_ANNOTATIONS_URL,
            "transform": {"outputDimensions": coordinates.to_json()},
        });

        let mut props = Map::new();
        props.insert(NAME.to_string(), Value::String(name.into()));
        props.insert("annotations".to_string(), Value::Array(Vec::new()));
        Self::new(LayerKind::Annotation, source, props)
    }

    /// Build a layer from a viewer record, dispatching on its `type`
    pub fn from_record(record: Map<String, Value>) -> Result<Self, SceneError> {
        let tag = record
            .get(TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| SceneError::UnknownLayerType("<missing>".to_string()))?;
        let kind: LayerKind = tag.parse()?;

        let mut props = kind.defaults();
        props.extend(record);
        Self::from_props(kind, props)
    }

    fn from_props(kind: LayerKind, props: Map<String, Value>) -> Result<Self, SceneError> {
        Ok(Self {
            kind,
            state: PropertyState::new(kind.schema(), props)?,
            link: RemoteLink::new(),
        })
    }

    /// Chainable [`Layer::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self, SceneError> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.state.get_str(NAME).unwrap_or_default()
    }

    pub fn source(&self) -> Option<Value> {
        self.state.get_value(SOURCE)
    }

    /// Source URL, whether the source is a plain string or a `{url: ...}`
    /// mapping
    pub fn source_url(&self) -> Option<String> {
        match self.source()? {
            Value::String(url) => Some(url),
            Value::Object(source) => source.get("url").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    /// Selected segment IDs; empty for kinds without segments
    pub fn segments(&self) -> Vec<String> {
        self.state
            .get_value(SEGMENTS)
            .and_then(|segments| segment_ids(&segments).ok())
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.get_value(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.contains(key)
    }

    pub fn state(&self) -> &PropertyState {
        &self.state
    }

    /// Set one property, then push if linked
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, SceneError> {
        let previous = self.state.set(key, value)?;
        self.after_edit()?;
        Ok(previous)
    }

    /// Delete one property, then push if linked
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, SceneError> {
        let previous = self.state.remove(key)?;
        self.after_edit()?;
        Ok(previous)
    }

    /// Edit the observed properties in place, then push if anything changed
    pub fn update<R>(&mut self, edit: impl FnOnce(&mut ObservedMap) -> R) -> Result<R, SceneError> {
        let revision = self.state.revision();
        let out = self.state.update(edit)?;
        if self.state.revision() != revision {
            self.after_edit()?;
        }
        Ok(out)
    }

    /// Rename without pushing; used when the layer enters a manager
    pub(crate) fn rename(&mut self, name: String) {
        if let Err(err) = self.state.set(NAME, name) {
            warn!(layer = self.name(), error = %err, "Rename rejected");
        }
    }

    fn after_edit(&mut self) -> Result<(), SceneError> {
        if self.link.is_linked() {
            self.push()?;
        }
        Ok(())
    }

    /// Plain copy of the properties
    pub fn as_dict(&self) -> Map<String, Value> {
        self.state.as_dict()
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, SceneError> {
        Ok(self.state.to_json(pretty)?)
    }

    pub(crate) fn mark_materialized(&mut self) {
        self.state.mark_materialized();
    }

    pub(crate) fn mark_synced(&mut self) {
        self.state.mark_synced();
    }

    // --- Remote sync ---

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_linked()
    }

    /// Register this layer with `viewer` and push its properties.
    ///
    /// Fails with a conflict if the viewer already has a layer of this name.
    #[instrument(skip(self, viewer), fields(layer = %self.name()))]
    pub fn link(&mut self, viewer: &Rc<dyn Viewer>) -> Result<(), SceneError> {
        if self.link.is_linked() {
            return Err(SyncError::AlreadyLinked.into());
        }

        link_record(viewer.as_ref(), self.name())?;
        self.link.attach(viewer)?;
        self.push()?;
        Ok(())
    }

    /// Overwrite the remote record's fields with local ones
    pub fn push(&mut self) -> Result<PushOutcome, SceneError> {
        self.push_with(PushMode::Merge)
    }

    pub fn push_with(&mut self, mode: PushMode) -> Result<PushOutcome, SceneError> {
        let props = self.state.as_dict();
        let outcome = push_record(&self.link, RecordTarget::Layer(self.name()), &props, mode)?;
        if outcome == PushOutcome::Pushed {
            self.state.mark_synced();
        }
        Ok(outcome)
    }

    /// Replace local properties with the remote record.
    ///
    /// Returns `false` when the link is locked and nothing was read. A
    /// failed pull leaves local properties untouched.
    pub fn pull(&mut self) -> Result<bool, SceneError> {
        let Some(record) = pull_record(&self.link, RecordTarget::Layer(self.name()))? else {
            return Ok(false);
        };

        self.apply_pulled(record)?;
        debug!(layer = self.name(), "Pulled layer state");
        Ok(true)
    }

    pub(crate) fn apply_pulled(&mut self, record: Map<String, Value>) -> Result<(), SceneError> {
        self.state.replace(record)?;
        self.state.mark_synced();
        Ok(())
    }

    /// Current state, pulled first when linked and unlocked
    pub fn refreshed_state(&mut self) -> Result<&PropertyState, SceneError> {
        if self.link.state() == LinkState::Linked {
            self.pull()?;
        }
        Ok(&self.state)
    }

    /// Retract the remote record and detach.
    ///
    /// A viewer that no longer exists, or a record another client already
    /// removed, leaves nothing to retract, so the layer simply detaches.
    pub fn unlink(&mut self) -> Result<(), SceneError> {
        match self.link.viewer() {
            Ok(viewer) => {
                match drop_record(viewer.as_ref(), self.name()) {
                    Ok(()) => {}
                    Err(SyncError::NotFound(name)) => {
                        debug!(layer = %name, "Remote record already gone");
                    }
                    Err(err) => return Err(err.into()),
                }
                self.link.detach();
                Ok(())
            }
            Err(SyncError::ViewerDropped) => {
                self.link.detach();
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Forget the viewer without touching the remote record
    pub fn detach(&mut self) {
        self.link.detach();
    }

    pub(crate) fn link_mut(&mut self) -> &mut RemoteLink {
        &mut self.link
    }

    // --- Combining ---

    /// Merge `other` into a copy of this layer, or explain why not
    pub fn try_merge(&self, other: &Layer) -> Result<Layer, SceneError> {
        match merge_layers(self, other) {
            MergeOutcome::Merged(layer) => Ok(layer),
            MergeOutcome::Unmergeable { reason } => Err(SceneError::TypeMismatch {
                left: self.kind.to_string(),
                right: other.kind.to_string(),
                reason,
            }),
        }
    }

    /// Set all properties at once, without pushing; used by the merge engine
    pub(crate) fn overlay(&mut self, properties: Map<String, Value>) -> Result<(), SceneError> {
        self.state.update(|props| props.update(properties))?;
        Ok(())
    }

    pub(crate) fn replace_segments(&mut self, segments: Vec<String>) -> Result<(), SceneError> {
        self.state.set(SEGMENTS, segments)?;
        Ok(())
    }
}

/// Structurally equal copy with no remote link
impl Clone for Layer {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            state: self.state.clone(),
            link: RemoteLink::new(),
        }
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.state == other.state
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self
            .source_url()
            .or_else(|| self.source().map(|source| source.to_string()))
            .unwrap_or_default();

        write!(f, "<{}(name={}, source={}", self.kind, self.name(), source)?;
        if self.kind.has_segments() {
            write!(f, ", selected segments={}", self.segments().len())?;
        }
        write!(f, ")>")
    }
}

impl BitOr for &Layer {
    type Output = Result<Layer, SceneError>;

    fn bitor(self, other: &Layer) -> Self::Output {
        self.try_merge(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenelink_state::SchemaError;

    #[test]
    fn test_defaults_then_source_then_properties() {
        let mut props = Map::new();
        props.insert("name".to_string(), json!("em"));
        props.insert("blend".to_string(), json!("additive"));
        let layer = Layer::new(LayerKind::Image, "precomputed://gs://b/img", props).unwrap();

        assert_eq!(layer.name(), "em");
        assert_eq!(layer.get("blend"), Some(json!("additive")));
        assert_eq!(layer.get("shaderControls"), Some(json!({})));
        assert_eq!(layer.source_url().as_deref(), Some("precomputed://gs://b/img"));
    }

    #[test]
    fn test_record_requires_known_type() {
        let record = json!({"type": "volume", "name": "v", "source": "s"});
        let Value::Object(record) = record else { unreachable!() };
        assert!(matches!(
            Layer::from_record(record),
            Err(SceneError::UnknownLayerType(tag)) if tag == "volume"
        ));
    }

    #[test]
    fn test_name_must_be_string() {
        let layer = Layer::image("s").unwrap();
        let err = layer.with("name", 3).unwrap_err();
        assert!(matches!(err, SceneError::Schema(SchemaError::InvalidValue { .. })));
    }

    #[test]
    fn test_segments_normalized_on_every_write() {
        let mut layer = Layer::segmentation("s").unwrap().with("segments", json!([1, 2])).unwrap();
        assert_eq!(layer.get("segments"), Some(json!(["1", "2"])));

        layer
            .update(|props| props.get_list_mut("segments").map(|segments| segments.push(3)))
            .unwrap();
        assert_eq!(layer.segments(), vec!["1", "2", "3"]);

        assert!(layer.set("segments", json!([true])).is_err());
        assert_eq!(layer.segments(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_local_annotations_source() {
        let layer = Layer::local_annotations("points", &CoordinateSpace::default()).unwrap();
        assert_eq!(layer.kind(), LayerKind::Annotation);
        assert_eq!(layer.source_url().as_deref(), Some(LOCAL_ANNOTATIONS_URL));
        assert_eq!(
            layer.source().unwrap()["transform"]["outputDimensions"]["z"],
            json!([1.0, "nm"])
        );
        assert_eq!(layer.get("annotations"), Some(json!([])));
    }

    #[test]
    fn test_display() {
        let seg = Layer::segmentation(json!({"url": "precomputed://gs://b/seg"}))
            .unwrap()
            .with("segments", json!(["1", "2"]))
            .unwrap();
        assert_eq!(
            seg.to_string(),
            "<SegmentationLayer(name=segmentation, source=precomputed://gs://b/seg, selected segments=2)>"
        );
        assert_eq!(
            Layer::mesh("vtk://m").unwrap().to_string(),
            "<MeshLayer(name=meshes, source=vtk://m)>"
        );
    }

    #[test]
    fn test_clone_is_equal_and_detached() {
        let layer = Layer::image("s").unwrap();
        let copy = layer.clone();
        assert_eq!(copy, layer);
        assert_eq!(copy.link_state(), LinkState::Detached);

        // Same properties apart from the kind-specific defaults still differ
        let other_kind = Layer::mesh("s").unwrap().with("name", "img").unwrap();
        assert_ne!(other_kind, layer);
    }
}
