//! # Scenes
//!
//! A [`Scene`] owns scene-level properties (position, layout, ...) and a
//! [`LayerManager`]. Its JSON form is the properties plus a `layers`
//! array; its shareable URL is derived from that JSON and cached until
//! anything it depends on changes.
//!
//! ## Sync
//!
//! A linked scene maps to the root of the viewer document and each of
//! its layers to one record of the `layers` array. Scene-level edits push
//! the root record; layer edits push through the layer's own link.
//! [`Scene::bulk_update`] suspends both and flushes once at the end.

use crate::bulk::BulkUpdate;
use crate::context::{ParseOptions, SceneContext};
use crate::errors::SceneError;
use crate::kind::LayerKind;
use crate::layer::Layer;
use crate::manager::{LayerManager, LayerRef};
use crate::merge;
use crate::shareable::{make_url, parse_scene_string};
use scenelink_state::{canonical_pretty, canonical_string, ObservedMap, PropertyState, Rules, Schema};
use scenelink_sync::{
    count_records, push_record, read_record, LinkState, PushMode, PushOutcome, RecordTarget,
    RemoteLink, SyncBatch, SyncError, Viewer, LAYERS_KEY,
};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::{Add, BitOr};
use std::rc::Rc;
use tracing::{debug, error, info, instrument, warn};

const SCENE: Schema = Schema::new("Scene", Rules::NONE.forbid(&[LAYERS_KEY]));

#[derive(Debug)]
pub struct Scene {
    context: SceneContext,
    state: PropertyState,
    layers: LayerManager,
    link: RemoteLink,
    url: Option<String>,
    layers_materialized: Option<u64>,
}

impl Scene {
    /// Empty scene under the default viewer
    pub fn new() -> Result<Self, SceneError> {
        Self::with_context(SceneContext::default())
    }

    pub fn with_context(context: SceneContext) -> Result<Self, SceneError> {
        Self::from_parts(context, Map::new(), Vec::new())
    }

    fn from_parts(
        context: SceneContext,
        properties: Map<String, Value>,
        layers: Vec<Layer>,
    ) -> Result<Self, SceneError> {
        let mut manager = LayerManager::new();
        manager.add(layers, None);

        Ok(Self {
            context,
            state: PropertyState::new(SCENE, properties)?,
            layers: manager,
            link: RemoteLink::new(),
            url: None,
            layers_materialized: None,
        })
    }

    /// Parse a shareable URL or a JSON document
    pub fn from_string(input: &str) -> Result<Self, SceneError> {
        Self::from_string_with(input, &SceneContext::default())
    }

    /// Parse with explicit options; a URL input keeps its own base URL
    pub fn from_string_with(input: &str, context: &SceneContext) -> Result<Self, SceneError> {
        let parsed = parse_scene_string(input)?;
        let mut context = context.clone();
        if let Some(base_url) = parsed.base_url {
            context.base_url = base_url;
        }
        Self::from_value(parsed.state, context)
    }

    /// Build from scene JSON: properties plus a `layers` array
    pub fn from_value(value: Value, context: SceneContext) -> Result<Self, SceneError> {
        let Value::Object(mut properties) = value else {
            return Err(SceneError::Parse(format!(
                "expected a JSON object, got {}",
                value
            )));
        };

        let records = match properties.remove(LAYERS_KEY) {
            None => Vec::new(),
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(SceneError::Parse(format!(
                    "\"{}\" must be an array, got {}",
                    LAYERS_KEY, other
                )))
            }
        };

        let layers = parse_layers(records, &context.parse)?;
        Self::from_parts(context, properties, layers)
    }

    pub fn context(&self) -> &SceneContext {
        &self.context
    }

    pub fn base_url(&self) -> &str {
        &self.context.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.context.base_url = base_url.into();
        self.url = None;
    }

    // --- Layers ---

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn layer<'a>(&self, which: impl Into<LayerRef<'a>>) -> Result<&Layer, SceneError> {
        self.layers.get(which)
    }

    pub fn layer_mut<'a>(&mut self, which: impl Into<LayerRef<'a>>) -> Result<&mut Layer, SceneError> {
        self.layers.get_mut(which)
    }

    /// Append layers, renaming collisions; returns their final names
    pub fn add_layers<I>(&mut self, layers: I) -> Result<Vec<String>, SceneError>
    where
        I: IntoIterator<Item = Layer>,
    {
        self.insert_layers(layers, None)
    }

    /// Insert layers at `index` (or append). A linked scene links each
    /// new layer to its viewer.
    ///
    /// Nothing is inserted when any new name already has a remote
    /// record, and a failed link removes every layer this call added.
    pub fn insert_layers<I>(&mut self, layers: I, index: Option<usize>) -> Result<Vec<String>, SceneError>
    where
        I: IntoIterator<Item = Layer>,
    {
        let names = self.layers.add(layers, index);
        if !self.link.is_linked() {
            return Ok(names);
        }

        let mut linked = Vec::new();
        let result = self.link.viewer().map_err(SceneError::from).and_then(|viewer| {
            check_remote_names(&viewer, names.iter().map(String::as_str))?;
            self.link_layers(&viewer, &names, self.link.lock_depth(), &mut linked)
        });

        if let Err(err) = result {
            self.unlink_layers(&linked);
            for name in &names {
                if let Err(remove_err) = self.layers.remove(name.as_str()) {
                    warn!(layer = %name, "Failed to remove layer: {}", remove_err);
                }
            }
            return Err(err);
        }
        Ok(names)
    }

    /// Link each named layer not linked yet, locked `depth` times first.
    /// Layers that now hold a remote record are pushed onto `linked`, even
    /// when a later step fails.
    fn link_layers(
        &mut self,
        viewer: &Rc<dyn Viewer>,
        names: &[String],
        depth: u32,
        linked: &mut Vec<String>,
    ) -> Result<(), SceneError> {
        for name in names {
            let layer = self.layers.get_mut(name.as_str())?;
            if layer.is_linked() {
                continue;
            }
            // Inside a bulk update the new layer joins the final flush
            for _ in 0..depth {
                layer.link_mut().lock();
            }
            let outcome = layer.link(viewer);
            if layer.is_linked() {
                linked.push(name.clone());
            }
            outcome?;
        }
        Ok(())
    }

    fn unlink_layers(&mut self, names: &[String]) {
        for name in names {
            let result = self.layers.get_mut(name.as_str()).and_then(Layer::unlink);
            if let Err(err) = result {
                warn!(layer = %name, "Failed to unlink layer: {}", err);
            }
        }
    }

    /// Annotation layer with a local source built from the scene's
    /// coordinate space
    pub fn add_local_annotations(&mut self, name: &str) -> Result<String, SceneError> {
        let layer = Layer::local_annotations(name, &self.context.coordinates)?;
        let names = self.add_layers([layer])?;
        Ok(names.into_iter().next().unwrap_or_default())
    }

    /// Remove a layer by name or index, retracting its remote record
    pub fn drop_layer<'a>(&mut self, which: impl Into<LayerRef<'a>>) -> Result<Layer, SceneError> {
        let index = self.layers.index_of(which)?;
        let layer = self.layers.get_mut(index)?;
        if layer.is_linked() {
            layer.unlink()?;
        }
        self.layers.remove(index)
    }

    pub(crate) fn insert_layers_local<I>(&mut self, layers: I, index: Option<usize>) -> Vec<String>
    where
        I: IntoIterator<Item = Layer>,
    {
        self.layers.add(layers, index)
    }

    pub(crate) fn replace_layer_local(&mut self, index: usize, layer: Layer) {
        self.layers.replace(index, layer);
    }

    // --- Scene properties ---

    pub fn state(&self) -> &PropertyState {
        &self.state
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.get_value(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.contains(key)
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, SceneError> {
        let previous = self.state.set(key, value)?;
        self.after_edit()?;
        Ok(previous)
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, SceneError> {
        let previous = self.state.remove(key)?;
        self.after_edit()?;
        Ok(previous)
    }

    pub fn update<R>(&mut self, edit: impl FnOnce(&mut ObservedMap) -> R) -> Result<R, SceneError> {
        let revision = self.state.revision();
        let out = self.state.update(edit)?;
        if self.state.revision() != revision {
            self.after_edit()?;
        }
        Ok(out)
    }

    fn after_edit(&mut self) -> Result<(), SceneError> {
        if self.link.is_linked() {
            self.push_root()?;
        }
        Ok(())
    }

    // --- Export ---

    /// Scene properties plus the `layers` array
    pub fn as_dict(&self) -> Map<String, Value> {
        let mut dict = self.state.as_dict();
        let layers = self
            .layers
            .iter()
            .map(|layer| Value::Object(layer.as_dict()))
            .collect();
        dict.insert(LAYERS_KEY.to_string(), Value::Array(layers));
        dict
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.as_dict())
    }

    /// Canonical JSON, keys sorted
    pub fn to_json(&self, pretty: bool) -> Result<String, SceneError> {
        let value = self.to_value();
        if pretty {
            Ok(canonical_pretty(&value)?)
        } else {
            Ok(canonical_string(&value))
        }
    }

    /// True when the cached URL no longer reflects the scene
    pub fn is_stale(&self) -> bool {
        self.url.is_none()
            || self.state.is_stale()
            || self.layers_materialized != Some(self.layers.version())
            || self.layers.iter().any(|layer| layer.state().is_stale())
    }

    /// Regenerate the shareable URL and refresh the cache
    pub fn make_url(&mut self) -> Result<String, SceneError> {
        let url = make_url(&self.context.base_url, &self.to_value())?;

        self.state.mark_materialized();
        for layer in self.layers.iter_mut() {
            layer.mark_materialized();
        }
        self.layers_materialized = Some(self.layers.version());
        self.url = Some(url.clone());
        Ok(url)
    }

    /// Shareable URL, regenerated only when stale
    pub fn url(&mut self) -> Result<&str, SceneError> {
        if self.is_stale() {
            self.make_url()?;
        }
        Ok(self.url.as_deref().unwrap_or_default())
    }

    // --- Remote sync ---

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// Attach to `viewer`, push scene properties and link every layer.
    ///
    /// Fails without touching the viewer when any layer name already has
    /// a remote record; a later failure unlinks whatever this call linked.
    #[instrument(skip_all, fields(layers = self.layers.len()))]
    pub fn link(&mut self, viewer: &Rc<dyn Viewer>) -> Result<(), SceneError> {
        if self.link.is_linked() {
            return Err(SyncError::AlreadyLinked.into());
        }
        check_remote_names(
            viewer,
            self.layers.iter().filter(|layer| !layer.is_linked()).map(Layer::name),
        )?;

        let names: Vec<String> = self.layers.names().into_iter().map(str::to_string).collect();

        self.link.attach(viewer)?;
        let mut linked = Vec::new();
        let result = self
            .push_root()
            .and_then(|_| self.link_layers(viewer, &names, 0, &mut linked));

        if let Err(err) = result {
            error!("Link failed, rolling back: {}", err);
            self.unlink_layers(&linked);
            self.link.detach();
            return Err(err);
        }
        info!("Scene linked");
        Ok(())
    }

    /// Forget the viewer, for the scene and its layers, leaving remote
    /// records in place
    pub fn unlink(&mut self) {
        self.link.detach();
        for layer in self.layers.iter_mut() {
            layer.detach();
        }
    }

    fn push_root(&mut self) -> Result<PushOutcome, SceneError> {
        let outcome = push_record(&self.link, RecordTarget::Root, &self.state.as_dict(), PushMode::Merge)?;
        if outcome == PushOutcome::Pushed {
            self.state.mark_synced();
        }
        Ok(outcome)
    }

    /// Push scene properties, and unless `exclude_layers` every linked
    /// layer, in a single transaction
    #[instrument(skip(self), fields(layers = self.layers.len()))]
    pub fn push(&mut self, exclude_layers: bool) -> Result<PushOutcome, SceneError> {
        if self.link.state() == LinkState::Locked {
            debug!("Scene is locked, skipping push");
            return Ok(PushOutcome::Skipped);
        }
        let viewer = self.link.viewer()?;

        let mut batch = SyncBatch::new();
        batch.root(self.state.as_dict(), PushMode::Merge);
        if !exclude_layers {
            for layer in self.layers.iter().filter(|layer| layer.is_linked()) {
                batch.layer(layer.name(), layer.as_dict(), PushMode::Merge);
            }
        }
        batch.flush(viewer.as_ref())?;

        self.state.mark_synced();
        if !exclude_layers {
            for layer in self.layers.iter_mut().filter(|layer| layer.is_linked()) {
                layer.mark_synced();
            }
        }
        Ok(PushOutcome::Pushed)
    }

    /// Replace scene properties and every linked layer from one read of
    /// the viewer document.
    ///
    /// Returns `false` when locked. Every record is located and validated
    /// before any local state is replaced.
    #[instrument(skip(self), fields(layers = self.layers.len()))]
    pub fn pull(&mut self) -> Result<bool, SceneError> {
        if self.link.state() == LinkState::Locked {
            debug!("Scene is locked, skipping pull");
            return Ok(false);
        }
        let viewer = self.link.viewer()?;
        let document = viewer.begin_transaction()?.read();

        let root = read_record(&document, RecordTarget::Root)?;
        let mut records = Vec::new();
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.is_linked() {
                records.push((index, read_record(&document, RecordTarget::Layer(layer.name()))?));
            }
        }

        // Validate everything first so a bad record leaves local state as it was
        PropertyState::new(SCENE, root.clone())?;
        for (index, record) in &records {
            PropertyState::new(self.layers.get(*index)?.kind().schema(), record.clone())?;
        }

        self.state.replace(root)?;
        self.state.mark_synced();
        for (index, record) in records {
            self.layers.get_mut(index)?.apply_pulled(record)?;
        }
        Ok(true)
    }

    /// Scene properties, pulled first when linked and unlocked
    pub fn refreshed_state(&mut self) -> Result<&PropertyState, SceneError> {
        if self.link.state() == LinkState::Linked {
            self.pull()?;
        }
        Ok(&self.state)
    }

    // --- Bulk updates ---

    /// Enter a bulk-update scope; see [`BulkUpdate`]
    pub fn begin_bulk_update(&mut self) -> Result<BulkUpdate<'_>, SceneError> {
        BulkUpdate::enter(self)
    }

    /// Run `body` with sync suspended, then push everything once.
    ///
    /// Locks are released and the flush attempted even when `body` fails.
    /// A body error wins over a flush error; the latter is logged.
    pub fn bulk_update<R>(
        &mut self,
        body: impl FnOnce(&mut Scene) -> Result<R, SceneError>,
    ) -> Result<R, SceneError> {
        let mut guard = BulkUpdate::enter(self)?;
        let outcome = body(&mut guard);
        let flushed = guard.finish();

        match (outcome, flushed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(err), Err(flush_err)) => {
                error!(error = %flush_err, "Bulk update flush failed after edit error");
                Err(err)
            }
        }
    }

    /// Freshest remote state for the scene and its layers
    pub(crate) fn pull_for_bulk(&mut self) -> Result<(), SceneError> {
        if self.link.is_linked() {
            self.pull()?;
            return Ok(());
        }
        for layer in self.layers.iter_mut().filter(|layer| layer.is_linked()) {
            layer.pull()?;
        }
        Ok(())
    }

    pub(crate) fn lock_all(&mut self) {
        self.link.lock();
        for layer in self.layers.iter_mut() {
            layer.link_mut().lock();
        }
    }

    pub(crate) fn unlock_all(&mut self) {
        self.link.unlock();
        for layer in self.layers.iter_mut() {
            layer.link_mut().unlock();
        }
    }

    /// Push accumulated state; one transaction when the scene is linked
    pub(crate) fn flush(&mut self) -> Result<(), SceneError> {
        if self.link.is_linked() {
            self.push(false)?;
            return Ok(());
        }
        for layer in self.layers.iter_mut().filter(|layer| layer.is_linked()) {
            layer.push()?;
        }
        Ok(())
    }

    // --- Combining ---

    /// Copy of this scene followed by copies of `other`'s layers
    pub fn concat(&self, other: &Scene) -> Scene {
        merge::concat(self, other)
    }

    /// Copy of this scene with `other`'s layers merged in by kind
    pub fn merge(&self, other: &Scene) -> Scene {
        merge::merge(self, other)
    }

    fn kind_counts(&self) -> Vec<(LayerKind, usize)> {
        LayerKind::ALL
            .into_iter()
            .map(|kind| (kind, self.layers.iter().filter(|layer| layer.kind() == kind).count()))
            .collect()
    }
}

/// Turn layer records into layers, honouring `options`
pub fn parse_layers(records: Vec<Value>, options: &ParseOptions) -> Result<Vec<Layer>, SceneError> {
    let mut layers = Vec::with_capacity(records.len());

    for record in records {
        let Value::Object(record) = record else {
            return Err(SceneError::Parse(format!(
                "layer records must be objects, got {}",
                record
            )));
        };

        if !options.include_archived && record.get("archived").and_then(Value::as_bool) == Some(true) {
            debug!(layer = ?record.get("name"), "Skipping archived layer");
            continue;
        }

        match Layer::from_record(record) {
            Ok(layer) => layers.push(layer),
            Err(SceneError::UnknownLayerType(tag)) if options.skip_unknown => {
                warn!(%tag, "Skipping layer of unknown type");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(layers)
}

/// Structurally equal copy with no remote link and no cached URL
impl Clone for Scene {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            state: self.state.clone(),
            layers: self.layers.clone(),
            link: RemoteLink::new(),
            url: None,
            layers_materialized: None,
        }
    }
}

impl PartialEq for Scene {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.layers == other.layers
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<String> = self
            .kind_counts()
            .into_iter()
            .map(|(kind, count)| format!("{} {}", count, kind.type_tag()))
            .collect();
        write!(f, "<Scene({})>", counts.join(", "))?;

        match make_url(&self.context.base_url, &self.to_value()) {
            Ok(url) => write!(f, "\n\n{}", url),
            Err(err) => write!(f, "\n\n<{}>", err),
        }
    }
}

impl Add for &Scene {
    type Output = Scene;

    fn add(self, other: &Scene) -> Scene {
        self.concat(other)
    }
}

impl BitOr for &Scene {
    type Output = Scene;

    fn bitor(self, other: &Scene) -> Scene {
        self.merge(other)
    }
}

/// Fail on the first name the viewer already holds a record for
fn check_remote_names<'a>(
    viewer: &Rc<dyn Viewer>,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), SceneError> {
    let document = viewer.begin_transaction()?.read();
    for name in names {
        let count = count_records(&document, name)?;
        if count > 0 {
            return Err(SyncError::Conflict {
                name: name.to_string(),
                count,
            }
            .into());
        }
    }
    Ok(())
}
