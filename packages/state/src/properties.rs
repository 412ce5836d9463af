//! # Property State
//!
//! The single source of truth for an entity: an observed property map
//! plus the bookkeeping derived from it.
//!
//! ## Revisions
//!
//! The observed map reports to a [`ChangeTracker`], which bumps a
//! revision counter on every mutation. Two marks are kept against it:
//!
//! - **materialized**: revision at the last URL/JSON export. The state is
//!   *stale* whenever the current revision differs.
//! - **synced**: revision at the last successful push/pull.
//!
//! ## Validation
//!
//! Every mutation (single set, delete, closure edit, full replacement)
//! is normalized and validated against the entity's [`Schema`]. A
//! mutation that fails is rolled back, so the state never holds an
//! invalid key set.

use crate::canonical::{canonical_pretty, canonical_string};
use crate::errors::SchemaError;
use crate::observed::{ChangeCallback, Observed, ObservedMap};
use crate::rules::Rules;
use serde_json::{Map, Value};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Rewrites values into their stored form before validation
pub type Normalizer = fn(&mut ObservedMap) -> Result<(), SchemaError>;

/// Validation profile of one entity kind
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Name used in error messages
    pub entity: &'static str,
    pub rules: Rules,
    pub normalize: Option<Normalizer>,
}

impl Schema {
    pub const fn new(entity: &'static str, rules: Rules) -> Self {
        Self {
            entity,
            rules,
            normalize: None,
        }
    }

    pub const fn with_normalizer(mut self, normalize: Normalizer) -> Self {
        self.normalize = Some(normalize);
        self
    }

    fn check(&self, props: &mut ObservedMap) -> Result<(), SchemaError> {
        if let Some(normalize) = self.normalize {
            normalize(props)?;
        }
        self.rules.validate(self.entity, props.keys())
    }
}

/// Revision counter bumped by container callbacks
#[derive(Debug, Default)]
pub struct ChangeTracker {
    revision: Rc<Cell<u64>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to hand to observed containers
    pub fn callback(&self) -> ChangeCallback {
        let revision = Rc::clone(&self.revision);
        Rc::new(move || revision.set(revision.get() + 1))
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    fn reset_to(&self, revision: u64) {
        self.revision.set(revision);
    }
}

/// Validated, change-tracked property map
pub struct PropertyState {
    props: ObservedMap,
    tracker: ChangeTracker,
    schema: Schema,
    materialized: Option<u64>,
    synced: Option<u64>,
}

impl PropertyState {
    /// Wrap `initial`, normalizing and validating it immediately
    pub fn new(schema: Schema, initial: Map<String, Value>) -> Result<Self, SchemaError> {
        let tracker = ChangeTracker::new();
        let mut props = ObservedMap::observe(initial, &tracker.callback());
        schema.check(&mut props)?;

        Ok(Self {
            props,
            tracker,
            schema,
            materialized: None,
            synced: None,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Read-only view of the observed properties
    pub fn props(&self) -> &ObservedMap {
        &self.props
    }

    pub fn get(&self, key: &str) -> Option<&Observed> {
        self.props.get(key)
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.props.get_value(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Observed::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.props.keys()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Set one property
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, SchemaError> {
        let key = key.into();
        let value = value.into();
        self.update(move |props| props.insert(key, value))
    }

    /// Delete one property; required keys cannot be removed
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, SchemaError> {
        self.update(|props| props.remove(key))
    }

    /// Run `edit` against the observed map, then normalize and validate.
    ///
    /// Edits that leave the revision untouched skip validation. A failed
    /// check restores the state (and revision) from before the edit.
    pub fn update<R>(&mut self, edit: impl FnOnce(&mut ObservedMap) -> R) -> Result<R, SchemaError> {
        let before = self.tracker.revision();
        let snapshot = self.props.to_map();

        let out = edit(&mut self.props);
        if self.tracker.revision() == before {
            return Ok(out);
        }

        if let Err(err) = self.schema.check(&mut self.props) {
            debug!(entity = self.schema.entity, error = %err, "Rolling back rejected edit");
            self.props = ObservedMap::observe(snapshot, &self.tracker.callback());
            self.tracker.reset_to(before);
            return Err(err);
        }

        Ok(out)
    }

    /// Replace every property at once (used by pull)
    pub fn replace(&mut self, properties: Map<String, Value>) -> Result<(), SchemaError> {
        let before = self.tracker.revision();
        let mut props = ObservedMap::observe(properties, &self.tracker.callback());

        // Normalizing the incoming map must not count as a local edit
        let checked = self.schema.check(&mut props);
        self.tracker.reset_to(before);
        checked?;

        if props != self.props {
            self.props = props;
            self.tracker.reset_to(before + 1);
        }
        Ok(())
    }

    /// Plain copy of the properties, safe to serialize
    pub fn as_dict(&self) -> Map<String, Value> {
        self.props.to_map()
    }

    /// Canonical JSON of the properties
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        let value = Value::Object(self.as_dict());
        if pretty {
            canonical_pretty(&value)
        } else {
            Ok(canonical_string(&value))
        }
    }

    pub fn revision(&self) -> u64 {
        self.tracker.revision()
    }

    /// True when mutated since the last materialization
    pub fn is_stale(&self) -> bool {
        self.materialized != Some(self.revision())
    }

    pub fn mark_materialized(&mut self) {
        self.materialized = Some(self.revision());
    }

    /// True when mutated since the last push/pull
    pub fn has_unsynced_changes(&self) -> bool {
        self.synced != Some(self.revision())
    }

    pub fn mark_synced(&mut self) {
        self.synced = Some(self.revision());
    }
}

/// Deep, detached copy: fresh tracker, never materialized or synced
impl Clone for PropertyState {
    fn clone(&self) -> Self {
        let tracker = ChangeTracker::new();
        let props = ObservedMap::observe(self.props.to_map(), &tracker.callback());

        Self {
            props,
            tracker,
            schema: self.schema,
            materialized: None,
            synced: None,
        }
    }
}

impl PartialEq for PropertyState {
    fn eq(&self, other: &Self) -> bool {
        self.props == other.props
    }
}

impl fmt::Debug for PropertyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyState")
            .field("entity", &self.schema.entity)
            .field("revision", &self.revision())
            .field("props", &self.props)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LAYER: Schema = Schema::new("TestLayer", Rules::require(&["name", "source"]));

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected object, got {}", other),
        }
    }

    fn layer_state() -> PropertyState {
        PropertyState::new(LAYER, props(json!({"name": "img", "source": "s", "opacity": 1.0}))).unwrap()
    }

    #[test]
    fn test_construction_validates() {
        let err = PropertyState::new(LAYER, props(json!({"name": "img"}))).unwrap_err();
        assert!(matches!(err, SchemaError::MissingProperty { ref key, .. } if key == "source"));
    }

    #[test]
    fn test_new_state_is_stale_and_unsynced() {
        let state = layer_state();
        assert!(state.is_stale());
        assert!(state.has_unsynced_changes());
    }

    #[test]
    fn test_set_bumps_revision() {
        let mut state = layer_state();
        state.mark_materialized();
        assert!(!state.is_stale());

        state.set("opacity", 0.5).unwrap();
        assert!(state.is_stale());
        assert_eq!(state.get_value("opacity"), Some(json!(0.5)));
    }

    #[test]
    fn test_removing_required_key_rolls_back() {
        let mut state = layer_state();
        state.mark_materialized();

        let err = state.remove("source").unwrap_err();
        assert!(matches!(err, SchemaError::MissingProperty { .. }));
        assert_eq!(state.get_str("source"), Some("s"));
        assert!(!state.is_stale());
    }

    #[test]
    fn test_closure_edit_reaches_nested_values() {
        let mut state = layer_state();
        state.set("shaderControls", json!({"range": [0, 10]})).unwrap();
        let revision = state.revision();

        state
            .update(|props| {
                props
                    .get_map_mut("shaderControls")
                    .and_then(|controls| controls.get_list_mut("range"))
                    .map(|range| range.push(20))
            })
            .unwrap();

        assert!(state.revision() > revision);
        assert_eq!(state.get_value("shaderControls"), Some(json!({"range": [0, 10, 20]})));
    }

    #[test]
    fn test_read_only_edit_does_not_bump() {
        let mut state = layer_state();
        let revision = state.revision();
        let name = state.update(|props| props.get_value("name")).unwrap();
        assert_eq!(name, Some(json!("img")));
        assert_eq!(state.revision(), revision);
    }

    #[test]
    fn test_normalizer_runs_on_every_edit() {
        fn upper_name(props: &mut ObservedMap) -> Result<(), SchemaError> {
            let upper = props
                .get("name")
                .and_then(Observed::as_str)
                .filter(|name| name.chars().any(char::is_lowercase))
                .map(str::to_uppercase);
            if let Some(upper) = upper {
                props.insert("name", upper);
            }
            Ok(())
        }

        const UPPER: Schema = LAYER.with_normalizer(upper_name);
        let mut state = PropertyState::new(UPPER, props(json!({"name": "a", "source": "s"}))).unwrap();
        assert_eq!(state.get_str("name"), Some("A"));

        state.set("name", "b").unwrap();
        assert_eq!(state.get_str("name"), Some("B"));
    }

    #[test]
    fn test_replace_keeps_old_state_on_failure() {
        let mut state = layer_state();
        assert!(state.replace(props(json!({"name": "only"}))).is_err());
        assert_eq!(state.get_str("source"), Some("s"));

        state.replace(props(json!({"name": "new", "source": "t"}))).unwrap();
        assert_eq!(state.as_dict(), props(json!({"name": "new", "source": "t"})));
    }

    #[test]
    fn test_clone_is_detached() {
        let original = layer_state();
        let mut copy = original.clone();
        assert_eq!(copy, original);

        copy.set("opacity", 0.1).unwrap();
        assert_eq!(original.get_value("opacity"), Some(json!(1.0)));
        assert_ne!(copy, original);
    }
}
