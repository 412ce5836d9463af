//! # Record Operations
//!
//! Each entity owns one record in the viewer document. Layers are the
//! entries of the `layers` array, matched by `name`; the scene is the
//! document root minus `layers`.
//!
//! Every operation opens its own transaction, re-reads the document and
//! commits once. Name lookups must resolve to exactly one record:
//! zero matches is [`SyncError::NotFound`], several is
//! [`SyncError::Conflict`].

use crate::errors::SyncError;
use crate::link::RemoteLink;
use crate::viewer::Viewer;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, instrument};

/// Key holding the layer records in a viewer document
pub const LAYERS_KEY: &str = "layers";

/// Which record of the document an operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTarget<'a> {
    /// The `layers` entry with this name
    Layer(&'a str),
    /// Scene-level keys of the document
    Root,
}

impl fmt::Display for RecordTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordTarget::Layer(name) => write!(f, "layer \"{}\"", name),
            RecordTarget::Root => write!(f, "scene root"),
        }
    }
}

/// How pushed properties combine with the remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushMode {
    /// Local keys overwrite remote ones; remote-only keys survive
    #[default]
    Merge,
    /// The remote record becomes exactly the local properties
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The link was locked; nothing was sent
    Skipped,
}

fn document_map(document: &mut Value) -> Result<&mut Map<String, Value>, SyncError> {
    document
        .as_object_mut()
        .ok_or_else(|| SyncError::InvalidDocument("document is not an object".to_string()))
}

fn records(document: &Value) -> Result<&[Value], SyncError> {
    match document.get(LAYERS_KEY) {
        None => Ok(&[][..]),
        Some(Value::Array(records)) => Ok(records.as_slice()),
        Some(_) => Err(SyncError::InvalidDocument(format!(
            "\"{}\" is not an array",
            LAYERS_KEY
        ))),
    }
}

fn records_mut(document: &mut Value) -> Result<&mut Vec<Value>, SyncError> {
    let layers = document_map(document)?
        .entry(LAYERS_KEY)
        .or_insert_with(|| Value::Array(Vec::new()));

    layers
        .as_array_mut()
        .ok_or_else(|| SyncError::InvalidDocument(format!("\"{}\" is not an array", LAYERS_KEY)))
}

fn record_name(record: &Value) -> Option<&str> {
    record.get("name").and_then(Value::as_str)
}

/// Number of layer records named `name`
pub fn count_records(document: &Value, name: &str) -> Result<usize, SyncError> {
    Ok(records(document)?
        .iter()
        .filter(|record| record_name(record) == Some(name))
        .count())
}

/// Index of the single layer record named `name`
pub fn find_record(document: &Value, name: &str) -> Result<usize, SyncError> {
    let matches: Vec<usize> = records(document)?
        .iter()
        .enumerate()
        .filter(|(_, record)| record_name(record) == Some(name))
        .map(|(index, _)| index)
        .collect();

    match matches.as_slice() {
        [index] => Ok(*index),
        [] => Err(SyncError::NotFound(name.to_string())),
        _ => Err(SyncError::Conflict {
            name: name.to_string(),
            count: matches.len(),
        }),
    }
}

/// Apply `properties` to the targeted record of `document`
pub fn apply_push(
    document: &mut Value,
    target: RecordTarget<'_>,
    properties: &Map<String, Value>,
    mode: PushMode,
) -> Result<(), SyncError> {
    match target {
        RecordTarget::Root => {
            let root = document_map(document)?;
            if mode == PushMode::Replace {
                root.retain(|key, _| key == LAYERS_KEY);
            }
            for (key, value) in properties.iter().filter(|(key, _)| *key != LAYERS_KEY) {
                root.insert(key.clone(), value.clone());
            }
        }
        RecordTarget::Layer(name) => {
            let index = find_record(document, name)?;
            let record = &mut records_mut(document)?[index];
            match (mode, record.as_object_mut()) {
                (PushMode::Merge, Some(fields)) => {
                    for (key, value) in properties {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                _ => *record = Value::Object(properties.clone()),
            }
        }
    }
    Ok(())
}

/// Copy of the targeted record's properties
pub fn read_record(document: &Value, target: RecordTarget<'_>) -> Result<Map<String, Value>, SyncError> {
    match target {
        RecordTarget::Root => {
            let mut root = document
                .as_object()
                .cloned()
                .ok_or_else(|| SyncError::InvalidDocument("document is not an object".to_string()))?;
            root.remove(LAYERS_KEY);
            Ok(root)
        }
        RecordTarget::Layer(name) => {
            let index = find_record(document, name)?;
            records(document)?[index]
                .as_object()
                .cloned()
                .ok_or_else(|| SyncError::InvalidDocument(format!("record \"{}\" is not an object", name)))
        }
    }
}

/// Register a placeholder record for `name`.
///
/// Fails with [`SyncError::Conflict`] when the viewer already holds a
/// record of that name.
#[instrument(skip(viewer))]
pub fn link_record(viewer: &dyn Viewer, name: &str) -> Result<(), SyncError> {
    let mut txn = viewer.begin_transaction()?;
    let mut document = txn.read();

    let existing = count_records(&document, name)?;
    if existing > 0 {
        return Err(SyncError::Conflict {
            name: name.to_string(),
            count: existing,
        });
    }

    let mut placeholder = Map::new();
    placeholder.insert("name".to_string(), Value::String(name.to_string()));
    records_mut(&mut document)?.push(Value::Object(placeholder));

    txn.write(document);
    txn.commit()?;
    debug!("Registered remote record");
    Ok(())
}

/// Overwrite the targeted record with local properties.
///
/// A locked link skips the push; a detached one is an error.
#[instrument(skip_all, fields(record = %target, keys = properties.len()))]
pub fn push_record(
    link: &RemoteLink,
    target: RecordTarget<'_>,
    properties: &Map<String, Value>,
    mode: PushMode,
) -> Result<PushOutcome, SyncError> {
    if link.is_locked() && link.is_linked() {
        debug!("Link is locked, skipping push");
        return Ok(PushOutcome::Skipped);
    }

    let viewer = link.viewer()?;
    let mut txn = viewer.begin_transaction()?;
    let mut document = txn.read();
    apply_push(&mut document, target, properties, mode)?;
    txn.write(document);
    txn.commit()?;

    debug!("Pushed record");
    Ok(PushOutcome::Pushed)
}

/// Read the targeted record from the viewer.
///
/// Returns `None` while the link is locked.
#[instrument(skip_all, fields(record = %target))]
pub fn pull_record(
    link: &RemoteLink,
    target: RecordTarget<'_>,
) -> Result<Option<Map<String, Value>>, SyncError> {
    if link.is_locked() && link.is_linked() {
        debug!("Link is locked, skipping pull");
        return Ok(None);
    }

    let viewer = link.viewer()?;
    let txn = viewer.begin_transaction()?;
    let record = read_record(&txn.read(), target)?;
    Ok(Some(record))
}

/// Remove the record named `name` from the viewer
#[instrument(skip(viewer))]
pub fn drop_record(viewer: &dyn Viewer, name: &str) -> Result<(), SyncError> {
    let mut txn = viewer.begin_transaction()?;
    let mut document = txn.read();

    let index = find_record(&document, name)?;
    records_mut(&mut document)?.remove(index);

    txn.write(document);
    txn.commit()?;
    debug!("Dropped remote record");
    Ok(())
}

/// Pushes collected for a single transaction
#[derive(Debug, Default)]
pub struct SyncBatch {
    root: Option<(Map<String, Value>, PushMode)>,
    layers: Vec<(String, Map<String, Value>, PushMode)>,
}

impl SyncBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&mut self, properties: Map<String, Value>, mode: PushMode) -> &mut Self {
        self.root = Some((properties, mode));
        self
    }

    pub fn layer(
        &mut self,
        name: impl Into<String>,
        properties: Map<String, Value>,
        mode: PushMode,
    ) -> &mut Self {
        self.layers.push((name.into(), properties, mode));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.layers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.layers.len() + usize::from(self.root.is_some())
    }

    /// Apply every push in one transaction; nothing is committed if any
    /// record cannot be resolved
    #[instrument(skip_all, fields(records = self.len()))]
    pub fn flush(&self, viewer: &dyn Viewer) -> Result<(), SyncError> {
        if self.is_empty() {
            return Ok(());
        }

        let mut txn = viewer.begin_transaction()?;
        let mut document = txn.read();

        if let Some((properties, mode)) = &self.root {
            apply_push(&mut document, RecordTarget::Root, properties, *mode)?;
        }
        for (name, properties, mode) in &self.layers {
            apply_push(&mut document, RecordTarget::Layer(name), properties, *mode)?;
        }

        txn.write(document);
        txn.commit()?;
        debug!("Flushed batch");
        Ok(())
    }
}
