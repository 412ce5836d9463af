//! Ordered, name-unique layer collection owned by a scene

use crate::errors::SceneError;
use crate::layer::Layer;
use std::fmt;

/// Address of a layer within a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for LayerRef<'a> {
    fn from(name: &'a str) -> Self {
        LayerRef::Name(name)
    }
}

impl<'a> From<&'a String> for LayerRef<'a> {
    fn from(name: &'a String) -> Self {
        LayerRef::Name(name)
    }
}

impl From<usize> for LayerRef<'_> {
    fn from(index: usize) -> Self {
        LayerRef::Index(index)
    }
}

impl fmt::Display for LayerRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerRef::Name(name) => write!(f, "\"{}\"", name),
            LayerRef::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// Layers in display order.
///
/// Names are made unique when layers are added. Renaming a layer after
/// it was added is not re-checked. The sequence itself can only change
/// through `add`/`remove`; `version` counts those changes.
#[derive(Debug, Clone, Default)]
pub struct LayerManager {
    layers: Vec<Layer>,
    version: u64,
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Layer> {
        self.layers.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(Layer::name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|layer| layer.name() == name)
    }

    /// Bumped on every insertion or removal
    pub fn version(&self) -> u64 {
        self.version
    }

    /// `name`, or `name-n` for the smallest free `n >= 2`
    pub fn unique_name(&self, name: &str) -> String {
        if !self.contains(name) {
            return name.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", name, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    /// Insert `layers` at `index` (or append), renaming collisions.
    ///
    /// Consecutive layers keep their relative order. Returns the names
    /// the layers ended up with.
    pub fn add<I>(&mut self, layers: I, index: Option<usize>) -> Vec<String>
    where
        I: IntoIterator<Item = Layer>,
    {
        let mut position = index.map(|index| index.min(self.layers.len()));
        let mut names = Vec::new();

        for mut layer in layers {
            let name = self.unique_name(layer.name());
            if name != layer.name() {
                layer.rename(name.clone());
            }

            match position.as_mut() {
                Some(at) => {
                    self.layers.insert(*at, layer);
                    *at += 1;
                }
                None => self.layers.push(layer),
            }
            names.push(name);
        }

        if !names.is_empty() {
            self.version += 1;
        }
        names
    }

    fn position(&self, which: LayerRef<'_>) -> Result<usize, SceneError> {
        match which {
            LayerRef::Index(index) if index < self.layers.len() => Ok(index),
            LayerRef::Index(index) => Err(SceneError::IndexOutOfRange {
                index,
                len: self.layers.len(),
            }),
            LayerRef::Name(name) => {
                let matches: Vec<usize> = self
                    .layers
                    .iter()
                    .enumerate()
                    .filter(|(_, layer)| layer.name() == name)
                    .map(|(index, _)| index)
                    .collect();

                match matches.as_slice() {
                    [index] => Ok(*index),
                    [] => Err(SceneError::LayerNotFound(name.to_string())),
                    _ => Err(SceneError::AmbiguousLayer {
                        name: name.to_string(),
                        count: matches.len(),
                    }),
                }
            }
        }
    }

    pub fn get<'a>(&self, which: impl Into<LayerRef<'a>>) -> Result<&Layer, SceneError> {
        let index = self.position(which.into())?;
        Ok(&self.layers[index])
    }

    pub fn get_mut<'a>(&mut self, which: impl Into<LayerRef<'a>>) -> Result<&mut Layer, SceneError> {
        let index = self.position(which.into())?;
        Ok(&mut self.layers[index])
    }

    pub fn index_of<'a>(&self, which: impl Into<LayerRef<'a>>) -> Result<usize, SceneError> {
        self.position(which.into())
    }

    /// Remove and return the addressed layer
    pub fn remove<'a>(&mut self, which: impl Into<LayerRef<'a>>) -> Result<Layer, SceneError> {
        let index = self.position(which.into())?;
        self.version += 1;
        Ok(self.layers.remove(index))
    }

    /// Swap the layer at `index` for `layer`, keeping its position
    pub(crate) fn replace(&mut self, index: usize, layer: Layer) {
        if let Some(slot) = self.layers.get_mut(index) {
            *slot = layer;
            self.version += 1;
        }
    }
}

impl PartialEq for LayerManager {
    fn eq(&self, other: &Self) -> bool {
        self.layers == other.layers
    }
}

impl<'a> IntoIterator for &'a LayerManager {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}
