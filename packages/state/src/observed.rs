//! # Observed Containers
//!
//! JSON mappings and sequences that report every mutation to an owner.
//!
//! Wrapping a `serde_json::Value` produces an [`Observed`] tree in which
//! every nested mapping and sequence holds the same [`ChangeCallback`].
//! Mutating any container at any depth:
//!
//! 1. performs the underlying operation,
//! 2. wraps newly inserted mappings/sequences with the same callback,
//! 3. invokes the callback exactly once for the call.
//!
//! Wrapping itself never invokes the callback. Leaves are only reachable
//! by shared reference, so there is no way to edit a value without going
//! through a container method.
//!
//! [`remove_callback`] strips the instrumentation again:
//! `remove_callback(add_on_change_callback(x, cb)) == x`.

use crate::canonical::canonical_string;
use crate::errors::ContainerError;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Zero-argument change notification shared by a whole container tree
pub type ChangeCallback = Rc<dyn Fn()>;

/// Wrap a plain JSON value so that mutations invoke `callback`
pub fn add_on_change_callback(value: Value, callback: ChangeCallback) -> Observed {
    Observed::observe(value, &callback)
}

/// Unwrap an observed tree into plain JSON, recursively
pub fn remove_callback(observed: Observed) -> Value {
    observed.into_value()
}

/// A JSON value whose containers are observed
pub enum Observed {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(ObservedList),
    Map(ObservedMap),
}

impl Observed {
    /// Wrap `value` recursively without firing the callback
    pub fn observe(value: Value, callback: &ChangeCallback) -> Self {
        match value {
            Value::Null => Observed::Null,
            Value::Bool(b) => Observed::Bool(b),
            Value::Number(n) => Observed::Number(n),
            Value::String(s) => Observed::String(s),
            Value::Array(items) => Observed::List(ObservedList::observe(items, callback)),
            Value::Object(map) => Observed::Map(ObservedMap::observe(map, callback)),
        }
    }

    /// Plain copy of this value
    pub fn to_value(&self) -> Value {
        match self {
            Observed::Null => Value::Null,
            Observed::Bool(b) => Value::Bool(*b),
            Observed::Number(n) => Value::Number(n.clone()),
            Observed::String(s) => Value::String(s.clone()),
            Observed::List(list) => Value::Array(list.to_vec()),
            Observed::Map(map) => Value::Object(map.to_map()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Observed::Null => Value::Null,
            Observed::Bool(b) => Value::Bool(b),
            Observed::Number(n) => Value::Number(n),
            Observed::String(s) => Value::String(s),
            Observed::List(list) => Value::Array(list.into_vec()),
            Observed::Map(map) => Value::Object(map.into_map()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Observed::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Observed::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Observed::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Observed::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ObservedMap> {
        match self {
            Observed::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ObservedList> {
        match self {
            Observed::List(list) => Some(list),
            _ => None,
        }
    }

    // Mutable access stops at containers; leaves must be replaced through
    // their parent so the callback fires.
    fn as_map_mut(&mut self) -> Option<&mut ObservedMap> {
        match self {
            Observed::Map(map) => Some(map),
            _ => None,
        }
    }

    fn as_list_mut(&mut self) -> Option<&mut ObservedList> {
        match self {
            Observed::List(list) => Some(list),
            _ => None,
        }
    }

    /// JSON type name, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Observed::Null => "null",
            Observed::Bool(_) => "bool",
            Observed::Number(_) => "number",
            Observed::String(_) => "string",
            Observed::List(_) => "array",
            Observed::Map(_) => "object",
        }
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Observed::Null, Observed::Null) => true,
            (Observed::Bool(a), Observed::Bool(b)) => a == b,
            (Observed::Number(a), Observed::Number(b)) => a == b,
            (Observed::String(a), Observed::String(b)) => a == b,
            (Observed::List(a), Observed::List(b)) => a == b,
            (Observed::Map(a), Observed::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq<Value> for Observed {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Observed::Null, Value::Null) => true,
            (Observed::Bool(a), Value::Bool(b)) => a == b,
            (Observed::Number(a), Value::Number(b)) => a == b,
            (Observed::String(a), Value::String(b)) => a == b,
            (Observed::List(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            }
            (Observed::Map(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v == w))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::List(list) => fmt::Debug::fmt(list, f),
            Observed::Map(map) => fmt::Debug::fmt(map, f),
            leaf => fmt::Debug::fmt(&leaf.to_value(), f),
        }
    }
}

/// Observed JSON object, insertion ordered
pub struct ObservedMap {
    entries: IndexMap<String, Observed>,
    on_change: ChangeCallback,
}

impl ObservedMap {
    /// Empty map reporting to `callback`
    pub fn new(callback: ChangeCallback) -> Self {
        Self {
            entries: IndexMap::new(),
            on_change: callback,
        }
    }

    /// Wrap `map` recursively without firing the callback
    pub fn observe(map: Map<String, Value>, callback: &ChangeCallback) -> Self {
        let entries = map
            .into_iter()
            .map(|(key, value)| (key, Observed::observe(value, callback)))
            .collect();

        Self {
            entries,
            on_change: Rc::clone(callback),
        }
    }

    fn changed(&self) {
        (self.on_change)();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Observed> {
        self.entries.get(key)
    }

    /// Plain copy of the value under `key`
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(Observed::to_value)
    }

    pub fn get_map_mut(&mut self, key: &str) -> Option<&mut ObservedMap> {
        self.entries.get_mut(key).and_then(Observed::as_map_mut)
    }

    pub fn get_list_mut(&mut self, key: &str) -> Option<&mut ObservedList> {
        self.entries.get_mut(key).and_then(Observed::as_list_mut)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Observed)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set `key`, keeping its position if it already exists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let value = Observed::observe(value.into(), &self.on_change);
        let previous = self.entries.insert(key.into(), value);
        self.changed();
        previous.map(Observed::into_value)
    }

    /// Delete `key`; absent keys are not a mutation and stay silent
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.entries.shift_remove(key)?;
        self.changed();
        Some(removed.into_value())
    }

    /// Insert every entry, firing the callback once
    pub fn update<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            let value = Observed::observe(value.into(), &self.on_change);
            self.entries.insert(key.into(), value);
        }
        self.changed();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.changed();
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_value()))
            .collect()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.entries
            .into_iter()
            .map(|(key, value)| (key, value.into_value()))
            .collect()
    }
}

impl PartialEq for ObservedMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for ObservedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// Observed JSON array
pub struct ObservedList {
    items: Vec<Observed>,
    on_change: ChangeCallback,
}

impl ObservedList {
    /// Empty list reporting to `callback`
    pub fn new(callback: ChangeCallback) -> Self {
        Self {
            items: Vec::new(),
            on_change: callback,
        }
    }

    /// Wrap `items` recursively without firing the callback
    pub fn observe(items: Vec<Value>, callback: &ChangeCallback) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| Observed::observe(item, callback))
                .collect(),
            on_change: Rc::clone(callback),
        }
    }

    fn changed(&self) {
        (self.on_change)();
    }

    fn wrap(&self, value: impl Into<Value>) -> Observed {
        Observed::observe(value.into(), &self.on_change)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Observed> {
        self.items.get(index)
    }

    pub fn get_value(&self, index: usize) -> Option<Value> {
        self.items.get(index).map(Observed::to_value)
    }

    pub fn get_map_mut(&mut self, index: usize) -> Option<&mut ObservedMap> {
        self.items.get_mut(index).and_then(Observed::as_map_mut)
    }

    pub fn get_list_mut(&mut self, index: usize) -> Option<&mut ObservedList> {
        self.items.get_mut(index).and_then(Observed::as_list_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observed> {
        self.items.iter()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|item| item == value)
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        let item = self.wrap(value);
        self.items.push(item);
        self.changed();
    }

    /// Append every value, firing the callback once
    pub fn extend<I, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let wrapped: Vec<Observed> = values.into_iter().map(|v| self.wrap(v)).collect();
        self.items.extend(wrapped);
        self.changed();
    }

    /// Insert before `index`; indices past the end append
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) {
        let item = self.wrap(value);
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        self.changed();
    }

    /// Replace the item at `index`, returning the old one
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<Value, ContainerError> {
        let len = self.items.len();
        if index >= len {
            return Err(ContainerError::IndexOutOfRange { index, len });
        }
        let item = self.wrap(value);
        let previous = std::mem::replace(&mut self.items[index], item);
        self.changed();
        Ok(previous.into_value())
    }

    pub fn remove(&mut self, index: usize) -> Result<Value, ContainerError> {
        let len = self.items.len();
        if index >= len {
            return Err(ContainerError::IndexOutOfRange { index, len });
        }
        let removed = self.items.remove(index);
        self.changed();
        Ok(removed.into_value())
    }

    pub fn pop(&mut self) -> Option<Value> {
        let removed = self.items.pop()?;
        self.changed();
        Some(removed.into_value())
    }

    /// Remove the first item equal to `value`
    pub fn remove_value(&mut self, value: &Value) -> Result<(), ContainerError> {
        let position = self
            .items
            .iter()
            .position(|item| item == value)
            .ok_or_else(|| ContainerError::ValueNotPresent(value.to_string()))?;
        self.items.remove(position);
        self.changed();
        Ok(())
    }

    /// Sort by [`compare_values`]
    pub fn sort(&mut self) {
        self.sort_by(|a, b| compare_values(&a.to_value(), &b.to_value()));
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Observed, &Observed) -> Ordering,
    {
        self.items.sort_by(compare);
        self.changed();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.changed();
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.iter().map(Observed::to_value).collect()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.items.into_iter().map(Observed::into_value).collect()
    }
}

impl PartialEq for ObservedList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Debug for ObservedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

/// Total order over JSON values: null < bool < number < string < array < object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_values(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => canonical_string(a).cmp(&canonical_string(b)),
        _ => rank(a).cmp(&rank(b)),
    }
}
