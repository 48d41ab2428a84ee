use std::fmt;
use std::sync::Arc;

use super::Value;
use crate::types::Class;

#[derive(Debug)]
struct ObjectData {
    class: Class,
    fields: Vec<(String, Value)>,
}

/// An instance of a [`Class`] exposing named fields.
#[derive(Clone)]
pub struct Object(Arc<ObjectData>);

impl Object {
    /// Build an instance. A repeated field name keeps the last value.
    pub fn new<I, K>(class: &Class, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut collected: Vec<(String, Value)> = Vec::new();
        for (name, value) in fields {
            let name = name.into();
            match collected.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => collected.push((name, value)),
            }
        }
        Object(Arc::new(ObjectData {
            class: class.clone(),
            fields: collected,
        }))
    }

    pub fn class(&self) -> &Class {
        &self.0.class
    }

    /// Attribute lookup.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0
            .fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class() == other.class()
            && self.0.fields.len() == other.0.fields.len()
            && self
                .fields()
                .all(|(name, value)| other.field(name) == Some(value))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.class().name());
        for (name, value) in self.fields() {
            out.field(name, value);
        }
        out.finish()
    }
}

/// A key/value association. Keys are arbitrary values compared with host
/// equality; insertion order is kept for display only.
#[derive(Clone, Default)]
pub struct Map(Arc<Vec<(Value, Value)>>);

impl Map {
    pub fn new() -> Self {
        Map::default()
    }

    /// Build a map. A repeated key keeps the last value.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let mut collected: Vec<(Value, Value)> = Vec::new();
        for (key, value) in entries {
            match collected.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => collected.push((key, value)),
            }
        }
        Map(Arc::new(collected))
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
