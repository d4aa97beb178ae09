//! Local bindings for one user-function call or one collection iteration.
//!
//! Scopes never nest: a call receives exactly one flat scope and cannot see
//! the bindings of its caller.

use indexmap::IndexMap;

use crate::value::Value;

/// A single flat scope frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    /// Bindings in insertion order, so `this` renders parameters in order.
    bindings: IndexMap<String, Value>,
}

impl Scope {
    /// Create a new empty scope.
    pub fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    /// A scope with one binding, as used per collection element.
    pub fn single(name: impl Into<String>, value: Value) -> Self {
        let mut scope = Self::new();
        scope.define(name, value);
        scope
    }

    /// Define (or overwrite) a binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Resolve an identifier against the scope.
    ///
    /// An exact binding wins; otherwise the part before the first `.` names
    /// a binding and the rest is a path into its value. `None` when neither
    /// the name nor its leading segment is bound.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value.clone());
        }
        let (head, path) = name.split_once('.')?;
        self.bindings.get(head).map(|value| value.get_path(path))
    }

    pub fn bindings(&self) -> &IndexMap<String, Value> {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The scope as an object value (what `this` evaluates to).
    pub fn to_value(&self) -> Value {
        Value::object(self.bindings.clone())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
