//! Variable-binding state

use super::ids::ValueId;
use std::collections::BTreeMap;

/// Name under which a function's pending return value is bound
pub const RETURN_BINDING: &str = "return";

/// Mapping from variable name to the SSA value it currently holds
///
/// Values are immutable, so cloning a state is a shallow copy of the map.
/// States are cloned at every control-flow fork and only ever merged through
/// explicit phi construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    bindings: BTreeMap<String, ValueId>,
}

impl State {
    /// Creates an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Value currently bound to `name`
    pub fn get(&self, name: &str) -> Option<ValueId> {
        self.bindings.get(name).copied()
    }

    /// Binds `name` to `value`, replacing any previous binding
    pub fn bind(&mut self, name: impl Into<String>, value: ValueId) {
        self.bindings.insert(name.into(), value);
    }

    /// Whether `name` has a binding
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bindings in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ValueId)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the state binds nothing
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Rewrites every binding of `old` to `new`
    pub(crate) fn substitute(&mut self, old: ValueId, new: ValueId) {
        for value in self.bindings.values_mut() {
            if *value == old {
                *value = new;
            }
        }
    }
}
