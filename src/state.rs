//! State: an immutable-by-convention string-keyed map that flows through
//! the graph. Handlers receive an aggregated `State` and return a new
//! `State`; the engine clones before handing off and before storing, so
//! a handler can never observe mutation performed by another node.
//!
//! Values are opaque JSON (`serde_json::Value`) rather than a typed
//! field set, keeping the engine generic over whatever a concrete agent
//! graph wants to thread through it (text, tool call records, counters,
//! ...).

use serde_json::Value;
use std::collections::BTreeMap;

/// A snapshot of graph state. Cheap to clone (shares no external
/// resources); clone-then-mutate is the expected pattern for handlers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State(BTreeMap<String, Value>);

impl State {
    /// An empty state.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builds a state from a single key/value pair — convenient for tests
    /// and for seeding the initial state of a run.
    pub fn with(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut s = Self::new();
        s.insert(key, value);
        s
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merges `other` into `self`; keys present in both are overwritten by
    /// `other`'s value. This is the primitive the Task scheduler uses when
    /// aggregating predecessor contributions in compile-time order: callers
    /// merge predecessor states one at a time, in order, into a running
    /// accumulator, so the *last* merge wins on collision.
    pub fn merge(&mut self, other: &State) {
        for (k, v) in other.0.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Returns a new state that is `self` merged with `other` (see [`State::merge`]).
    pub fn merged_with(&self, other: &State) -> State {
        let mut out = self.clone();
        out.merge(other);
        out
    }
}

impl From<BTreeMap<String, Value>> for State {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(BTreeMap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_then_mutate_does_not_affect_source() {
        let mut a = State::with("v", 1);
        let b = a.clone();
        a.insert("v", 2);
        assert_eq!(b.get("v").unwrap(), &Value::from(1));
        assert_eq!(a.get("v").unwrap(), &Value::from(2));
    }

    #[test]
    fn merge_later_wins_on_collision() {
        let mut a = State::with("v", 1);
        a.insert("only_a", "x");
        let mut b = State::with("v", 2);
        b.insert("only_b", "y");
        a.merge(&b);
        assert_eq!(a.get("v").unwrap(), &Value::from(2));
        assert_eq!(a.get("only_a").unwrap(), &Value::from("x"));
        assert_eq!(a.get("only_b").unwrap(), &Value::from("y"));
    }

    #[test]
    fn merge_is_associative_over_same_predecessor_order() {
        let a = State::with("k", "a");
        let b = State::with("k", "b");
        let c = State::with("k", "c");

        let left = a.merged_with(&b).merged_with(&c);
        let mut right_inner = b.clone();
        right_inner.merge(&c);
        let right = a.merged_with(&right_inner);

        assert_eq!(left, right);
    }
}
