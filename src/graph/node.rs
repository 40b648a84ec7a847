//! Node: `{name, handler}`.

use std::sync::Arc;

use super::handler::Handler;

/// A named node. Created at build time, frozen at compile time, executed
/// at most once per run (subject to the edge-skip rules applied during
/// scheduling).
#[derive(Clone)]
pub struct Node {
    pub name: String,
    pub handler: Arc<dyn Handler>,
}

impl Node {
    pub fn new(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("name", &self.name).finish()
    }
}
