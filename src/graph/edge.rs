//! Edges: optional conditional routing, join grouping.

use std::sync::Arc;

use crate::state::State;

use super::context::NodeContext;

/// `predicate(ctx, state) -> bool`, evaluated against the state produced
/// by the edge's source node.
pub type EdgeCondition = Arc<dyn Fn(&NodeContext, &State) -> bool + Send + Sync>;

/// One outgoing edge from a node.
///
/// Unconditional edges (`condition: None`) are always taken unless a
/// prior fallback on the same source already consumed the "no earlier
/// conditional matched" slot. The `group` tag
/// exists purely for callers who want to attribute a join to a named
/// set of incoming edges; the engine's own join semantics are driven by
/// dependency counts, not by `group`.
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
    pub group: String,
}

impl Edge {
    pub fn unconditional(from: impl Into<String>, to: impl Into<String>) -> Self {
        let to = to.into();
        Self {
            from: from.into(),
            group: to.clone(),
            to,
            condition: None,
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("conditional", &self.condition.is_some())
            .field("group", &self.group)
            .finish()
    }
}

/// Optional condition and join-group for [`super::Graph::add_edge`],
/// expressed as a small builder struct.
#[derive(Clone, Default)]
pub struct EdgeOptions {
    pub(crate) condition: Option<EdgeCondition>,
    pub(crate) group: Option<String>,
}

impl EdgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `WithEdgeCondition(pred)`.
    pub fn with_condition<F>(mut self, pred: F) -> Self
    where
        F: Fn(&NodeContext, &State) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(pred));
        self
    }

    /// `WithEdgeGroup(name)`.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}
