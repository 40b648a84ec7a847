//! Compiled, immutable executor built from a validated graph.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::GraphError;
use crate::state::State;

use super::context::NodeContext;
use super::edge::Edge;
use super::handler::Middleware;
use super::node::Node;
use super::task::Task;

/// Precomputed per-node metadata, built once at [`super::Graph::compile`]
/// time and never mutated afterward.
#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub name: String,
    /// Outgoing edges, in insertion order (significant for conditional
    /// routing).
    pub outgoing: Vec<Edge>,
    /// Destinations of unconditional outgoing edges.
    pub unconditional_destinations: Vec<String>,
    pub has_conditions: bool,
    /// Deterministic, sorted predecessor list. For the entry node this is
    /// prepended with the synthetic `graph_entry` parent.
    pub predecessors: Vec<String>,
    pub dependency_count: usize,
    pub is_finish: bool,
}

/// Immutable compiled representation of a [`super::Graph`]. Safe for
/// concurrent `execute` calls — each call allocates a fresh [`Task`].
pub struct Executor {
    pub(crate) nodes: HashMap<String, Node>,
    node_order: Vec<String>,
    pub(crate) infos: HashMap<String, NodeInfo>,
    pub(crate) entry: String,
    pub(crate) finish: String,
    pub(crate) parallel: bool,
    pub(crate) middleware: Vec<Middleware>,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        nodes: HashMap<String, Node>,
        node_order: Vec<String>,
        infos: HashMap<String, NodeInfo>,
        entry: String,
        finish: String,
        parallel: bool,
        middleware: Vec<Middleware>,
    ) -> Self {
        Self {
            nodes,
            node_order,
            infos,
            entry,
            finish,
            parallel,
            middleware,
        }
    }

    /// Runs the compiled graph from `initial` state to completion,
    /// returning the finish node's output or the first error encountered.
    pub async fn execute(
        &self,
        cancellation: CancellationToken,
        initial: State,
    ) -> Result<State, GraphError> {
        Task::run(self, cancellation, initial).await
    }

    /// Convenience wrapper over [`Executor::execute`] with a fresh,
    /// never-triggered cancellation token.
    pub async fn invoke(&self, initial: State) -> Result<State, GraphError> {
        self.execute(CancellationToken::new(), initial).await
    }

    /// Node names in declaration order (read-only introspection, grounded
    /// in the same style as a compiled store's node accessor).
    pub fn node_names(&self) -> &[String] {
        &self.node_order
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    pub fn finish_point(&self) -> &str {
        &self.finish
    }

    /// Minimal DOT-ish textual rendering of the compiled graph, for ad
    /// hoc debugging.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        for name in &self.node_order {
            if let Some(info) = self.infos.get(name) {
                for edge in &info.outgoing {
                    let label = if edge.condition.is_some() {
                        " [style=dashed]"
                    } else {
                        ""
                    };
                    out.push_str(&format!("  \"{}\" -> \"{}\"{label};\n", edge.from, edge.to));
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Result of evaluating a node's outgoing edges against the state it
/// produced.
pub(crate) struct EdgeDecision {
    pub edge: Edge,
    pub propagate: bool,
}

/// Decides which of a node's outgoing edges fire, given the state it
/// just produced: leading unconditional edges always fire, conditional
/// edges fire on the first match within their group, and a trailing
/// unconditional edge after conditionals acts as a fallback only if none
/// of the conditionals matched.
pub(crate) fn select_edges(
    info: &NodeInfo,
    ctx: &NodeContext,
    state: &State,
) -> Result<Vec<EdgeDecision>, GraphError> {
    if info.outgoing.is_empty() {
        return Err(GraphError::NoOutgoingEdges(info.name.clone()));
    }

    if !info.has_conditions {
        return Ok(info
            .outgoing
            .iter()
            .map(|e| EdgeDecision {
                edge: e.clone(),
                propagate: true,
            })
            .collect());
    }

    let mut decisions = Vec::with_capacity(info.outgoing.len());
    let mut leading = true;
    let mut any_conditional_matched = false;
    let mut any_conditional_seen = false;
    let mut any_propagated = false;
    let mut fallback_hit = false;

    for edge in &info.outgoing {
        if fallback_hit {
            decisions.push(EdgeDecision {
                edge: edge.clone(),
                propagate: false,
            });
            continue;
        }

        match &edge.condition {
            None => {
                if leading {
                    decisions.push(EdgeDecision {
                        edge: edge.clone(),
                        propagate: true,
                    });
                    any_propagated = true;
                } else {
                    // Fallback unconditional edge after some conditional(s).
                    let propagate = !any_conditional_matched;
                    if propagate {
                        any_propagated = true;
                    }
                    decisions.push(EdgeDecision {
                        edge: edge.clone(),
                        propagate,
                    });
                    fallback_hit = true;
                }
            }
            Some(pred) => {
                leading = false;
                any_conditional_seen = true;
                let matched = pred(ctx, state);
                if matched {
                    any_conditional_matched = true;
                    any_propagated = true;
                }
                decisions.push(EdgeDecision {
                    edge: edge.clone(),
                    propagate: matched,
                });
            }
        }
    }

    if !any_propagated && any_conditional_seen {
        return Err(GraphError::NoConditionMatched(info.name.clone()));
    }

    Ok(decisions)
}
