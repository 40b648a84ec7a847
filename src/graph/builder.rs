//! Declarative graph construction and compile-time validation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::CompilationError;

use super::compiled::{Executor, NodeInfo};
use super::edge::{Edge, EdgeOptions};
use super::handler::{Handler, Middleware};
use super::node::Node;

/// Options for [`Graph::new`]: parallelism and middleware, expressed as
/// fluent builder methods.
#[derive(Default)]
pub struct GraphOptions {
    parallel: Option<bool>,
    middleware: Vec<Middleware>,
}

impl GraphOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `WithParallel(bool)`. Default is parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// `WithMiddleware(mw...)`, appended in call order.
    pub fn with_middleware(mut self, mw: Middleware) -> Self {
        self.middleware.push(mw);
        self
    }
}

/// Declarative builder for a node/edge DAG. Build with [`Graph::add_node`]
/// / [`Graph::add_edge`], set [`Graph::set_entry_point`] /
/// [`Graph::set_finish_point`], then [`Graph::compile`] to obtain an
/// immutable [`Executor`].
pub struct Graph {
    nodes: HashMap<String, Node>,
    node_order: Vec<String>,
    edges: Vec<Edge>,
    seen_edges: HashSet<(String, String)>,
    entry: Option<String>,
    finish: Option<String>,
    parallel: bool,
    middleware: Vec<Middleware>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(GraphOptions::default())
    }
}

impl Graph {
    pub fn new(options: GraphOptions) -> Self {
        Self {
            nodes: HashMap::new(),
            node_order: Vec::new(),
            edges: Vec::new(),
            seen_edges: HashSet::new(),
            entry: None,
            finish: None,
            parallel: options.parallel.unwrap_or(true),
            middleware: options.middleware,
        }
    }

    /// Registers a node. Idempotent on duplicate name: the first handler
    /// registered for a given name wins, so declarative
    /// callers can re-register the same node id without clobbering it.
    pub fn add_node(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> &mut Self {
        let name = name.into();
        if !self.nodes.contains_key(&name) {
            self.node_order.push(name.clone());
            self.nodes.insert(name.clone(), Node::new(name, handler));
        }
        self
    }

    /// Adds an edge. Idempotent on duplicate `(from, to)` pair — the
    /// first add wins; insertion order among edges sharing the same
    /// `from` is preserved and is significant for conditional routing.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        options: EdgeOptions,
    ) -> &mut Self {
        let from = from.into();
        let to = to.into();
        let key = (from.clone(), to.clone());
        if self.seen_edges.contains(&key) {
            return self;
        }
        self.seen_edges.insert(key);
        let group = options.group.unwrap_or_else(|| to.clone());
        self.edges.push(Edge {
            from,
            to,
            condition: options.condition,
            group,
        });
        self
    }

    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry = Some(name.into());
        self
    }

    pub fn set_finish_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.finish = Some(name.into());
        self
    }

    /// Validates and compiles the graph into an immutable [`Executor`].
    ///
    /// Validation order:
    /// 1. entry/finish set and reference existing nodes,
    /// 2. every edge endpoint references an existing node,
    /// 3. no directed cycle exists anywhere in the node set (not just the
    ///    reachable subgraph),
    /// 4. the finish node is reachable from the entry via BFS.
    pub fn compile(self) -> Result<Executor, CompilationError> {
        let entry = self.entry.clone().ok_or(CompilationError::MissingEntryPoint)?;
        let finish = self
            .finish
            .clone()
            .ok_or(CompilationError::MissingFinishPoint)?;
        if !self.nodes.contains_key(&entry) {
            return Err(CompilationError::UnknownNode(entry));
        }
        if !self.nodes.contains_key(&finish) {
            return Err(CompilationError::UnknownNode(finish));
        }

        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.from) {
                return Err(CompilationError::EdgeFromUnknownNode {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
            if !self.nodes.contains_key(&edge.to) {
                return Err(CompilationError::EdgeToUnknownNode {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
        }

        let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in &self.edges {
            outgoing.entry(edge.from.as_str()).or_default().push(edge);
        }

        if let Some(cycle) = detect_cycle(&self.node_order, &outgoing) {
            return Err(CompilationError::CycleDetected(cycle.join(" -> ")));
        }

        if !reachable(&entry, &finish, &outgoing) {
            return Err(CompilationError::FinishNotReachable);
        }

        let mut infos: HashMap<String, NodeInfo> = HashMap::new();
        let mut predecessors: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            predecessors
                .entry(edge.to.as_str())
                .or_default()
                .push(edge.from.as_str());
        }

        for name in &self.node_order {
            let node_edges: Vec<Edge> = outgoing
                .get(name.as_str())
                .map(|v| v.iter().map(|e| (*e).clone()).collect())
                .unwrap_or_default();
            let has_conditions = node_edges.iter().any(|e| e.condition.is_some());
            let unconditional_destinations = node_edges
                .iter()
                .filter(|e| e.condition.is_none())
                .map(|e| e.to.clone())
                .collect();

            let mut preds: Vec<String> = predecessors
                .get(name.as_str())
                .map(|v| v.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();
            preds.sort();
            preds.dedup();

            let is_entry = name == &entry;
            if is_entry {
                // Synthetic entry parent, always ordered first.
                preds.insert(0, super::task::GRAPH_ENTRY.to_string());
            }
            let dependency_count = preds.len();

            infos.insert(
                name.clone(),
                NodeInfo {
                    name: name.clone(),
                    outgoing: node_edges,
                    unconditional_destinations,
                    has_conditions,
                    predecessors: preds,
                    dependency_count,
                    is_finish: name == &finish,
                },
            );
        }

        Ok(Executor::new(
            self.nodes,
            self.node_order,
            infos,
            entry,
            finish,
            self.parallel,
            self.middleware,
        ))
    }
}

/// DFS-based cycle detection over *all* nodes, not only those reachable
/// from the entry, so a disconnected cyclic component still fails
/// compilation.
fn detect_cycle(
    node_order: &[String],
    outgoing: &HashMap<&str, Vec<&Edge>>,
) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = node_order.iter().map(|n| (n.as_str(), Mark::Unvisited)).collect();
    let mut stack: Vec<String> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        outgoing: &HashMap<&'a str, Vec<&'a Edge>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::InProgress);
        stack.push(node.to_string());

        if let Some(edges) = outgoing.get(node) {
            for edge in edges {
                let next = edge.to.as_str();
                match marks.get(next).copied().unwrap_or(Mark::Unvisited) {
                    Mark::InProgress => {
                        let cycle_start = stack.iter().position(|n| n == next).unwrap();
                        let mut cycle: Vec<String> = stack[cycle_start..].to_vec();
                        cycle.push(next.to_string());
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(c) = visit(next, outgoing, marks, stack) {
                            return Some(c);
                        }
                    }
                    Mark::Done => {}
                }
            }
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    for name in node_order {
        if marks.get(name.as_str()).copied() == Some(Mark::Unvisited) {
            if let Some(cycle) = visit(name, outgoing, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

/// BFS reachability check from `entry` to `finish`.
fn reachable(entry: &str, finish: &str, outgoing: &HashMap<&str, Vec<&Edge>>) -> bool {
    if entry == finish {
        return true;
    }
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(entry);
    visited.insert(entry);
    while let Some(n) = queue.pop_front() {
        if let Some(edges) = outgoing.get(n) {
            for edge in edges {
                let next = edge.to.as_str();
                if next == finish {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    false
}
