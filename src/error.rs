//! Stable error identities surfaced to callers.
//!
//! Message wording is part of the public contract — callers are expected
//! to match on it — so variants should not be reworded casually once
//! published.

use thiserror::Error;

/// Error returned by [`crate::graph::Graph::compile`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompilationError {
    #[error("entry point not set")]
    MissingEntryPoint,
    #[error("finish point not set")]
    MissingFinishPoint,
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("edge to unknown node: {from} -> {to}")]
    EdgeToUnknownNode { from: String, to: String },
    #[error("edge from unknown node: {from} -> {to}")]
    EdgeFromUnknownNode { from: String, to: String },
    #[error("cycles are not supported (cycle: {0})")]
    CycleDetected(String),
    #[error("finish node not reachable")]
    FinishNotReachable,
}

/// Error returned by [`crate::graph::Executor::execute`].
#[derive(Debug, Error, Clone)]
pub enum GraphError {
    #[error("no condition matched for edges from {0}")]
    NoConditionMatched(String),
    #[error("no outgoing edges from {0}")]
    NoOutgoingEdges(String),
    #[error("failed to execute node {node}: {cause}")]
    HandlerFailed { node: String, cause: String },
    #[error("finish node not reachable")]
    FinishNotReachable,
    #[error("context canceled")]
    Canceled,
}

impl GraphError {
    /// Wraps an arbitrary handler error with the node name that produced it.
    pub fn from_handler(node: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        GraphError::HandlerFailed {
            node: node.into(),
            cause: cause.to_string(),
        }
    }
}

/// Error returned by a [`crate::tool::Tool`] or its typed JSON adapter.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    #[error("failed to decode tool input: {0}")]
    Decode(String),
    #[error("failed to encode tool output: {0}")]
    Encode(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Error returned by [`crate::provider::Provider::generate`] /
/// [`crate::provider::Provider::new_stream`] and the bounded tool-iteration
/// loop in [`crate::provider::iterate`].
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("empty completion response")]
    EmptyCompletion,
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("too many iterations requested")]
    TooManyIterations,
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
    #[error("canceled")]
    Canceled,
}
