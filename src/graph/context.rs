//! Per-invocation context passed to every handler and middleware call.
//!
//! Rust has no ambient context map, so the current node name and
//! cancellation signal are threaded through explicitly as a small struct
//! rather than looked up dynamically.

use tokio_util::sync::CancellationToken;

/// Context available to a running node: its own name, and the
/// cancellation token for the whole `Executor::execute` call.
///
/// Handlers are expected to check [`NodeContext::is_canceled`] (or select
/// on [`NodeContext::cancelled`]) during long-running work, mirroring the
/// `ctx.Done()`-style cooperative cancellation.
#[derive(Clone)]
pub struct NodeContext {
    node_name: String,
    cancellation: CancellationToken,
}

impl NodeContext {
    /// Builds a context directly. The scheduler constructs one per
    /// dispatched node; callers otherwise need this mainly to exercise a
    /// [`crate::tool::Tool`] or [`crate::provider::Provider`] in
    /// isolation from a running graph (as the crate's own tests do).
    pub fn new(node_name: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            node_name: node_name.into(),
            cancellation,
        }
    }

    /// The name of the node currently executing.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// True if the run's cancellation token has been triggered.
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the run's cancellation token is triggered.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

}
