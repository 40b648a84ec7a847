//! Structured logging for graph execution: an optional `tracing` feature,
//! with an `eprintln!`-based fallback so the engine still has breadcrumbs
//! when the feature is off.

use crate::error::GraphError;

pub fn log_node_start(node_id: &str) {
    #[cfg(feature = "tracing")]
    tracing::debug!(node_id, "starting node execution");

    #[cfg(not(feature = "tracing"))]
    eprintln!("[DEBUG] starting node execution: {node_id}");
}

pub fn log_node_complete(node_id: &str) {
    #[cfg(feature = "tracing")]
    tracing::debug!(node_id, "node execution complete");

    #[cfg(not(feature = "tracing"))]
    eprintln!("[DEBUG] node execution complete: {node_id}");
}

pub fn log_node_skipped(node_id: &str) {
    #[cfg(feature = "tracing")]
    tracing::debug!(node_id, "node skipped (no predecessor contributed)");

    #[cfg(not(feature = "tracing"))]
    eprintln!("[DEBUG] node skipped: {node_id}");
}

pub fn log_graph_start() {
    #[cfg(feature = "tracing")]
    tracing::info!("starting graph execution");

    #[cfg(not(feature = "tracing"))]
    eprintln!("[INFO] starting graph execution");
}

pub fn log_graph_complete() {
    #[cfg(feature = "tracing")]
    tracing::info!("graph execution complete");

    #[cfg(not(feature = "tracing"))]
    eprintln!("[INFO] graph execution complete");
}

pub fn log_graph_error(error: &GraphError) {
    #[cfg(feature = "tracing")]
    tracing::error!(%error, "graph execution error");

    #[cfg(not(feature = "tracing"))]
    eprintln!("[ERROR] graph execution error: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_functions_do_not_panic() {
        log_node_start("n");
        log_node_complete("n");
        log_node_skipped("n");
        log_graph_start();
        log_graph_complete();
        log_graph_error(&GraphError::FinishNotReachable);
    }
}
