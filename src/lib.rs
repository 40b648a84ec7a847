//! # flowgraph
//!
//! A concurrent DAG execution engine for agent-style workloads: build a
//! graph of named nodes and (optionally conditional) edges, compile it
//! once into an immutable [`graph::Executor`], and run it any number of
//! times against fresh [`state::State`] values. The same compiled graph
//! is safe to `execute` concurrently.
//!
//! ## Design principles
//!
//! - **State-in, state-out**: every node is `(ctx, State) -> (State, error)`.
//!   The engine clones before handing state to a handler and clones again
//!   before merging it into successors, so a handler can never observe
//!   another node's mutation.
//! - **Deterministic join semantics**: a node runs once every predecessor
//!   has either contributed or been skipped, merged in a compile-time
//!   sorted predecessor order — not the physical order workers finish in.
//! - **One scheduler, two dispatch modes**: parallel and serial execution
//!   share the same `Task` code path; only whether a node's handler runs
//!   on a fresh worker or inline differs.
//!
//! ## Main modules
//!
//! - [`graph`]: `Graph`, `Executor`, `Node`, `Edge`, `Handler`, `Middleware`
//!   — build, compile, and run DAGs.
//! - [`state`]: `State`, the key/value map threaded through every node.
//! - [`stream`]: `Generator` and its combinators (`Just`, `Filter`, `Map`,
//!   `Observe`, `Merge`) — pull-based, cancellation-friendly sequences.
//! - [`tool`]: `Tool`, `FunctionTool`, `ToolRegistry` — JSON-in/JSON-out
//!   callables invokable by name from the provider loop.
//! - [`provider`]: `Provider`, `ProviderRequest`/`ProviderResponse`, and
//!   the bounded iterative tool-resolution loop (`generate_with_tools`,
//!   `ToolLoopStream`).
//! - [`middleware`]: ready-made `Middleware` implementations (currently:
//!   bounded retry) built on the `graph` module's handler contract.
//! - [`error`]: stable error identities shared by every module above.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowgraph::graph::{handler_fn, Graph, GraphOptions};
//! use flowgraph::state::State;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut graph = Graph::new(GraphOptions::new());
//! graph.add_node(
//!     "increment",
//!     handler_fn(|_ctx, mut state| async move {
//!         let v = state.get("v").and_then(|v| v.as_i64()).unwrap_or(0);
//!         state.insert("v", v + 1);
//!         Ok(state)
//!     }),
//! );
//! graph.set_entry_point("increment");
//! graph.set_finish_point("increment");
//! let executor = graph.compile().unwrap();
//! let out = executor.invoke(State::with("v", 0)).await.unwrap();
//! assert_eq!(out.get("v").unwrap(), &serde_json::Value::from(1));
//! # }
//! ```

pub mod error;
pub mod graph;
pub mod middleware;
pub mod provider;
pub mod state;
pub mod stream;
pub mod tool;

pub use error::{CompilationError, GraphError, ProviderError, ToolError};
pub use graph::{
    compose, handler_fn, Edge, EdgeCondition, EdgeOptions, Executor, FnHandler, Graph,
    GraphOptions, Handler, Middleware, Node, NodeContext, NodeInfo,
};
pub use middleware::with_retry;
pub use provider::{
    generate_with_tools, ContentPart, Message, Provider, ProviderLoopConfig, ProviderRequest,
    ProviderResponse, Role, ToolLoopStream,
};
pub use state::State;
pub use stream::{Fail, Filter, Generator, Just, Map, Merge, Observe};
pub use tool::{
    compose_tool_middleware, FunctionTool, Tool, ToolDescriptor, ToolMiddleware, ToolRegistry,
};
