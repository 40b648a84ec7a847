//! Concurrent DAG execution engine: declare nodes and edges with
//! [`Graph`], [`Graph::compile`] into an immutable [`Executor`], then
//! [`Executor::execute`] it against an initial [`crate::state::State`].

mod builder;
mod compiled;
mod context;
mod edge;
mod handler;
mod logging;
mod node;
mod task;

pub use builder::{Graph, GraphOptions};
pub use compiled::{Executor, NodeInfo};
pub use context::NodeContext;
pub use edge::{Edge, EdgeCondition, EdgeOptions};
pub use handler::{compose, handler_fn, FnHandler, Handler, Middleware};
pub use node::Node;
