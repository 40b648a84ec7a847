//! Handler/Middleware contract.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GraphError;
use crate::state::State;

use super::context::NodeContext;

/// Node computation contract: `(ctx, state) -> (state, error)`.
///
/// Pure with respect to its inputs by convention — the scheduler clones
/// the aggregated state before handing it to the handler and clones the
/// returned state again before merging it into successors, so a handler
/// cannot observe mutation performed elsewhere.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &NodeContext, state: State) -> Result<State, GraphError>;
}

/// Adapts a plain async closure into a [`Handler`], so callers can
/// register a node without writing out a named struct.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(NodeContext, State) -> Fut + Send + Sync,
    Fut: Future<Output = Result<State, GraphError>> + Send + 'static,
{
    async fn call(&self, ctx: &NodeContext, state: State) -> Result<State, GraphError> {
        (self.0)(ctx.clone(), state).await
    }
}

/// Builds a [`Handler`] from an async closure `Fn(NodeContext, State) -> impl Future<Output = Result<State, GraphError>>`.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(NodeContext, State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<State, GraphError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler(..)")
    }
}

/// `Middleware = (Handler) -> Handler`. Composition applies the first
/// middleware in a list as the outermost wrapper (last to run before
/// returning) — see [`compose`].
pub type Middleware = Arc<dyn Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync>;

/// Wraps `inner` with `middleware` in list order so that `middleware[0]`
/// ends up outermost.
pub fn compose(middleware: &[Middleware], inner: Arc<dyn Handler>) -> Arc<dyn Handler> {
    middleware.iter().rev().fold(inner, |acc, mw| mw(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn base() -> Arc<dyn Handler> {
        handler_fn(|_ctx, mut state| async move {
            state.insert("base", true);
            Ok(state)
        })
    }

    fn tagging_middleware(tag: &'static str, order: Arc<AtomicUsize>) -> Middleware {
        Arc::new(move |inner: Arc<dyn Handler>| {
            let order = order.clone();
            handler_fn(move |ctx, state| {
                let inner = inner.clone();
                let order = order.clone();
                async move {
                    let seq = order.fetch_add(1, Ordering::SeqCst);
                    let mut state = state;
                    state.insert(format!("mw_{tag}"), seq as i64);
                    inner.call(&ctx, state).await
                }
            })
        })
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let order = Arc::new(AtomicUsize::new(0));
        let mws = vec![
            tagging_middleware("outer", order.clone()),
            tagging_middleware("inner", order.clone()),
        ];
        let wrapped = compose(&mws, base());
        let ctx = NodeContext::new("n", tokio_util::sync::CancellationToken::new());
        let out = wrapped.call(&ctx, State::new()).await.unwrap();
        // "outer" middleware runs first (sequence 0), "inner" second (sequence 1).
        assert_eq!(out.get("mw_outer").unwrap(), &serde_json::Value::from(0));
        assert_eq!(out.get("mw_inner").unwrap(), &serde_json::Value::from(1));
    }
}
