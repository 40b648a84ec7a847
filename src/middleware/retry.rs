//! Bounded retry middleware: re-invokes a handler up to `max_attempts`
//! times on failure, returning the last error if every attempt fails.
//!
//! No backoff policy is implemented here — callers who need delay
//! between attempts compose their own middleware around this one, or
//! write a different one; this crate only commits to the bounded-retry
//! shape, the same kind of bounded loop the provider core's tool
//! iteration also relies on.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GraphError;
use crate::graph::{Handler, Middleware, NodeContext};
use crate::state::State;

struct RetryHandler {
    inner: Arc<dyn Handler>,
    max_attempts: u32,
}

#[async_trait]
impl Handler for RetryHandler {
    async fn call(&self, ctx: &NodeContext, state: State) -> Result<State, GraphError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.call(ctx, state.clone()).await {
                Ok(out) => return Ok(out),
                Err(e) => {
                    if attempt >= self.max_attempts || ctx.is_canceled() {
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Builds a [`Middleware`] that retries the wrapped handler up to
/// `max_attempts` times (the first call counts as attempt 1). A handler
/// that never succeeds returns its final attempt's error; cancellation
/// short-circuits remaining attempts.
pub fn with_retry(max_attempts: u32) -> Middleware {
    let max_attempts = max_attempts.max(1);
    Arc::new(move |inner: Arc<dyn Handler>| {
        Arc::new(RetryHandler {
            inner,
            max_attempts,
        }) as Arc<dyn Handler>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::handler_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> NodeContext {
        NodeContext::new("n", CancellationToken::new())
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let flaky = handler_fn(move |_ctx, state| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(GraphError::from_handler("n", "not yet"))
                } else {
                    Ok(state)
                }
            }
        });
        let wrapped = with_retry(5)(flaky);
        let out = wrapped.call(&ctx(), State::new()).await;
        assert!(out.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let always_fails = handler_fn(move |_ctx, _state| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(GraphError::from_handler("n", "boom"))
            }
        });
        let wrapped = with_retry(3)(always_fails);
        let out = wrapped.call(&ctx(), State::new()).await;
        assert!(out.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
