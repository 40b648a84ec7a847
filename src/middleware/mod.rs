//! Ready-made [`crate::graph::Middleware`] implementations.
//!
//! Retry is deliberately *not* a first-class `Executor` field: it's an
//! explicit middleware policy, not something the scheduler applies on
//! your behalf. [`with_retry`] is the one example of such a policy,
//! wrapping a handler with a bounded re-invocation count and no backoff
//! engine.

mod retry;

pub use retry::with_retry;
