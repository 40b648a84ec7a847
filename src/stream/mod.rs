//! Pull-based generator combinators for in-process streaming.
//!
//! A [`Generator`] is a lazy, single-consumer sequence of `Result<T, E>`
//! values: nothing runs until the consumer calls [`Generator::next`], and
//! the consumer may stop advancing at any time without the generator
//! doing any further work. This is the backpressure mechanism for the
//! whole crate — both [`crate::provider`]'s streaming core and any
//! future incremental-output node build on it.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// A lazy, pull-driven sequence of fallible values.
#[async_trait]
pub trait Generator<T, E>: Send
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Advances the generator, yielding the next value, its error, or
    /// `None` once exhausted. Once `None` is returned the generator must
    /// not be polled again.
    async fn next(&mut self) -> Option<Result<T, E>>;
}

/// Finite generator emitting a fixed sequence of values.
pub struct Just<T> {
    values: VecDeque<T>,
}

impl<T> Just<T> {
    pub fn new(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<T, E> Generator<T, E> for Just<T>
where
    T: Send + 'static,
    E: Send + 'static,
{
    async fn next(&mut self) -> Option<Result<T, E>> {
        self.values.pop_front().map(Ok)
    }
}

/// Generator yielding a single error, then ending.
pub struct Fail<E> {
    err: Option<E>,
}

impl<E> Fail<E> {
    pub fn new(err: E) -> Self {
        Self { err: Some(err) }
    }
}

#[async_trait]
impl<T, E> Generator<T, E> for Fail<E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    async fn next(&mut self) -> Option<Result<T, E>> {
        self.err.take().map(Err)
    }
}

/// Drops values failing `pred`; errors from the inner generator pass
/// through untouched.
pub struct Filter<T, E> {
    inner: Box<dyn Generator<T, E>>,
    pred: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T, E> Filter<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(
        inner: Box<dyn Generator<T, E>>,
        pred: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            pred: Arc::new(pred),
        }
    }
}

#[async_trait]
impl<T, E> Generator<T, E> for Filter<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    async fn next(&mut self) -> Option<Result<T, E>> {
        loop {
            match self.inner.next().await {
                None => return None,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(v)) => {
                    if (self.pred)(&v) {
                        return Some(Ok(v));
                    }
                }
            }
        }
    }
}

/// Transforms each value with a fallible mapper; mapper errors are
/// yielded like any other generator error.
pub struct Map<T, U, E> {
    inner: Box<dyn Generator<T, E>>,
    f: Arc<dyn Fn(T) -> Result<U, E> + Send + Sync>,
}

impl<T, U, E> Map<T, U, E>
where
    T: Send + 'static,
    U: Send + 'static,
    E: Send + 'static,
{
    pub fn new(
        inner: Box<dyn Generator<T, E>>,
        f: impl Fn(T) -> Result<U, E> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            f: Arc::new(f),
        }
    }
}

#[async_trait]
impl<T, U, E> Generator<U, E> for Map<T, U, E>
where
    T: Send + 'static,
    U: Send + 'static,
    E: Send + 'static,
{
    async fn next(&mut self) -> Option<Result<U, E>> {
        match self.inner.next().await {
            None => None,
            Some(Err(e)) => Some(Err(e)),
            Some(Ok(v)) => Some((self.f)(v)),
        }
    }
}

/// Invokes `obs` for every `(value, error)` pulled from the inner
/// generator; an observer error is yielded in place of the original
/// value.
pub struct Observe<T, E> {
    inner: Box<dyn Generator<T, E>>,
    obs: Arc<dyn Fn(&Result<T, E>) -> Result<(), E> + Send + Sync>,
}

impl<T, E> Observe<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(
        inner: Box<dyn Generator<T, E>>,
        obs: impl Fn(&Result<T, E>) -> Result<(), E> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            obs: Arc::new(obs),
        }
    }
}

#[async_trait]
impl<T, E> Generator<T, E> for Observe<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    async fn next(&mut self) -> Option<Result<T, E>> {
        match self.inner.next().await {
            None => None,
            Some(result) => {
                if let Err(e) = (self.obs)(&result) {
                    return Some(Err(e));
                }
                Some(result)
            }
        }
    }
}

/// Fan-in: one worker per input generator, running concurrently. Values
/// are forwarded through an mpsc channel as they arrive, which gives the
/// serialization a mutex would otherwise provide — only one worker's
/// send can be in the channel's queue slot at a time. Ordering across
/// inputs is unspecified; ordering within a single input is preserved
/// because each input is driven sequentially by its own worker.
pub struct Merge<T, E> {
    rx: UnboundedReceiverStream<Result<T, E>>,
    _workers: JoinSet<()>,
}

impl<T, E> Merge<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(inputs: Vec<Box<dyn Generator<T, E>>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for mut input in inputs {
            let tx = tx.clone();
            workers.spawn(async move {
                while let Some(item) = input.next().await {
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        Self {
            rx: UnboundedReceiverStream::new(rx),
            _workers: workers,
        }
    }
}

#[async_trait]
impl<T, E> Generator<T, E> for Merge<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    async fn next(&mut self) -> Option<Result<T, E>> {
        self.rx.next().await
    }
}
