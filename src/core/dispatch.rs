// src/core/dispatch.rs

//! Bounded fan-out for batches of independent API calls.
//!
//! Each reconciler phase builds one batch, runs it through [`run_limited`]
//! with the parallelism cap of the API family it talks to, and fully drains
//! it before the next phase starts. No retries happen here; callers decide
//! per item what a failure means.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Runs `op` over `items` with at most `parallelism` operations in flight.
/// Results are collected in completion order.
pub async fn run_limited<T, R, F, Fut>(parallelism: usize, items: Vec<T>, op: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items.into_iter().map(op))
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await
}
