//! Bounded concurrent execution and sequential batching.

use std::future::Future;
use std::time::Duration;

use futures::future::try_join_all;
use futures::stream::{self, StreamExt};
use tracing::debug;

/// Run `tasks` with at most `limit` in flight.
///
/// A new task starts only when a running one finishes. Results arrive in
/// completion order, one per task; a failing task does not affect the others.
/// A `limit` of zero is treated as one.
pub async fn parallel_execute<I, F, Fut, T, E>(tasks: I, limit: usize) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(tasks)
        .map(|task| task())
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}

/// Process `items` in chunks of `batch_size`, one chunk at a time.
///
/// Items inside a chunk run together. `delay` is inserted between chunks but
/// not after the last one. The first error aborts the remaining work and is
/// returned; partial results are discarded.
///
/// # Errors
///
/// Returns the first error produced by `f`.
pub async fn batch_process<T, O, E, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    delay: Duration,
    f: F,
) -> Result<Vec<O>, E>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<O, E>>,
{
    let batch_size = batch_size.max(1);
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut remaining = items.into_iter().peekable();
    let mut batch_index = 0usize;

    while remaining.peek().is_some() {
        let chunk: Vec<T> = remaining.by_ref().take(batch_size).collect();
        debug!(batch = batch_index, size = chunk.len(), total, "processing batch");
        let outputs = try_join_all(chunk.into_iter().map(&f)).await?;
        results.extend(outputs);
        batch_index += 1;

        if remaining.peek().is_some() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(results)
}
