//! Collapse concurrent calls that share a key into one execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

type InFlight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;
type Registry<T, E> = Arc<Mutex<HashMap<String, InFlight<T, E>>>>;

/// Removes a key from the registry when the shared execution finishes or unwinds.
struct Release<T, E> {
    registry: Registry<T, E>,
    key: String,
}

impl<T, E> Drop for Release<T, E> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

/// Shares one in-flight future per key between concurrent callers.
///
/// Every caller receives a clone of the same result, success or error. The
/// key is released as soon as the future settles or panics, so later calls
/// run fresh.
pub struct Deduplicator<T, E> {
    in_flight: Registry<T, E>,
}

impl<T, E> Default for Deduplicator<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Deduplicator<T, E> {
    /// Create an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Keys currently executing.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<T, E> Deduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Run `f` under `key`, or join the execution already in flight for it.
    ///
    /// `f` is only called when no execution for `key` is pending. A panic in
    /// the execution reaches every caller sharing it, and the key is released.
    ///
    /// # Errors
    ///
    /// Returns the (shared) error of the underlying execution.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut map = self.in_flight.lock();
            if let Some(existing) = map.get(key) {
                debug!(key, "joining in-flight execution");
                existing.clone()
            } else {
                let release = Release {
                    registry: Arc::clone(&self.in_flight),
                    key: key.to_string(),
                };
                let fut = f();
                let shared = async move {
                    let _release = release;
                    fut.await
                }
                .boxed()
                .shared();
                map.insert(key.to_string(), shared.clone());
                shared
            }
        };
        shared.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_call() {
        let dedup = Deduplicator::<u32, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, String>(42)
            }
        };

        let (a, b, c) = tokio::join!(
            dedup.run("k", make()),
            dedup.run("k", make()),
            dedup.run("k", make())
        );
        assert_eq!((a, b, c), (Ok(42), Ok(42), Ok(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_key_released() {
        let dedup = Deduplicator::<u32, String>::new();
        let first = dedup
            .run("k", || async { Err::<u32, _>("down".to_string()) })
            .await;
        assert_eq!(first, Err("down".to_string()));

        let second = dedup.run("k", || async { Ok(1) }).await;
        assert_eq!(second, Ok(1));
    }

    async fn explode() -> Result<u32, String> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_call_releases_key() {
        let dedup = Arc::new(Deduplicator::<u32, String>::new());

        let d = Arc::clone(&dedup);
        let joined = tokio::spawn(async move { d.run("k", explode).await }).await;
        assert!(joined.is_err_and(|e| e.is_panic()));
        assert_eq!(dedup.in_flight_count(), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let second = dedup
            .run("k", move || async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight_count(), 0);
    }
}
