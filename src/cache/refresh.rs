//! Per-key refresh coalescing.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Deduplicates concurrent refreshes of the same cache key.
///
/// At most one load is in flight per key: the first caller's future is
/// registered and driven; callers arriving while it runs await the same
/// shared future and receive its result without issuing another store read.
/// Unrelated keys live in separate map shards and never contend.
///
/// The load future itself is responsible for publishing the snapshot it
/// builds; the coordinator only guarantees single-flight execution. A flight
/// deregisters itself before yielding its result, so a caller can only ever
/// join a load that is still running.
pub struct RefreshCoordinator<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inflight: Arc<DashMap<K, Flight<V, E>>>,
}

impl<K, V, E> RefreshCoordinator<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Run `load` for `key`, or join the load already in flight.
    ///
    /// The result type must be `Clone` so every joined caller gets it.
    pub async fn run<F>(&self, key: K, load: F) -> Result<V, E>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        // The entry guard is dropped before awaiting; only the shard lock
        // is held while registering. The flight removes its own entry in
        // its tail, so it is gone from the map by the time its result is
        // observable and late callers always start a fresh load.
        let flight = match self.inflight.entry(key.clone()) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let inflight = Arc::clone(&self.inflight);
                let flight = async move {
                    let result = load.await;
                    inflight.remove(&key);
                    result
                }
                .boxed()
                .shared();
                e.insert(flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Number of refreshes currently in flight.
    #[allow(dead_code)]
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

impl<K, V, E> Default for RefreshCoordinator<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
