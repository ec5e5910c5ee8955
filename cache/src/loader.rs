use std::hash::Hash;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

/// The origin fetcher: resolves a key the cache does not hold.
pub(crate) type FetchFn<K, V, E> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

/// Computes the size an entry occupies in a tier.
pub(crate) type Weigher<K, V> = Arc<dyn Fn(&K, &V) -> u64 + Send + Sync>;

/// A fetch that any number of callers can await.
pub(crate) type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// The origin fetches currently running, keyed by the key being fetched.
///
/// The first caller to miss on a key becomes its leader and starts the fetch;
/// later callers await the same result instead of fetching again.
pub(crate) struct InFlight<K, V, E> {
  pending: Mutex<HashMap<K, SharedFetch<V, E>>>,
}

/// The outcome of registering interest in a key's fetch.
pub(crate) enum Claim<'a, K: Eq + Hash, V, E> {
  /// This caller started the fetch and owns its registration.
  Leader {
    fetch: SharedFetch<V, E>,
    guard: LeaderGuard<'a, K, V, E>,
  },
  /// Another caller's fetch was already running.
  Follower(SharedFetch<V, E>),
}

impl<K, V, E> InFlight<K, V, E>
where
  K: Eq + Hash + Clone,
  V: Clone,
  E: Clone,
{
  pub(crate) fn new() -> Self {
    Self {
      pending: Mutex::new(HashMap::new()),
    }
  }

  /// Joins the running fetch for `key`, or starts one with `start`.
  pub(crate) fn claim(
    &self,
    key: &K,
    start: impl FnOnce() -> BoxFuture<'static, Result<V, E>>,
  ) -> Claim<'_, K, V, E> {
    let mut pending = self.pending.lock();
    if let Some(fetch) = pending.get(key) {
      return Claim::Follower(fetch.clone());
    }

    let fetch = start().shared();
    pending.insert(key.clone(), fetch.clone());
    Claim::Leader {
      fetch,
      guard: LeaderGuard {
        in_flight: self,
        key: key.clone(),
      },
    }
  }

  pub(crate) fn contains(&self, key: &K) -> bool {
    self.pending.lock().contains_key(key)
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.pending.lock().len()
  }
}

/// Unregisters the leader's fetch when dropped, including when the leader's
/// `get` is cancelled mid-fetch.
pub(crate) struct LeaderGuard<'a, K: Eq + Hash, V, E> {
  in_flight: &'a InFlight<K, V, E>,
  key: K,
}

impl<K: Eq + Hash, V, E> Drop for LeaderGuard<'_, K, V, E> {
  fn drop(&mut self) {
    self.in_flight.pending.lock().remove(&self.key);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures_util::future;

  #[tokio::test]
  async fn test_second_claim_follows_first() {
    let in_flight = InFlight::<u32, u32, ()>::new();

    let leader = in_flight.claim(&1, || future::ready(Ok(10)).boxed());
    let follower = in_flight.claim(&1, || unreachable!("fetch already running"));
    assert!(in_flight.contains(&1));

    let Claim::Leader { fetch, guard } = leader else {
      panic!("first claim should lead");
    };
    let Claim::Follower(shared) = follower else {
      panic!("second claim should follow");
    };
    assert_eq!(fetch.await, Ok(10));
    assert_eq!(shared.await, Ok(10));

    drop(guard);
    assert_eq!(in_flight.len(), 0);
  }

  #[tokio::test]
  async fn test_dropped_leader_unregisters() {
    let in_flight = InFlight::<u32, u32, ()>::new();
    {
      let _claim = in_flight.claim(&7, || future::pending().boxed());
      assert!(in_flight.contains(&7));
    }
    assert!(!in_flight.contains(&7));
    assert!(matches!(
      in_flight.claim(&7, || future::ready(Err(())).boxed()),
      Claim::Leader { .. }
    ));
  }
}
