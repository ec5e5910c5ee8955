use crate::builder::TieredCacheBuilder;
use crate::metrics::TieredCacheStats;
use crate::predictor::TransitionPattern;
use crate::shared::CacheShared;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A two-tier, read-through cache in front of an asynchronous origin.
///
/// Reads check the LRU-K admission tier, then the ARC adaptive tier, and
/// only then call the origin fetcher. Cloning the handle is cheap; all clones
/// share the same cache.
pub struct TieredCache<K, V, E> {
  pub(crate) shared: Arc<CacheShared<K, V, E>>,
}

impl<K, V, E> Clone for TieredCache<K, V, E> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K, V, E> fmt::Debug for TieredCache<K, V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TieredCache")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<K, V, E> TieredCache<K, V, E> {
  /// Returns a builder with default settings.
  pub fn builder() -> TieredCacheBuilder<K, V, E> {
    TieredCacheBuilder::new()
  }
}

impl<K, V, E> TieredCache<K, V, E>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
  E: Clone + fmt::Debug + Send + Sync + 'static,
{
  /// Returns the value for `key`, fetching it from the origin on a miss in
  /// both tiers.
  ///
  /// A fetched value is inserted into both tiers. A fetch error is returned
  /// as-is and nothing is cached. A hit may start background warming of the
  /// keys that usually follow `key`.
  pub async fn get(&self, key: K) -> Result<V, E> {
    self.shared.get(key).await
  }

  /// Checks whether either tier holds `key`, without counting an access.
  pub fn contains(&self, key: &K) -> bool {
    self.shared.contains(key)
  }

  /// Removes `key` from both tiers. Returns `true` if either tier held it.
  pub fn invalidate(&self, key: &K) -> bool {
    self.shared.invalidate(key)
  }

  /// Returns the `limit` most observed access transitions.
  pub fn top_patterns(&self, limit: usize) -> Vec<TransitionPattern<K>> {
    self.shared.top_patterns(limit)
  }

  /// Returns a point-in-time snapshot of every component's statistics.
  ///
  /// Also takes a working set sample.
  pub fn stats(&self) -> TieredCacheStats {
    self.shared.stats()
  }

  /// Empties both tiers and resets the analyzer and the warmer.
  pub fn clear(&self) {
    self.shared.clear();
  }
}
