use crate::config::CacheConfig;
use crate::error::{BuildError, Tier};
use crate::handles::TieredCache;
use crate::loader::{FetchFn, InFlight, Weigher};
use crate::metrics::Metrics;
use crate::policy::{ArcCache, LruKCache};
use crate::predictor::PredictiveWarmer;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::shared::CacheShared;
use crate::working_set::WorkingSetAnalyzer;

use core::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::FutureExt;
use parking_lot::Mutex;

/// A builder for [`TieredCache`] instances.
pub struct TieredCacheBuilder<K, V, E> {
  config: CacheConfig,
  fetcher: Option<FetchFn<K, V, E>>,
  weigher: Option<Weigher<K, V>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
}

impl<K, V, E> fmt::Debug for TieredCacheBuilder<K, V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TieredCacheBuilder")
      .field("config", &self.config)
      .field("has_fetcher", &self.fetcher.is_some())
      .field("has_weigher", &self.weigher.is_some())
      .field("has_spawner", &self.spawner.is_some())
      .finish()
  }
}

impl<K, V, E> Default for TieredCacheBuilder<K, V, E> {
  fn default() -> Self {
    Self::new()
  }
}

// --- General Configuration Methods ---
impl<K, V, E> TieredCacheBuilder<K, V, E> {
  /// Creates a builder with [`CacheConfig::default`] settings.
  pub fn new() -> Self {
    Self::from_config(CacheConfig::default())
  }

  /// Creates a builder starting from an existing configuration.
  pub fn from_config(config: CacheConfig) -> Self {
    Self {
      config,
      fetcher: None,
      weigher: None,
      spawner: None,
    }
  }

  /// Sets the capacity of the LRU-K admission tier.
  pub fn l1_capacity(mut self, capacity: u64) -> Self {
    self.config.l1_max_size = capacity;
    self
  }

  /// Sets the capacity of the ARC adaptive tier.
  pub fn l2_capacity(mut self, capacity: u64) -> Self {
    self.config.l2_max_size = capacity;
    self
  }

  /// Sets how many accesses the admission tier remembers per key.
  pub fn k(mut self, k: usize) -> Self {
    self.config.k = k;
    self
  }

  /// Sets the time-to-live of admission tier entries.
  ///
  /// The adaptive tier has no TTL.
  pub fn time_to_live(mut self, ttl: Duration) -> Self {
    self.config.ttl_ms = ttl.as_millis() as u64;
    self
  }

  /// Sets the trailing window used to measure the working set.
  pub fn working_set_window(mut self, window: Duration) -> Self {
    self.config.working_set_window_ms = window.as_millis() as u64;
    self
  }

  /// Sets the minimum confidence a predicted key needs to be warmed.
  pub fn min_confidence(mut self, min_confidence: f64) -> Self {
    self.config.min_confidence = min_confidence;
    self
  }

  /// Caps the number of keys warmed after a single hit.
  pub fn max_predictions(mut self, max_predictions: usize) -> Self {
    self.config.max_predictions = max_predictions;
    self
  }

  /// Sets how long raw accesses are kept for learning transitions.
  pub fn learning_window(mut self, window: Duration) -> Self {
    self.config.learning_window_ms = window.as_millis() as u64;
    self
  }

  /// Sets the maximum gap between two accesses learned as a transition.
  pub fn transition_lag(mut self, lag: Duration) -> Self {
    self.config.transition_lag_ms = lag.as_millis() as u64;
    self
  }

  /// Enables or disables sharing one origin fetch between concurrent misses
  /// on the same key. Enabled by default.
  pub fn coalesce_fetches(mut self, enabled: bool) -> Self {
    self.config.coalesce_fetches = enabled;
    self
  }

  /// Enables or disables prefetching of predicted keys. Enabled by default.
  pub fn predictive_warming(mut self, enabled: bool) -> Self {
    self.config.predictive_warming = enabled;
    self
  }

  /// Sets the function computing an entry's size. Every entry has size 1
  /// otherwise.
  pub fn weigher(mut self, weigher: impl Fn(&K, &V) -> u64 + Send + Sync + 'static) -> Self {
    self.weigher = Some(Arc::new(weigher));
    self
  }

  /// Sets the spawner used for predictive warming tasks.
  ///
  /// Defaults to the Tokio runtime the cache is built in.
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Sets the asynchronous origin fetcher, called on a miss in both tiers.
  ///
  /// Its errors are returned unchanged to the caller of
  /// [`TieredCache::get`].
  pub fn fetcher<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    self.fetcher = Some(Arc::new(move |key| f(key).boxed()));
    self
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  /// Checks the configuration for values the cache cannot run with.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    let config = &self.config;
    if config.l1_max_size == 0 {
      return Err(BuildError::ZeroCapacity {
        tier: Tier::Admission,
      });
    }
    if config.l2_max_size == 0 {
      return Err(BuildError::ZeroCapacity {
        tier: Tier::Adaptive,
      });
    }
    if config.k == 0 {
      return Err(BuildError::ZeroK);
    }
    if !(0.0..=1.0).contains(&config.min_confidence) {
      return Err(BuildError::InvalidConfidence(config.min_confidence));
    }
    if config.predictive_warming && config.max_predictions == 0 {
      return Err(BuildError::ZeroPredictions);
    }
    if self.fetcher.is_none() {
      return Err(BuildError::FetcherRequired);
    }
    Ok(())
  }
}

impl<K, V, E> TieredCacheBuilder<K, V, E>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
  E: Clone + fmt::Debug + Send + Sync + 'static,
{
  /// Builds the cache.
  ///
  /// With predictive warming enabled and no explicit spawner, this must run
  /// inside a Tokio runtime.
  pub fn build(self) -> Result<TieredCache<K, V, E>, BuildError> {
    self.validate()?;

    let Self {
      config,
      fetcher,
      weigher,
      spawner,
    } = self;
    let fetcher = fetcher.ok_or(BuildError::FetcherRequired)?;

    let spawner = if config.predictive_warming {
      let spawner = spawner.or_else(|| {
        TokioSpawner::try_current().map(|spawner| Arc::new(spawner) as Arc<dyn TaskSpawner>)
      });
      Some(spawner.ok_or(BuildError::SpawnerRequired)?)
    } else {
      None
    };

    let shared = CacheShared {
      admission: Mutex::new(LruKCache::new(config.l1_max_size, config.k, config.ttl())),
      adaptive: Mutex::new(ArcCache::new(config.l2_max_size)),
      working_set: Mutex::new(WorkingSetAnalyzer::new(config.working_set_window())),
      predictor: Mutex::new(PredictiveWarmer::new(config.predictor())),
      fetcher,
      weigher: weigher.unwrap_or_else(|| Arc::new(|_: &K, _: &V| 1)),
      in_flight: config.coalesce_fetches.then(InFlight::new),
      spawner,
      metrics: Metrics::new(),
    };

    Ok(TieredCache {
      shared: Arc::new(shared),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures_util::future;

  fn builder() -> TieredCacheBuilder<u32, u32, ()> {
    TieredCacheBuilder::new()
      .predictive_warming(false)
      .fetcher(|key| future::ready(Ok(key)))
  }

  #[test]
  fn test_rejects_zero_capacities() {
    assert_eq!(
      builder().l1_capacity(0).build().unwrap_err(),
      BuildError::ZeroCapacity {
        tier: Tier::Admission
      }
    );
    assert_eq!(
      builder().l2_capacity(0).build().unwrap_err(),
      BuildError::ZeroCapacity {
        tier: Tier::Adaptive
      }
    );
  }

  #[test]
  fn test_rejects_bad_prediction_settings() {
    assert_eq!(builder().k(0).build().unwrap_err(), BuildError::ZeroK);
    assert_eq!(
      builder().min_confidence(1.5).build().unwrap_err(),
      BuildError::InvalidConfidence(1.5)
    );
    assert_eq!(
      builder()
        .predictive_warming(true)
        .max_predictions(0)
        .build()
        .unwrap_err(),
      BuildError::ZeroPredictions
    );
  }

  #[test]
  fn test_requires_fetcher() {
    let err = TieredCacheBuilder::<u32, u32, ()>::new()
      .predictive_warming(false)
      .build()
      .unwrap_err();
    assert_eq!(err, BuildError::FetcherRequired);
    assert_eq!(err.to_string(), "a fetcher is required to build the cache");
  }

  #[test]
  fn test_warming_outside_runtime_requires_spawner() {
    let err = builder().predictive_warming(true).build().unwrap_err();
    assert_eq!(err, BuildError::SpawnerRequired);
  }

  #[tokio::test]
  async fn test_warming_picks_up_current_runtime() {
    assert!(builder().predictive_warming(true).build().is_ok());
  }

  #[test]
  fn test_builder_methods_fill_config() {
    let builder = builder()
      .l1_capacity(2)
      .l2_capacity(5)
      .time_to_live(Duration::from_secs(60))
      .transition_lag(Duration::from_secs(4));
    let config = builder.config();
    assert_eq!(config.l1_max_size, 2);
    assert_eq!(config.l2_max_size, 5);
    assert_eq!(config.ttl_ms, 60_000);
    assert_eq!(config.transition_lag_ms, 4_000);
  }
}
