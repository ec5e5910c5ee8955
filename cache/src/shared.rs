use crate::loader::{Claim, FetchFn, InFlight, Weigher};
use crate::metrics::{Metrics, SizeRecommendation, TieredCacheStats};
use crate::policy::{ArcCache, LruKCache};
use crate::predictor::{Prediction, PredictiveWarmer, TransitionPattern};
use crate::runtime::TaskSpawner;
use crate::working_set::WorkingSetAnalyzer;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use futures_util::future::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// State shared by every handle to one cache.
///
/// Each component sits behind its own lock. No method holds two of these
/// locks at once, and none is held across an `.await`.
pub(crate) struct CacheShared<K, V, E> {
  pub(crate) admission: Mutex<LruKCache<K, V>>,
  pub(crate) adaptive: Mutex<ArcCache<K, V>>,
  pub(crate) working_set: Mutex<WorkingSetAnalyzer<K>>,
  pub(crate) predictor: Mutex<PredictiveWarmer<K>>,
  pub(crate) fetcher: FetchFn<K, V, E>,
  pub(crate) weigher: Weigher<K, V>,
  /// `None` when fetch coalescing is disabled.
  pub(crate) in_flight: Option<InFlight<K, V, E>>,
  /// `None` when predictive warming is disabled.
  pub(crate) spawner: Option<Arc<dyn TaskSpawner>>,
  pub(crate) metrics: Metrics,
}

impl<K, V, E> CacheShared<K, V, E>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
  E: Clone + fmt::Debug + Send + Sync + 'static,
{
  pub(crate) async fn get(self: &Arc<Self>, key: K) -> Result<V, E> {
    self.observe(&key);

    let hit = self.admission.lock().get(&key);
    if let Some(value) = hit {
      trace!("admission tier hit");
      self.schedule_warm(&key);
      return Ok(value);
    }

    let hit = self.adaptive.lock().get(&key);
    if let Some(value) = hit {
      trace!("adaptive tier hit, promoting to admission tier");
      let size = (self.weigher)(&key, &value);
      self.admission.lock().set(key.clone(), value.clone(), size);
      self.schedule_warm(&key);
      return Ok(value);
    }

    trace!("miss in both tiers, fetching from origin");
    self.load(key).await
  }

  /// Feeds an access to the analyzer and the warmer.
  fn observe(&self, key: &K) {
    self.working_set.lock().record_access(key.clone());
    self.predictor.lock().learn(key.clone());
  }

  async fn load(self: &Arc<Self>, key: K) -> Result<V, E> {
    let Some(in_flight) = &self.in_flight else {
      Metrics::incr(&self.metrics.fetches);
      let result = (self.fetcher)(key.clone()).await;
      self.settle(key, &result);
      return result;
    };

    // The shared fetch settles its own result: the tiers are filled before
    // the leader unregisters, and still filled if the leader is dropped and
    // a follower drives the fetch to completion.
    let start = || {
      let shared = Arc::clone(self);
      let key = key.clone();
      async move {
        let result = (shared.fetcher)(key.clone()).await;
        shared.settle(key, &result);
        result
      }
      .boxed()
    };

    match in_flight.claim(&key, start) {
      Claim::Leader { fetch, guard } => {
        Metrics::incr(&self.metrics.fetches);
        let result = fetch.await;
        drop(guard);
        result
      }
      Claim::Follower(fetch) => {
        Metrics::incr(&self.metrics.coalesced_fetches);
        trace!("joined in-flight fetch");
        fetch.await
      }
    }
  }

  /// Applies the outcome of an origin fetch made for a `get`.
  fn settle(&self, key: K, result: &Result<V, E>) {
    match result {
      Ok(value) => self.populate(key, value.clone()),
      Err(err) => {
        Metrics::incr(&self.metrics.fetch_failures);
        debug!(?err, "origin fetch failed, nothing cached");
      }
    }
  }

  /// Inserts a fetched value into both tiers.
  fn populate(&self, key: K, value: V) {
    let size = (self.weigher)(&key, &value);
    self.admission.lock().set(key.clone(), value.clone(), size);
    self.adaptive.lock().set(key, value, size);
  }

  /// Spawns a task warming the keys predicted to follow `key`.
  fn schedule_warm(self: &Arc<Self>, key: &K) {
    let Some(spawner) = &self.spawner else {
      return;
    };
    let predictions = self.predictor.lock().predict(key);
    if predictions.is_empty() {
      return;
    }

    let shared = Arc::clone(self);
    spawner.spawn(async move { shared.warm(predictions).await }.boxed());
  }

  /// Loads predicted keys into the adaptive tier.
  ///
  /// A prediction counts as correct when its key is already resident or was
  /// fetched successfully. Failures are only counted.
  async fn warm(&self, predictions: Vec<Prediction<K>>) {
    for Prediction { key, confidence } in predictions {
      if self.is_resident(&key) {
        self.predictor.lock().record_correct_prediction();
        continue;
      }
      if self.in_flight.as_ref().is_some_and(|in_flight| in_flight.contains(&key)) {
        continue;
      }

      Metrics::incr(&self.metrics.warm_fetches);
      match (self.fetcher)(key.clone()).await {
        Ok(value) => {
          let size = (self.weigher)(&key, &value);
          self.adaptive.lock().set(key, value, size);
          self.predictor.lock().record_correct_prediction();
          trace!(confidence, "warmed predicted key");
        }
        Err(err) => {
          Metrics::incr(&self.metrics.warm_failures);
          debug!(?err, confidence, "predictive warm fetch failed");
        }
      }
    }
  }

  fn is_resident(&self, key: &K) -> bool {
    let in_admission = self.admission.lock().contains(key);
    if in_admission {
      return true;
    }
    self.adaptive.lock().contains(key)
  }

  pub(crate) fn contains(&self, key: &K) -> bool {
    self.is_resident(key)
  }

  /// Removes `key` from both tiers. Returns whether either held it.
  pub(crate) fn invalidate(&self, key: &K) -> bool {
    let from_admission = self.admission.lock().remove(key).is_some();
    let from_adaptive = self.adaptive.lock().remove(key).is_some();
    from_admission || from_adaptive
  }

  pub(crate) fn top_patterns(&self, limit: usize) -> Vec<TransitionPattern<K>> {
    self.predictor.lock().top_patterns(limit)
  }

  pub(crate) fn stats(&self) -> TieredCacheStats {
    let admission = self.admission.lock().stats();
    let adaptive = self.adaptive.lock().stats();
    let working_set = self.working_set.lock().stats();
    let predictive = self.predictor.lock().stats();
    let recommendation = SizeRecommendation::from_working_set(working_set.recommended_cache_size);

    TieredCacheStats {
      admission,
      adaptive,
      working_set,
      predictive,
      recommendation,
      origin: self.metrics.snapshot(),
    }
  }

  /// Resets all four components. Origin counters are kept.
  pub(crate) fn clear(&self) {
    self.admission.lock().clear();
    self.adaptive.lock().clear();
    self.working_set.lock().clear();
    self.predictor.lock().clear();
  }
}

impl<K, V, E> fmt::Debug for CacheShared<K, V, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("coalesce_fetches", &self.in_flight.is_some())
      .field("predictive_warming", &self.spawner.is_some())
      .field("metrics", &self.metrics)
      .finish_non_exhaustive()
  }
}
