mod common;

use std::sync::Arc;

use common::{value_for, FetchError, Origin};
use futures_util::future::BoxFuture;
use tiered_cache::{BuildError, CacheConfig, TaskSpawner, Tier, TieredCache, TieredCacheBuilder};

fn from_config(origin: &Arc<Origin>, config: CacheConfig) -> TieredCacheBuilder<u32, String, FetchError> {
  let origin = Arc::clone(origin);
  TieredCacheBuilder::from_config(config).fetcher(move |key| {
    let origin = Arc::clone(&origin);
    async move { origin.fetch(key).await }
  })
}

#[tokio::test]
async fn test_builds_from_json_config() {
  let config: CacheConfig = serde_json::from_str(
    r#"{
      "l1_max_size": 2,
      "l2_max_size": 5,
      "k": 2,
      "ttl_ms": 60000,
      "predictive_warming": false
    }"#,
  )
  .unwrap();

  let origin = Origin::new();
  let cache = from_config(&origin, config).build().unwrap();

  for key in 1..=6 {
    assert_eq!(cache.get(key).await, Ok(value_for(key)));
  }
  let stats = cache.stats();
  assert_eq!(stats.admission.max_size, 2);
  assert_eq!(stats.admission.size, 2);
  assert_eq!(stats.adaptive.max_size, 5);
  assert_eq!(stats.adaptive.t1_size, 5);
  assert_eq!(stats.adaptive.b1_size, 1);
}

#[test]
fn test_invalid_config_is_rejected() {
  let origin = Origin::new();
  let config = CacheConfig {
    l2_max_size: 0,
    ..CacheConfig::default()
  };
  assert_eq!(
    from_config(&origin, config).build().unwrap_err(),
    BuildError::ZeroCapacity {
      tier: Tier::Adaptive
    }
  );

  let config = CacheConfig {
    min_confidence: -0.1,
    ..CacheConfig::default()
  };
  assert!(matches!(
    from_config(&origin, config).build(),
    Err(BuildError::InvalidConfidence(_))
  ));
}

#[test]
fn test_missing_fetcher_is_rejected() {
  let result = TieredCache::<u32, String, FetchError>::builder()
    .predictive_warming(false)
    .build();
  assert_eq!(result.unwrap_err(), BuildError::FetcherRequired);
}

/// Runs warming tasks to completion on a runtime of its own.
struct DedicatedRuntime(tokio::runtime::Runtime);

impl TaskSpawner for DedicatedRuntime {
  fn spawn(&self, future: BoxFuture<'static, ()>) {
    self.0.spawn(future);
  }
}

#[test]
fn test_custom_spawner_allows_build_outside_runtime() {
  let runtime = tokio::runtime::Builder::new_multi_thread()
    .worker_threads(1)
    .enable_time()
    .build()
    .unwrap();
  let origin = Origin::new();

  let cache = common::builder(&origin)
    .predictive_warming(true)
    .spawner(Arc::new(DedicatedRuntime(runtime)))
    .build();
  assert!(cache.is_ok());
}

#[tokio::test]
async fn test_stats_serialize_to_json() {
  let origin = Origin::new();
  let cache = common::build_test_cache(&origin, 2, 5);
  cache.get(1).await.unwrap();
  cache.get(1).await.unwrap();
  let _ = cache.get(common::MISSING_FROM).await;

  let json = serde_json::to_value(cache.stats()).unwrap();

  assert_eq!(json["admission"]["hits"], 1);
  assert_eq!(json["admission"]["misses"], 2);
  assert_eq!(json["adaptive"]["t1_size"], 1);
  assert_eq!(json["working_set"]["current_size"], 2);
  assert_eq!(json["recommendation"]["optimal_l1_size"], 1);
  assert_eq!(json["recommendation"]["optimal_l2_size"], 2);
  assert_eq!(json["origin"]["fetch_failures"], 1);
  assert!(json["predictive"]["accuracy_pct"].is_number());
}
