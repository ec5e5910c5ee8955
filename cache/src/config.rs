use crate::predictor::PredictorConfig;

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Plain-data configuration for a [`TieredCache`](crate::TieredCache).
///
/// Durations are whole milliseconds so the struct reads naturally from JSON
/// or YAML. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CacheConfig {
  /// Capacity of the LRU-K admission tier, in size units.
  pub l1_max_size: u64,
  /// Capacity of the ARC adaptive tier, in size units.
  pub l2_max_size: u64,
  /// Number of accesses the admission tier remembers per key.
  pub k: usize,
  /// Time-to-live of admission tier entries.
  pub ttl_ms: u64,
  /// Trailing window of the working set analyzer.
  pub working_set_window_ms: u64,
  pub min_confidence: f64,
  pub max_predictions: usize,
  pub learning_window_ms: u64,
  pub transition_lag_ms: u64,
  /// Share one origin fetch between concurrent misses on the same key.
  pub coalesce_fetches: bool,
  /// Prefetch predicted keys after a tier hit.
  pub predictive_warming: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let predictor = PredictorConfig::default();
    Self {
      l1_max_size: 100,
      l2_max_size: 1000,
      k: 2,
      ttl_ms: 60_000,
      working_set_window_ms: 60_000,
      min_confidence: predictor.min_confidence,
      max_predictions: predictor.max_predictions,
      learning_window_ms: predictor.learning_window.as_millis() as u64,
      transition_lag_ms: predictor.transition_lag.as_millis() as u64,
      coalesce_fetches: true,
      predictive_warming: true,
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_millis(self.ttl_ms)
  }

  pub fn working_set_window(&self) -> Duration {
    Duration::from_millis(self.working_set_window_ms)
  }

  pub fn predictor(&self) -> PredictorConfig {
    PredictorConfig {
      learning_window: Duration::from_millis(self.learning_window_ms),
      transition_lag: Duration::from_millis(self.transition_lag_ms),
      min_confidence: self.min_confidence,
      max_predictions: self.max_predictions,
    }
  }
}
