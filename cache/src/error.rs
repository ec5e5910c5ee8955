use std::fmt;

use thiserror::Error;

/// Identifies one of the two cache tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
  /// The LRU-K first level.
  Admission,
  /// The ARC second level.
  Adaptive,
}

impl fmt::Display for Tier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Tier::Admission => write!(f, "admission"),
      Tier::Adaptive => write!(f, "adaptive"),
    }
  }
}

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
  /// A tier was configured with a capacity of zero.
  #[error("{tier} tier capacity cannot be zero")]
  ZeroCapacity { tier: Tier },
  /// The admission tier must remember at least one access per key.
  #[error("k must be at least 1")]
  ZeroK,
  /// The prediction threshold is a share and must lie in `[0, 1]`.
  #[error("min_confidence must be within [0, 1], got {0}")]
  InvalidConfidence(f64),
  /// Predictive warming is enabled but may never predict anything.
  #[error("max_predictions cannot be zero while predictive warming is enabled")]
  ZeroPredictions,
  /// No origin fetcher was supplied.
  #[error("a fetcher is required to build the cache")]
  FetcherRequired,
  /// Predictive warming is enabled, but no `TaskSpawner` was configured and
  /// the builder was not called from within a Tokio runtime.
  #[error("predictive warming requires a task spawner or a running Tokio runtime")]
  SpawnerRequired,
}
