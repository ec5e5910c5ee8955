use crate::time;

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use tokio::time::Instant;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Percentage of `part` in `whole`, or `0.0` for an empty whole.
#[inline]
pub(crate) fn percent(part: u64, whole: u64) -> f64 {
  if whole == 0 {
    0.0
  } else {
    part as f64 / whole as f64 * 100.0
  }
}

/// Lock-free counters for traffic between the cache and its origin.
///
/// Tier counters live inside each tier behind its own lock; these are the
/// only counters touched outside of any lock.
#[derive(Debug)]
pub(crate) struct Metrics {
  pub(crate) fetches: CachePadded<AtomicU64>,
  pub(crate) fetch_failures: CachePadded<AtomicU64>,
  pub(crate) coalesced_fetches: CachePadded<AtomicU64>,
  pub(crate) warm_fetches: CachePadded<AtomicU64>,
  pub(crate) warm_failures: CachePadded<AtomicU64>,
  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      fetches: CachePadded::new(AtomicU64::new(0)),
      fetch_failures: CachePadded::new(AtomicU64::new(0)),
      coalesced_fetches: CachePadded::new(AtomicU64::new(0)),
      warm_fetches: CachePadded::new(AtomicU64::new(0)),
      warm_failures: CachePadded::new(AtomicU64::new(0)),
      created_at: time::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self) -> OriginStats {
    OriginStats {
      fetches: self.fetches.load(Ordering::Relaxed),
      fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
      coalesced_fetches: self.coalesced_fetches.load(Ordering::Relaxed),
      warm_fetches: self.warm_fetches.load(Ordering::Relaxed),
      warm_failures: self.warm_failures.load(Ordering::Relaxed),
      uptime_secs: time::now().saturating_duration_since(self.created_at).as_secs(),
    }
  }
}

/// Statistics for the LRU-K admission tier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AdmissionStats {
  /// Number of resident entries.
  pub size: usize,
  /// Sum of resident entry sizes.
  pub occupied_size: u64,
  pub max_size: u64,
  pub utilization_pct: f64,
  pub hits: u64,
  pub misses: u64,
  pub hit_rate_pct: f64,
  /// Entries removed to make room.
  pub evictions: u64,
  /// Entries dropped on read because their TTL had passed.
  pub expirations: u64,
}

/// Statistics for the ARC adaptive tier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AdaptiveStats {
  pub t1_size: usize,
  pub t2_size: usize,
  pub b1_size: usize,
  pub b2_size: usize,
  /// Current target size of T1.
  pub target_p: f64,
  pub occupied_size: u64,
  pub max_size: u64,
  pub utilization_pct: f64,
  pub hits: u64,
  pub misses: u64,
  pub hit_rate_pct: f64,
  /// Number of ghost hits that moved `target_p`.
  pub adaptations: u64,
  /// `target_p / max_size`, in `[0, 1]`.
  pub recency_bias: f64,
  pub evictions: u64,
}

/// Statistics from the working set analyzer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct WorkingSetStats {
  pub current_size: usize,
  pub average_size: f64,
  pub max_size: usize,
  pub recommended_cache_size: usize,
  pub sample_count: usize,
}

/// Statistics from the predictive warmer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PredictiveStats {
  /// Distinct `from -> to` transitions observed so far.
  pub patterns_learned: usize,
  pub total_predictions: u64,
  pub correct_predictions: u64,
  pub accuracy_pct: f64,
  /// Accesses still inside the learning window.
  pub recent_access_count: usize,
}

/// Tier sizes derived from the working set recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SizeRecommendation {
  pub optimal_l1_size: usize,
  pub optimal_l2_size: usize,
}

impl SizeRecommendation {
  /// The admission tier gets a fifth of the working set (rounded up), the
  /// adaptive tier all of it.
  pub fn from_working_set(recommended: usize) -> Self {
    Self {
      optimal_l1_size: recommended.div_ceil(5),
      optimal_l2_size: recommended,
    }
  }
}

/// Traffic between the cache and its origin fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct OriginStats {
  /// Fetches issued on behalf of `get` callers.
  pub fetches: u64,
  pub fetch_failures: u64,
  /// Misses that awaited another caller's in-flight fetch.
  pub coalesced_fetches: u64,
  /// Fetches issued by predictive warming.
  pub warm_fetches: u64,
  pub warm_failures: u64,
  pub uptime_secs: u64,
}

/// A read-only, point-in-time view of the whole cache.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TieredCacheStats {
  pub admission: AdmissionStats,
  pub adaptive: AdaptiveStats,
  pub working_set: WorkingSetStats,
  pub predictive: PredictiveStats,
  pub recommendation: SizeRecommendation,
  pub origin: OriginStats,
}
