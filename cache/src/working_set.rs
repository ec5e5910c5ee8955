//! Working set sizing after Denning: the working set is the set of distinct
//! keys touched within a trailing time window.

use crate::metrics::WorkingSetStats;
use crate::time;

use std::collections::VecDeque;
use std::hash::Hash;
use std::time::Duration;

use ahash::{HashMap, HashMapExt};
use tokio::time::Instant;

/// Recommendation returned before any sample has been taken.
pub const DEFAULT_RECOMMENDED_SIZE: usize = 1000;

/// Number of working set size samples kept for percentile computation.
pub const MAX_SAMPLES: usize = 100;

const RECOMMENDATION_PERCENTILE: f64 = 0.95;

/// Observes accesses and recommends a cache size covering the 95th
/// percentile of recently observed working set sizes.
///
/// The analyzer only watches; it never evicts or rejects anything.
#[derive(Debug)]
pub struct WorkingSetAnalyzer<K> {
  window: Duration,
  accesses: VecDeque<(K, Instant)>,
  // Number of in-window accesses per key; its length is the working set size.
  in_window: HashMap<K, usize>,
  samples: VecDeque<usize>,
}

impl<K: Eq + Hash + Clone> WorkingSetAnalyzer<K> {
  pub fn new(window: Duration) -> Self {
    Self {
      window,
      accesses: VecDeque::new(),
      in_window: HashMap::new(),
      samples: VecDeque::with_capacity(MAX_SAMPLES),
    }
  }

  /// Records an access to `key` at the current time.
  pub fn record_access(&mut self, key: K) {
    let now = time::now();
    self.prune(now);
    *self.in_window.entry(key.clone()).or_insert(0) += 1;
    self.accesses.push_back((key, now));
  }

  fn prune(&mut self, now: Instant) {
    while let Some((_, at)) = self.accesses.front() {
      if !time::is_older_than(now, *at, self.window) {
        break;
      }
      let Some((key, _)) = self.accesses.pop_front() else {
        break;
      };
      if let Some(count) = self.in_window.get_mut(&key) {
        *count -= 1;
        if *count == 0 {
          self.in_window.remove(&key);
        }
      }
    }
  }

  /// Returns the number of distinct keys accessed within the window and
  /// records it as a sample.
  pub fn calculate_working_set_size(&mut self) -> usize {
    self.prune(time::now());
    let size = self.in_window.len();
    if self.samples.len() == MAX_SAMPLES {
      self.samples.pop_front();
    }
    self.samples.push_back(size);
    size
  }

  /// The 95th percentile of recorded samples, or
  /// [`DEFAULT_RECOMMENDED_SIZE`] before the first sample.
  pub fn recommended_cache_size(&self) -> usize {
    if self.samples.is_empty() {
      return DEFAULT_RECOMMENDED_SIZE;
    }
    let mut sorted: Vec<usize> = self.samples.iter().copied().collect();
    sorted.sort_unstable();
    let index = (sorted.len() as f64 * RECOMMENDATION_PERCENTILE).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
  }

  pub fn sample_count(&self) -> usize {
    self.samples.len()
  }

  pub fn window(&self) -> Duration {
    self.window
  }

  pub fn clear(&mut self) {
    self.accesses.clear();
    self.in_window.clear();
    self.samples.clear();
  }

  /// Takes a fresh sample and summarizes the sample history.
  pub fn stats(&mut self) -> WorkingSetStats {
    let current_size = self.calculate_working_set_size();
    let total: usize = self.samples.iter().sum();
    WorkingSetStats {
      current_size,
      average_size: total as f64 / self.samples.len() as f64,
      max_size: self.samples.iter().copied().max().unwrap_or(0),
      recommended_cache_size: self.recommended_cache_size(),
      sample_count: self.samples.len(),
    }
  }
}
