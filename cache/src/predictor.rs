//! Sequential access prediction.
//!
//! Every access is compared with the most recent earlier access to a
//! different key; if the two lie within the transition lag they count as one
//! observation of `previous -> current`. Predictions for a key are its
//! observed successors, weighted by their share of its outgoing transitions.

use crate::metrics::{percent, PredictiveStats};
use crate::time;

use std::collections::VecDeque;
use std::hash::Hash;
use std::time::Duration;

use ahash::{HashMap, HashMapExt};
use tokio::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`PredictiveWarmer`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredictorConfig {
  /// How long raw accesses are kept for learning.
  pub learning_window: Duration,
  /// Maximum gap between two accesses for them to count as a transition.
  pub transition_lag: Duration,
  /// Minimum share of outgoing transitions a successor needs to be predicted.
  pub min_confidence: f64,
  /// Maximum number of keys returned by one prediction.
  pub max_predictions: usize,
}

impl Default for PredictorConfig {
  fn default() -> Self {
    Self {
      learning_window: Duration::from_secs(300),
      transition_lag: Duration::from_secs(10),
      min_confidence: 0.3,
      max_predictions: 3,
    }
  }
}

/// A key expected to be accessed next.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction<K> {
  pub key: K,
  /// Share of the source key's outgoing transitions leading to `key`.
  pub confidence: f64,
}

/// One learned `from -> to` transition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TransitionPattern<K> {
  pub from: K,
  pub to: K,
  pub count: u64,
  pub confidence: f64,
}

#[derive(Debug)]
struct Successors<K> {
  total: u64,
  // Kept in first-seen order so equal confidences rank deterministically.
  targets: Vec<(K, u64)>,
}

impl<K: Eq> Successors<K> {
  fn new() -> Self {
    Self {
      total: 0,
      targets: Vec::new(),
    }
  }

  fn observe(&mut self, to: K) {
    self.total += 1;
    match self.targets.iter_mut().find(|(target, _)| *target == to) {
      Some((_, count)) => *count += 1,
      None => self.targets.push((to, 1)),
    }
  }

  fn confidence(&self, count: u64) -> f64 {
    count as f64 / self.total as f64
  }
}

/// Learns pairwise access transitions and predicts likely next keys.
///
/// Transition counts only grow; nothing is decayed or forgotten except the
/// raw access log, which is trimmed to the learning window.
#[derive(Debug)]
pub struct PredictiveWarmer<K> {
  config: PredictorConfig,
  sequence: VecDeque<(K, Instant)>,
  patterns: HashMap<K, Successors<K>>,
  patterns_learned: usize,
  total_predictions: u64,
  correct_predictions: u64,
}

impl<K: Eq + Hash + Clone> PredictiveWarmer<K> {
  pub fn new(config: PredictorConfig) -> Self {
    Self {
      config,
      sequence: VecDeque::new(),
      patterns: HashMap::new(),
      patterns_learned: 0,
      total_predictions: 0,
      correct_predictions: 0,
    }
  }

  pub fn config(&self) -> &PredictorConfig {
    &self.config
  }

  /// Records an access to `key` and learns the transition from the previous
  /// different key, if it happened within the transition lag.
  pub fn learn(&mut self, key: K) {
    let now = time::now();
    while let Some((_, at)) = self.sequence.front() {
      if !time::is_older_than(now, *at, self.config.learning_window) {
        break;
      }
      self.sequence.pop_front();
    }

    let previous = self
      .sequence
      .iter()
      .rev()
      .find(|(seen, _)| *seen != key)
      .filter(|(_, at)| !time::is_older_than(now, *at, self.config.transition_lag))
      .map(|(seen, _)| seen.clone());

    if let Some(from) = previous {
      let successors = self.patterns.entry(from).or_insert_with(Successors::new);
      let known = successors.targets.len();
      successors.observe(key.clone());
      if successors.targets.len() > known {
        self.patterns_learned += 1;
      }
    }

    self.sequence.push_back((key, now));
  }

  /// Returns the likely successors of `key`, most confident first.
  pub fn predict(&mut self, key: &K) -> Vec<Prediction<K>> {
    let Some(successors) = self.patterns.get(key) else {
      return Vec::new();
    };

    let mut predictions: Vec<Prediction<K>> = successors
      .targets
      .iter()
      .map(|(to, count)| Prediction {
        key: to.clone(),
        confidence: successors.confidence(*count),
      })
      .filter(|prediction| prediction.confidence >= self.config.min_confidence)
      .collect();

    // Stable sort keeps first-seen order among equal confidences.
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    predictions.truncate(self.config.max_predictions);

    self.total_predictions += predictions.len() as u64;
    predictions
  }

  /// Counts a prediction whose key was already resident or was warmed.
  pub fn record_correct_prediction(&mut self) {
    self.correct_predictions += 1;
  }

  /// The `limit` most frequently observed transitions.
  pub fn top_patterns(&self, limit: usize) -> Vec<TransitionPattern<K>> {
    let mut patterns: Vec<TransitionPattern<K>> = self
      .patterns
      .iter()
      .flat_map(|(from, successors)| {
        successors.targets.iter().map(move |(to, count)| TransitionPattern {
          from: from.clone(),
          to: to.clone(),
          count: *count,
          confidence: successors.confidence(*count),
        })
      })
      .collect();

    patterns.sort_by(|a, b| {
      b.count
        .cmp(&a.count)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
    patterns.truncate(limit);
    patterns
  }

  pub fn clear(&mut self) {
    self.sequence.clear();
    self.patterns.clear();
    self.patterns_learned = 0;
    self.total_predictions = 0;
    self.correct_predictions = 0;
  }

  pub fn stats(&self) -> PredictiveStats {
    PredictiveStats {
      patterns_learned: self.patterns_learned,
      total_predictions: self.total_predictions,
      correct_predictions: self.correct_predictions,
      accuracy_pct: percent(self.correct_predictions, self.total_predictions),
      recent_access_count: self.sequence.len(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn warmer(min_confidence: f64, max_predictions: usize) -> PredictiveWarmer<&'static str> {
    PredictiveWarmer::new(PredictorConfig {
      min_confidence,
      max_predictions,
      ..PredictorConfig::default()
    })
  }

  #[test]
  fn test_unknown_key_predicts_nothing() {
    let mut warmer = warmer(0.0, 5);
    warmer.learn("a");
    assert!(warmer.predict(&"a").is_empty());
    assert!(warmer.predict(&"zzz").is_empty());
    assert_eq!(warmer.stats().total_predictions, 0);
  }

  #[test]
  fn test_learns_sequential_transitions() {
    let mut warmer = warmer(0.0, 5);
    for _ in 0..3 {
      warmer.learn("list");
      warmer.learn("detail");
    }

    let predictions = warmer.predict(&"list");
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].key, "detail");
    assert_eq!(predictions[0].confidence, 1.0);

    // "detail -> list" was learned as well.
    assert_eq!(warmer.predict(&"detail")[0].key, "list");
    assert_eq!(warmer.stats().patterns_learned, 2);
  }

  #[test]
  fn test_repeated_key_looks_past_itself() {
    let mut warmer = warmer(0.0, 5);
    warmer.learn("a");
    warmer.learn("b");
    warmer.learn("b");
    warmer.learn("b");

    let predictions = warmer.predict(&"a");
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].key, "b");
    assert!(warmer.predict(&"b").is_empty(), "self transitions are ignored");
  }

  #[test]
  fn test_confidence_is_share_of_outgoing() {
    let mut warmer = warmer(0.0, 5);
    for next in ["x", "x", "x", "y"] {
      warmer.learn("a");
      warmer.learn(next);
    }

    let predictions = warmer.predict(&"a");
    assert_eq!(predictions[0].key, "x");
    assert_eq!(predictions[0].confidence, 0.75);
    assert_eq!(predictions[1].key, "y");
    assert_eq!(predictions[1].confidence, 0.25);
  }

  #[test]
  fn test_predictions_respect_threshold_and_limit() {
    let mut warmer = warmer(0.2, 2);
    for next in ["x", "x", "x", "y", "y", "z", "w", "w", "w", "w"] {
      warmer.learn("a");
      warmer.learn(next);
    }

    let predictions = warmer.predict(&"a");
    assert!(predictions.len() <= 2);
    for prediction in &predictions {
      assert!(prediction.confidence >= 0.2);
    }
    assert_eq!(predictions[0].key, "w");
    assert_eq!(predictions[1].key, "x");
    assert_eq!(warmer.stats().total_predictions, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_transitions_need_to_be_within_lag() {
    let mut warmer = warmer(0.0, 5);
    warmer.learn("a");
    tokio::time::advance(Duration::from_secs(11)).await;
    warmer.learn("b");
    assert!(warmer.predict(&"a").is_empty());

    tokio::time::advance(Duration::from_secs(3)).await;
    warmer.learn("c");
    assert_eq!(warmer.predict(&"b")[0].key, "c");
  }

  #[tokio::test(start_paused = true)]
  async fn test_learning_window_prunes_log_but_keeps_counts() {
    let mut warmer = PredictiveWarmer::new(PredictorConfig {
      learning_window: Duration::from_secs(30),
      min_confidence: 0.0,
      ..PredictorConfig::default()
    });
    warmer.learn("a");
    warmer.learn("b");
    assert_eq!(warmer.stats().recent_access_count, 2);

    tokio::time::advance(Duration::from_secs(31)).await;
    warmer.learn("c");
    let stats = warmer.stats();
    assert_eq!(stats.recent_access_count, 1);
    assert_eq!(stats.patterns_learned, 1);
    assert_eq!(warmer.predict(&"a")[0].key, "b");
  }

  #[test]
  fn test_accuracy_and_top_patterns() {
    let mut warmer = warmer(0.0, 5);
    for _ in 0..4 {
      warmer.learn("a");
      warmer.learn("b");
    }
    warmer.learn("c");

    assert_eq!(warmer.predict(&"a").len(), 1);
    warmer.record_correct_prediction();
    let stats = warmer.stats();
    assert_eq!(stats.correct_predictions, 1);
    assert_eq!(stats.accuracy_pct, 100.0);

    let top = warmer.top_patterns(2);
    assert_eq!(top.len(), 2);
    assert_eq!((top[0].from, top[0].to, top[0].count), ("a", "b", 4));
    assert_eq!((top[1].from, top[1].to, top[1].count), ("b", "a", 3));

    warmer.clear();
    assert_eq!(warmer.stats().patterns_learned, 0);
    assert!(warmer.top_patterns(10).is_empty());
  }
}
