//! The LRU-K admission tier.
//!
//! Every entry remembers the stamps of its last `K` accesses, oldest first.
//! The eviction victim is the entry whose oldest retained stamp is furthest in
//! the past: for an entry with a full history this is its K-th most recent
//! access, for a younger entry it is its first access. A key that keeps being
//! touched therefore slides its priority forward, while a key seen once ages
//! out on its first touch, which keeps one-hit wonders from pushing recurring
//! keys out.
//!
//! Victims are found through a `BTreeMap` keyed by each entry's oldest stamp.
//! Stamps carry a per-tier sequence number so two accesses sharing an instant
//! still order by arrival.

use crate::metrics::{percent, AdmissionStats};
use crate::time;

use std::collections::{BTreeMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;

use ahash::{HashMap, HashMapExt};
use tokio::time::Instant;
use tracing::{debug, trace};

/// A single recorded access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct AccessStamp {
  at: Instant,
  seq: u64,
}

#[derive(Debug)]
struct LruKEntry<V> {
  value: V,
  size: u64,
  created_at: Instant,
  // Never empty.
  history: VecDeque<AccessStamp>,
}

impl<V> LruKEntry<V> {
  #[inline]
  fn priority(&self) -> AccessStamp {
    self.history[0]
  }
}

/// A size-bounded LRU-K cache with a fixed time-to-live.
#[derive(Debug)]
pub struct LruKCache<K, V> {
  entries: HashMap<K, LruKEntry<V>>,
  order: BTreeMap<AccessStamp, K>,
  k: usize,
  ttl: Duration,
  max_size: u64,
  current_size: u64,
  next_seq: u64,

  hits: u64,
  misses: u64,
  evictions: u64,
  expirations: u64,
}

impl<K, V> LruKCache<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  /// Creates an empty tier holding at most `max_size` units, remembering the
  /// last `k` accesses per key. `k` is raised to 1 if zero.
  pub fn new(max_size: u64, k: usize, ttl: Duration) -> Self {
    Self {
      entries: HashMap::new(),
      order: BTreeMap::new(),
      k: k.max(1),
      ttl,
      max_size,
      current_size: 0,
      next_seq: 0,
      hits: 0,
      misses: 0,
      evictions: 0,
      expirations: 0,
    }
  }

  fn stamp(&mut self, at: Instant) -> AccessStamp {
    let seq = self.next_seq;
    self.next_seq += 1;
    AccessStamp { at, seq }
  }

  /// Looks up `key`, recording the access on a hit.
  ///
  /// An entry older than the TTL is dropped and reported as a miss.
  pub fn get(&mut self, key: &K) -> Option<V> {
    let now = time::now();
    let expired = match self.entries.get(key) {
      Some(entry) => time::is_older_than(now, entry.created_at, self.ttl),
      None => {
        self.misses += 1;
        return None;
      }
    };

    if expired {
      self.remove_entry(key);
      self.expirations += 1;
      self.misses += 1;
      trace!("admission tier entry expired");
      return None;
    }

    let stamp = self.stamp(now);
    let k = self.k;
    let entry = self.entries.get_mut(key)?;
    let old_priority = entry.priority();
    entry.history.push_back(stamp);
    while entry.history.len() > k {
      entry.history.pop_front();
    }
    let new_priority = entry.priority();
    let value = entry.value.clone();

    if old_priority != new_priority {
      if let Some(owner) = self.order.remove(&old_priority) {
        self.order.insert(new_priority, owner);
      }
    }

    self.hits += 1;
    Some(value)
  }

  /// Inserts or replaces `key`, evicting by K-th access until it fits.
  ///
  /// Replacing resets the entry's history and creation time. An entry larger
  /// than the whole tier empties the tier and is not admitted.
  pub fn set(&mut self, key: K, value: V, size: u64) {
    let now = time::now();
    self.remove_entry(&key);

    while self.current_size.saturating_add(size) > self.max_size {
      if !self.evict_one() {
        break;
      }
    }
    if self.current_size.saturating_add(size) > self.max_size {
      debug!(size, max_size = self.max_size, "entry exceeds admission tier capacity, not admitted");
      return;
    }

    let stamp = self.stamp(now);
    let mut history = VecDeque::with_capacity(self.k);
    history.push_back(stamp);

    self.order.insert(stamp, key.clone());
    self.entries.insert(
      key,
      LruKEntry {
        value,
        size,
        created_at: now,
        history,
      },
    );
    self.current_size += size;
  }

  // Evicts the entry whose oldest retained access is furthest in the past.
  fn evict_one(&mut self) -> bool {
    let Some((_, key)) = self.order.pop_first() else {
      return false;
    };
    if let Some(entry) = self.entries.remove(&key) {
      self.current_size = self.current_size.saturating_sub(entry.size);
    }
    self.evictions += 1;
    debug!(occupied = self.current_size, "admission tier evicted by k-th access");
    true
  }

  fn remove_entry(&mut self, key: &K) -> Option<LruKEntry<V>> {
    let entry = self.entries.remove(key)?;
    self.order.remove(&entry.priority());
    self.current_size = self.current_size.saturating_sub(entry.size);
    Some(entry)
  }

  /// Removes `key`, returning its value. Not counted as an eviction.
  pub fn remove(&mut self, key: &K) -> Option<V> {
    self.remove_entry(key).map(|entry| entry.value)
  }

  /// Returns `true` if `key` is resident and unexpired. Records nothing.
  pub fn contains(&self, key: &K) -> bool {
    self
      .entries
      .get(key)
      .is_some_and(|entry| !time::is_older_than(time::now(), entry.created_at, self.ttl))
  }

  /// The retained access instants of `key`, oldest first.
  pub fn access_history(&self, key: &K) -> Option<Vec<Instant>> {
    self
      .entries
      .get(key)
      .map(|entry| entry.history.iter().map(|stamp| stamp.at).collect())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn occupied_size(&self) -> u64 {
    self.current_size
  }

  pub fn max_size(&self) -> u64 {
    self.max_size
  }

  pub fn k(&self) -> usize {
    self.k
  }

  /// Drops every entry and zeroes all counters.
  pub fn clear(&mut self) {
    self.entries.clear();
    self.order.clear();
    self.current_size = 0;
    self.next_seq = 0;
    self.hits = 0;
    self.misses = 0;
    self.evictions = 0;
    self.expirations = 0;
  }

  pub fn stats(&self) -> AdmissionStats {
    AdmissionStats {
      size: self.entries.len(),
      occupied_size: self.current_size,
      max_size: self.max_size,
      utilization_pct: percent(self.current_size, self.max_size),
      hits: self.hits,
      misses: self.misses,
      hit_rate_pct: percent(self.hits, self.hits + self.misses),
      evictions: self.evictions,
      expirations: self.expirations,
    }
  }

  #[cfg(test)]
  fn assert_invariants(&self) {
    assert_eq!(self.entries.len(), self.order.len());
    let total: u64 = self.entries.values().map(|entry| entry.size).sum();
    assert_eq!(total, self.current_size);
    assert!(self.current_size <= self.max_size);
    for (stamp, key) in &self.order {
      let entry = &self.entries[key];
      assert_eq!(entry.priority(), *stamp);
      assert!(!entry.history.is_empty() && entry.history.len() <= self.k);
    }
  }
}
