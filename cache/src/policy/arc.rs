use super::lru_list::LruList;
use crate::metrics::{percent, AdaptiveStats};

use std::hash::Hash;

use ahash::{HashMap, HashMapExt};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
  T1,
  T2,
}

fn list_for<'a, K>(segment: Segment, t1: &'a mut LruList<K>, t2: &'a mut LruList<K>) -> &'a mut LruList<K> {
  match segment {
    Segment::T1 => t1,
    Segment::T2 => t2,
  }
}

#[derive(Debug)]
struct ArcEntry<V> {
  value: V,
  size: u64,
  segment: Segment,
}

/// A size-bounded cache based on the Adaptive Replacement Cache (ARC)
/// algorithm.
///
/// Live entries are split between T1 (admitted once) and T2 (touched again
/// since admission). Keys evicted from either list are remembered, without
/// their value, in the ghost lists B1 and B2. A later `set` of a ghost key
/// moves the target size `p` of T1: a B1 ghost means T1 was too small, a B2
/// ghost means T2 was.
#[derive(Debug)]
pub struct ArcCache<K, V> {
  entries: HashMap<K, ArcEntry<V>>,
  // T1: admitted once, ordered by insertion.
  t1: LruList<K>,
  // T2: promoted by a second touch, ordered by promotion.
  t2: LruList<K>,
  // B1: ghosts evicted from T1.
  b1: LruList<K>,
  // B2: ghosts evicted from T2.
  b2: LruList<K>,
  // Target size of T1, kept in [0, max_size].
  p: f64,
  max_size: u64,

  hits: u64,
  misses: u64,
  adaptations: u64,
  evictions: u64,
}

impl<K, V> ArcCache<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  pub fn new(max_size: u64) -> Self {
    Self {
      entries: HashMap::new(),
      t1: LruList::new(),
      t2: LruList::new(),
      b1: LruList::new(),
      b2: LruList::new(),
      p: 0.0,
      max_size,
      hits: 0,
      misses: 0,
      adaptations: 0,
      evictions: 0,
    }
  }

  /// Looks up `key`. A T1 hit promotes the key to T2; a T2 hit leaves it in
  /// place. Ghost keys are misses.
  pub fn get(&mut self, key: &K) -> Option<V> {
    let Some(entry) = self.entries.get_mut(key) else {
      self.misses += 1;
      return None;
    };

    if entry.segment == Segment::T1 {
      entry.segment = Segment::T2;
      let size = entry.size;
      self.t1.remove(key);
      self.t2.push_front(key.clone(), size);
      trace!("adaptive tier promoted T1 -> T2");
    }

    self.hits += 1;
    self.entries.get(key).map(|entry| entry.value.clone())
  }

  /// Inserts `key`, adapting `p` first if the key is a ghost.
  ///
  /// A live key is replaced in place without adapting; if it grows, other
  /// entries make room for it. A fresh entry always
  /// starts in T1. An entry larger than the whole tier empties it and is not
  /// admitted.
  pub fn set(&mut self, key: K, value: V, size: u64) {
    if let Some(entry) = self.entries.get_mut(&key) {
      entry.value = value;
      entry.size = size;
      let segment = entry.segment;
      self.resize_live(key, segment, size);
      return;
    }

    if self.b1.contains(&key) {
      let delta = (self.b2.len() as f64 / self.b1.len() as f64).max(1.0);
      self.p = (self.p + delta).min(self.max_size as f64);
      self.b1.remove(&key);
      self.adaptations += 1;
      debug!(delta, p = self.p, "adaptive tier B1 ghost hit, favouring recency");
    } else if self.b2.contains(&key) {
      let delta = (self.b1.len() as f64 / self.b2.len() as f64).max(1.0);
      self.p = (self.p - delta).max(0.0);
      self.b2.remove(&key);
      self.adaptations += 1;
      debug!(delta, p = self.p, "adaptive tier B2 ghost hit, favouring frequency");
    }

    while self.occupied_size().saturating_add(size) > self.max_size {
      if !self.replace() {
        break;
      }
    }
    if self.occupied_size().saturating_add(size) > self.max_size {
      debug!(size, max_size = self.max_size, "entry exceeds adaptive tier capacity, not admitted");
      return;
    }

    self.t1.push_front(key.clone(), size);
    self.entries.insert(
      key,
      ArcEntry {
        value,
        size,
        segment: Segment::T1,
      },
    );
  }

  // Applies a new size to a live key. If the tier overflows, the key is
  // detached while other entries are evicted, so it is never its own victim,
  // and is then re-linked at the front of its segment. A key too large for
  // the whole tier is dropped.
  fn resize_live(&mut self, key: K, segment: Segment, size: u64) {
    list_for(segment, &mut self.t1, &mut self.t2).set_cost(&key, size);
    if self.occupied_size() <= self.max_size {
      return;
    }

    list_for(segment, &mut self.t1, &mut self.t2).remove(&key);
    while self.occupied_size().saturating_add(size) > self.max_size {
      if !self.replace() {
        break;
      }
    }
    if self.occupied_size().saturating_add(size) > self.max_size {
      self.entries.remove(&key);
      debug!(size, max_size = self.max_size, "entry exceeds adaptive tier capacity, not admitted");
      return;
    }
    list_for(segment, &mut self.t1, &mut self.t2).push_front(key, size);
  }

  // Evicts one live entry into its ghost list. T1 gives up its oldest entry
  // while it is above target; T2 otherwise. Whichever list is non-empty is
  // used when the preferred one is empty.
  fn replace(&mut self) -> bool {
    let t1_size = self.t1.current_total_cost();
    let from_t1 = !self.t1.is_empty() && (t1_size as f64 > self.p || self.t2.is_empty());

    let (list, ghosts, segment) = if from_t1 {
      (&mut self.t1, &mut self.b1, Segment::T1)
    } else {
      (&mut self.t2, &mut self.b2, Segment::T2)
    };

    let Some((key, _)) = list.pop_back() else {
      return false;
    };
    self.entries.remove(&key);
    ghosts.push_front(key, 1);
    if (ghosts.len() as u64) > self.max_size {
      ghosts.pop_back();
    }

    self.evictions += 1;
    debug!(?segment, p = self.p, "adaptive tier evicted into ghost list");
    true
  }

  /// Removes `key` from whichever list holds it, ghosts included.
  pub fn remove(&mut self, key: &K) -> Option<V> {
    self.b1.remove(key);
    self.b2.remove(key);
    let entry = self.entries.remove(key)?;
    match entry.segment {
      Segment::T1 => self.t1.remove(key),
      Segment::T2 => self.t2.remove(key),
    };
    Some(entry.value)
  }

  /// Returns `true` if `key` holds a live value. Records nothing.
  pub fn contains(&self, key: &K) -> bool {
    self.entries.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Sum of the sizes of live entries in T1 and T2.
  pub fn occupied_size(&self) -> u64 {
    self.t1.current_total_cost() + self.t2.current_total_cost()
  }

  pub fn max_size(&self) -> u64 {
    self.max_size
  }

  /// Current target size of T1.
  pub fn target_p(&self) -> f64 {
    self.p
  }

  /// `p / max_size`: 1.0 favours recency entirely, 0.0 frequency.
  pub fn recency_bias(&self) -> f64 {
    if self.max_size == 0 {
      0.0
    } else {
      self.p / self.max_size as f64
    }
  }

  /// Drops every entry and ghost, resets `p` and zeroes all counters.
  pub fn clear(&mut self) {
    self.entries.clear();
    self.t1.clear();
    self.t2.clear();
    self.b1.clear();
    self.b2.clear();
    self.p = 0.0;
    self.hits = 0;
    self.misses = 0;
    self.adaptations = 0;
    self.evictions = 0;
  }

  pub fn stats(&self) -> AdaptiveStats {
    let occupied = self.occupied_size();
    AdaptiveStats {
      t1_size: self.t1.len(),
      t2_size: self.t2.len(),
      b1_size: self.b1.len(),
      b2_size: self.b2.len(),
      target_p: self.p,
      occupied_size: occupied,
      max_size: self.max_size,
      utilization_pct: percent(occupied, self.max_size),
      hits: self.hits,
      misses: self.misses,
      hit_rate_pct: percent(self.hits, self.hits + self.misses),
      adaptations: self.adaptations,
      recency_bias: self.recency_bias(),
      evictions: self.evictions,
    }
  }

  #[cfg(test)]
  fn assert_invariants(&self) {
    assert!(self.occupied_size() <= self.max_size);
    assert!((self.b1.len() as u64) <= self.max_size);
    assert!((self.b2.len() as u64) <= self.max_size);
    assert!((0.0..=self.max_size as f64).contains(&self.p));
    assert_eq!(self.entries.len(), self.t1.len() + self.t2.len());

    for key in self.t1.iter() {
      assert_eq!(self.entries[key].segment, Segment::T1);
      assert!(!self.b1.contains(key) && !self.b2.contains(key));
    }
    for key in self.t2.iter() {
      assert_eq!(self.entries[key].segment, Segment::T2);
      assert!(!self.b1.contains(key) && !self.b2.contains(key));
    }
    for key in self.b1.iter() {
      assert!(!self.b2.contains(key));
    }
  }
}
