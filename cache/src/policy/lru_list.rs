use std::hash::Hash;

use ahash::{HashMap, HashMapExt};
use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K> {
  key: K,
  cost: u64,
  next: Option<Index>,
  prev: Option<Index>,
}

/// A cost-aware, insertion-ordered list of keys.
///
/// The head holds the newest key and the tail the oldest. Nodes live in a
/// generational arena and are found through a key index, so `remove` and
/// `pop_back` are O(1).
#[derive(Debug)]
pub(crate) struct LruList<K> {
  nodes: Arena<Node<K>>,
  lookup: HashMap<K, Index>,
  head: Option<Index>,
  tail: Option<Index>,
  current_cost: u64,
}

impl<K: Eq + Hash + Clone> LruList<K> {
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
      current_cost: 0,
    }
  }

  // Detaches a node from its neighbours without freeing it.
  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev {
      Some(prev_idx) => self.nodes[prev_idx].next = next,
      None => self.head = next,
    }
    match next {
      Some(next_idx) => self.nodes[next_idx].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head {
      self.nodes[old_head].prev = Some(index);
    }
    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  pub(crate) fn contains(&self, key: &K) -> bool {
    self.lookup.contains_key(key)
  }

  pub(crate) fn len(&self) -> usize {
    self.lookup.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.lookup.is_empty()
  }

  /// Sum of the costs of every key in the list.
  pub(crate) fn current_total_cost(&self) -> u64 {
    self.current_cost
  }

  /// Inserts `key` as the newest element. A key already present is moved to
  /// the front and takes the new cost.
  pub(crate) fn push_front(&mut self, key: K, cost: u64) {
    if let Some(&index) = self.lookup.get(&key) {
      self.set_cost(&key, cost);
      if self.head != Some(index) {
        self.unlink(index);
        self.link_front(index);
      }
      return;
    }

    let index = self.nodes.insert(Node {
      key: key.clone(),
      cost,
      next: None,
      prev: None,
    });
    self.lookup.insert(key, index);
    self.current_cost += cost;
    self.link_front(index);
  }

  /// Changes the cost recorded for `key` without touching its position.
  pub(crate) fn set_cost(&mut self, key: &K, cost: u64) -> bool {
    match self.lookup.get(key) {
      Some(&index) => {
        let node = &mut self.nodes[index];
        self.current_cost = self.current_cost.saturating_sub(node.cost) + cost;
        node.cost = cost;
        true
      }
      None => false,
    }
  }

  /// Removes and returns the oldest key with its cost.
  pub(crate) fn pop_back(&mut self) -> Option<(K, u64)> {
    let tail = self.tail?;
    let key = self.nodes[tail].key.clone();
    self.remove(&key).map(|cost| (key, cost))
  }

  /// Removes `key`, returning its cost if it was present.
  pub(crate) fn remove(&mut self, key: &K) -> Option<u64> {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    let node = self.nodes.remove(index)?;
    self.current_cost = self.current_cost.saturating_sub(node.cost);
    Some(node.cost)
  }

  /// Iterates keys from newest to oldest.
  #[cfg(test)]
  pub(crate) fn iter(&self) -> impl Iterator<Item = &K> + '_ {
    let mut cursor = self.head;
    std::iter::from_fn(move || {
      let index = cursor?;
      let node = &self.nodes[index];
      cursor = node.next;
      Some(&node.key)
    })
  }

  pub(crate) fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
    self.current_cost = 0;
  }
}
