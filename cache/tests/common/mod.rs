#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tiered_cache::{TieredCache, TieredCacheBuilder};
use tracing_subscriber::EnvFilter;

/// Keys at or above this value do not exist upstream.
pub const MISSING_FROM: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("key {0} not found upstream")]
  NotFound(u32),
}

/// An in-memory origin that counts every fetch.
#[derive(Debug, Default)]
pub struct Origin {
  delay: Duration,
  calls: AtomicUsize,
  per_key: Mutex<HashMap<u32, usize>>,
}

impl Origin {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// An origin that takes `delay` to answer.
  pub fn with_delay(delay: Duration) -> Arc<Self> {
    Arc::new(Self {
      delay,
      ..Self::default()
    })
  }

  pub async fn fetch(&self, key: u32) -> Result<String, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    *self.per_key.lock().entry(key).or_insert(0) += 1;
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    if key >= MISSING_FROM {
      Err(FetchError::NotFound(key))
    } else {
      Ok(value_for(key))
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn calls_for(&self, key: u32) -> usize {
    self.per_key.lock().get(&key).copied().unwrap_or(0)
  }
}

pub fn value_for(key: u32) -> String {
  format!("value-{key}")
}

/// A builder wired to `origin`, with predictive warming off so fetch counts
/// only reflect `get` calls.
pub fn builder(origin: &Arc<Origin>) -> TieredCacheBuilder<u32, String, FetchError> {
  init_tracing();
  let origin = Arc::clone(origin);
  TieredCache::builder()
    .predictive_warming(false)
    .fetcher(move |key| {
      let origin = Arc::clone(&origin);
      async move { origin.fetch(key).await }
    })
}

pub fn build_test_cache(origin: &Arc<Origin>, l1: u64, l2: u64) -> TieredCache<u32, String, FetchError> {
  builder(origin).l1_capacity(l1).l2_capacity(l2).build().unwrap()
}

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Gives spawned warming tasks a chance to finish.
pub async fn let_background_run() {
  tokio::time::sleep(Duration::from_millis(10)).await;
}
