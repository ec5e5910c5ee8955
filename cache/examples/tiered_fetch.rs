use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use tiered_cache::TieredCache;
use tokio::time::{sleep, Duration};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, thiserror::Error)]
#[error("page {0} does not exist")]
struct NotFound(u32);

// A simulated slow page store.
async fn fetch_page(id: u32, load_count: Arc<AtomicUsize>) -> Result<String, NotFound> {
  load_count.fetch_add(1, Ordering::SeqCst);
  sleep(Duration::from_millis(100)).await;
  if id > 100 {
    return Err(NotFound(id));
  }
  Ok(format!("<page {id}>"))
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let load_count = Arc::new(AtomicUsize::new(0));
  let cache = TieredCache::builder()
    .l1_capacity(2)
    .l2_capacity(8)
    .time_to_live(Duration::from_secs(60))
    .fetcher({
      let load_count = load_count.clone();
      move |id: u32| fetch_page(id, load_count.clone())
    })
    .build()
    .expect("Failed to build tiered cache");

  println!("--- Coalesced misses ---");
  let tasks: Vec<_> = (0..5)
    .map(|i| {
      let cache = cache.clone();
      tokio::spawn(async move {
        let page = cache.get(1).await;
        println!("[Task {i}] got {page:?}");
      })
    })
    .collect();
  for task in tasks {
    task.await.unwrap();
  }
  println!("Origin loads so far: {}\n", load_count.load(Ordering::SeqCst));

  println!("--- Learning a navigation pattern: 1 -> 2 -> 3 ---");
  for _ in 0..3 {
    for id in [1, 2, 3] {
      cache.get(id).await.unwrap();
    }
  }
  // Push 2 and 3 out, then revisit 1: the warmer prefetches 2.
  cache.invalidate(&2);
  cache.invalidate(&3);
  cache.get(1).await.unwrap();
  sleep(Duration::from_millis(250)).await;
  println!("2 resident after warming: {}", cache.contains(&2));

  println!("\n--- Errors pass straight through ---");
  println!("{:?}", cache.get(404).await);

  let stats = cache.stats();
  println!("\n--- Stats ---");
  println!("{}", serde_json::to_string_pretty(&stats).unwrap());
  for pattern in cache.top_patterns(3) {
    println!(
      "{} -> {}: seen {} times ({:.0}%)",
      pattern.from,
      pattern.to,
      pattern.count,
      pattern.confidence * 100.0
    );
  }
}
