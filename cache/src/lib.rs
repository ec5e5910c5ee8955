//! An adaptive two-tier, read-through cache for asynchronous origins.
//!
//! # Features
//! - **Admission tier**: LRU-K keeps keys with a recent history of repeated
//!   access and expires entries after a time-to-live.
//! - **Adaptive tier**: ARC balances recency against frequency using ghost
//!   lists of recently evicted keys.
//! - **Working set analysis**: measures distinct keys over a sliding window
//!   and recommends tier sizes.
//! - **Predictive warming**: learns which keys tend to follow each other and
//!   prefetches likely next keys in the background.
//! - **Fetch coalescing**: concurrent misses on one key share a single origin
//!   fetch.
//! - **Observability**: every component reports statistics, serializable with
//!   the `serde` feature.

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod policy;
pub mod predictor;
pub mod runtime;
pub mod working_set;

// Internal, crate-only modules
mod loader;
mod shared;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::TieredCacheBuilder;
pub use config::CacheConfig;
pub use error::{BuildError, Tier};
pub use handles::TieredCache;
pub use metrics::{
  AdaptiveStats, AdmissionStats, OriginStats, PredictiveStats, SizeRecommendation,
  TieredCacheStats, WorkingSetStats,
};
pub use policy::{ArcCache, LruKCache};
pub use predictor::{Prediction, PredictiveWarmer, PredictorConfig, TransitionPattern};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use working_set::WorkingSetAnalyzer;
