use std::time::Duration;

use tokio::time::Instant;

/// Returns the current time as seen by every tier.
///
/// Backed by `tokio::time::Instant`, so a paused Tokio runtime drives every
/// TTL and window computation in the crate.
#[inline]
pub(crate) fn now() -> Instant {
  Instant::now()
}

/// Returns `true` if `then` lies strictly more than `window` before `now`.
#[inline]
pub(crate) fn is_older_than(now: Instant, then: Instant, window: Duration) -> bool {
  now.saturating_duration_since(then) > window
}
