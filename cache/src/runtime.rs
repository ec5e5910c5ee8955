use futures_util::future::BoxFuture;
use tokio::runtime::Handle;

/// A trait for spawning a future onto an asynchronous runtime.
///
/// Predictive warming runs on spawned tasks so that a `get` never waits for
/// it.
pub trait TaskSpawner: Send + Sync + 'static {
  /// Spawns a type-erased future.
  fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// Spawns onto a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioSpawner(Handle);

impl TokioSpawner {
  /// Creates a spawner that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self(Handle::current())
  }

  /// Like [`TokioSpawner::new`], but returns `None` outside of a runtime.
  pub fn try_current() -> Option<Self> {
    Handle::try_current().ok().map(Self)
  }

  pub fn from_handle(handle: Handle) -> Self {
    Self(handle)
  }
}

impl TaskSpawner for TokioSpawner {
  fn spawn(&self, future: BoxFuture<'static, ()>) {
    self.0.spawn(future);
  }
}
