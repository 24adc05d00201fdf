mod manager;
mod power;

pub use manager::{WakeLockManager, WakeLockState, WakePanel, WakeTransition};
pub use power::{PowerServiceLock, PowerSnapshot};

use futures::future::BoxFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeLockKind {
    Screen,
}

#[derive(Debug, thiserror::Error)]
pub enum WakeLockError {
    #[error("wake lock request failed: {0}")]
    Request(String),

    #[error("platform refused the wake lock: {0}")]
    Rejected(String),

    #[error("wake lock release failed: {0}")]
    Release(String),
}

/// A held wake lock.
///
/// `released` resolves when the platform takes the lock away; it is the
/// only channel through which loss is reported.
pub struct WakeLock {
    tag: String,
    released: BoxFuture<'static, ()>,
}

impl WakeLock {
    pub fn new(tag: impl Into<String>, released: BoxFuture<'static, ()>) -> Self {
        Self {
            tag: tag.into(),
            released,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl std::fmt::Debug for WakeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeLock").field("tag", &self.tag).finish_non_exhaustive()
    }
}

pub trait WakeLockProvider: Send + Sync {
    fn request(&self, kind: WakeLockKind) -> BoxFuture<'static, Result<WakeLock, WakeLockError>>;

    /// Hand a lock back voluntarily.
    fn release(&self, lock: WakeLock) -> BoxFuture<'static, Result<(), WakeLockError>> {
        drop(lock);
        Box::pin(async { Ok(()) })
    }
}
