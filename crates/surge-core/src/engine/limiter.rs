//! Bounded concurrency with FIFO hand-off.
//!
//! A [`Limiter`] wraps a tokio [`Semaphore`]: suspended callers of
//! [`Limiter::acquire`] are queued in arrival order, and a released permit goes
//! straight to the longest-waiting caller. The free count only grows when
//! nobody waits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::SurgeError;

/// A counting permit pool. Cloning shares the same pool.
#[derive(Clone)]
pub struct Limiter {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
}

impl Limiter {
    /// Create a pool with `concurrency` permits, floored at 1.
    pub fn new(concurrency: usize) -> Self {
        let capacity = concurrency.max(1);
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free in the pool.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Callers currently suspended in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Wait for a permit. There is no acquisition timeout; the pool is never
    /// closed while a `Limiter` exists, so the error arm is unreachable in
    /// practice.
    pub async fn acquire(&self) -> Result<Permit, SurgeError> {
        if let Ok(inner) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(Permit { _inner: inner });
        }

        let _queued = Queued::enter(&self.waiting);
        match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(inner) => Ok(Permit { _inner: inner }),
            Err(_) => Err(SurgeError::Engine("concurrency limiter closed".to_string())),
        }
    }
}

/// One unit of allowed concurrency. Returned to the pool on drop.
pub struct Permit {
    _inner: OwnedSemaphorePermit,
}

impl Permit {
    pub fn release(self) {
        drop(self);
    }
}

/// Counts a caller as waiting until it gets a permit or gives up.
struct Queued<'a>(&'a AtomicUsize);

impl<'a> Queued<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
