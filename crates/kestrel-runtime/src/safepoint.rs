//! Cooperative safepoint handshake
//!
//! A single coordinator arms a stop request; executing threads notice it at
//! their next committed safepoint poll and park until release. There are no
//! asynchronous signals anywhere: a thread that never polls is never
//! stopped, which is exactly why the compiler proves a poll on method entry
//! and in every loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Shared handshake state between one coordinator and any number of
/// executing threads.
#[derive(Debug, Default)]
pub struct SafepointSync {
    /// Armed by the coordinator, observed by polls
    requested: AtomicBool,
    /// Threads currently parked at the safepoint
    parked: AtomicUsize,
    mutex: Mutex<()>,
    /// Parked threads wait here for release
    released: Condvar,
    /// The coordinator waits here for arrivals
    arrived: Condvar,
}

impl SafepointSync {
    /// Create an unarmed handshake
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stop is currently requested
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Number of threads parked right now
    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::Acquire)
    }

    /// The check compiled at every committed safepoint. Returns immediately
    /// when no stop is requested; otherwise parks until [`Self::release`].
    #[inline]
    pub fn poll(&self) {
        if self.requested.load(Ordering::Acquire) {
            self.park();
        }
    }

    #[cold]
    fn park(&self) {
        let mut guard = self.mutex.lock();
        self.parked.fetch_add(1, Ordering::AcqRel);
        self.arrived.notify_one();
        while self.requested.load(Ordering::Acquire) {
            self.released.wait(&mut guard);
        }
        self.parked.fetch_sub(1, Ordering::AcqRel);
    }

    /// Arm the request and block until `threads` executing threads have
    /// parked. Call from the coordinator only.
    pub fn request(&self, threads: usize) {
        self.requested.store(true, Ordering::Release);
        let mut guard = self.mutex.lock();
        while self.parked.load(Ordering::Acquire) < threads {
            self.arrived.wait(&mut guard);
        }
        debug!(threads, "all threads parked at safepoint");
    }

    /// Disarm the request and wake every parked thread.
    pub fn release(&self) {
        let guard = self.mutex.lock();
        self.requested.store(false, Ordering::Release);
        drop(guard);
        self.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_without_request_is_free() {
        let sync = SafepointSync::new();
        sync.poll();
        assert_eq!(sync.parked(), 0);
        assert!(!sync.is_requested());
    }

    #[test]
    fn test_release_disarms() {
        let sync = SafepointSync::new();
        sync.requested.store(true, Ordering::Release);
        assert!(sync.is_requested());
        sync.release();
        assert!(!sync.is_requested());
    }

    #[test]
    fn test_request_with_zero_threads_returns() {
        let sync = SafepointSync::new();
        sync.request(0);
        assert!(sync.is_requested());
        sync.release();
    }
}
