//! Counting permits for in-flight inference
//!
//! `acquire` blocks the caller while all permits are out.
//! A `Permit` gives its unit back exactly once, when dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Condvar, Mutex};

pub struct Permits {
    capacity: usize,
    available: Mutex<usize>,
    freed: Condvar,
    peak_in_use: AtomicUsize,
}

impl Permits {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            available: Mutex::new(capacity),
            freed: Condvar::new(),
            peak_in_use: AtomicUsize::new(0),
        })
    }

    /// Block until a permit is free
    pub fn acquire(self: &Arc<Self>) -> Permit {
        let mut available = self.available.lock();
        while *available == 0 {
            self.freed.wait(&mut available);
        }
        self.take_one(&mut available)
    }

    fn take_one(self: &Arc<Self>, available: &mut usize) -> Permit {
        *available -= 1;
        self.peak_in_use.fetch_max(self.capacity - *available, Ordering::Relaxed);
        Permit {
            permits: self.clone(),
        }
    }

    fn release(&self) {
        let mut available = self.available.lock();
        debug_assert!(*available < self.capacity, "permit released twice");
        *available += 1;
        // notify_all: both acquirers and wait_idle callers wait on this condvar
        self.freed.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Highest number of permits ever held at once
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use.load(Ordering::Relaxed)
    }

    /// Block until every permit is back
    pub fn wait_all_free(&self) {
        let mut available = self.available.lock();
        while *available < self.capacity {
            self.freed.wait(&mut available);
        }
    }

    /// Like `wait_all_free`, gives up after `timeout`. Returns true when idle.
    pub fn wait_all_free_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut available = self.available.lock();
        while *available < self.capacity {
            if self.freed.wait_until(&mut available, deadline).timed_out() {
                return *available == self.capacity;
            }
        }
        true
    }
}

/// One unit of concurrency budget. Released on drop.
pub struct Permit {
    permits: Arc<Permits>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.permits.release();
    }
}
