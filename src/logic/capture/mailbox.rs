//! Latest-frame mailbox
//!
//! Single-slot hand-off between the capture thread and the delivery thread.
//! A new frame replaces an undelivered one (late frames are discarded).

use parking_lot::{Condvar, Mutex};

use super::types::Frame;

#[derive(Default)]
struct Inner {
    frame: Option<Frame>,
    closed: bool,
}

#[derive(Default)]
pub struct LatestFrame {
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, returning the undelivered frame it replaced
    pub fn put(&self, frame: Frame) -> Option<Frame> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Some(frame);
        }
        let replaced = inner.frame.replace(frame);
        self.ready.notify_one();
        replaced
    }

    /// Block until a frame arrives. `None` once closed and drained.
    pub fn take(&self) -> Option<Frame> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(frame) = inner.frame.take() {
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Wake the consumer; pending frame is still delivered
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.ready.notify_all();
    }

    /// Re-arm for a new capture run
    pub fn reopen(&self) {
        let mut inner = self.inner.lock();
        inner.closed = false;
        inner.frame = None;
    }
}
