//! Request Slots - K reusable request contexts, handed out round-robin

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::logic::model::{CropAndScale, VisionRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Idle,
    Submitted,
    Running,
}

/// One reusable request context
pub struct RequestSlot {
    index: usize,
    queued: AtomicUsize,
    running: AtomicBool,
    uses: AtomicU64,
    request: Mutex<VisionRequest>,
}

impl RequestSlot {
    fn new(index: usize, crop: CropAndScale) -> Self {
        Self {
            index,
            queued: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            uses: AtomicU64::new(0),
            request: Mutex::new(VisionRequest::new(index, crop)),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Idle -> Submitted (producer side)
    pub fn mark_submitted(&self) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        self.uses.fetch_add(1, Ordering::Relaxed);
    }

    /// Submitted -> Running (worker side). Waits if the slot is still busy with
    /// an earlier frame, since completion order is not submission order.
    pub fn begin(&self) -> ActiveRequest<'_> {
        let guard = self.request.lock();
        self.running.store(true, Ordering::SeqCst);
        self.queued.fetch_sub(1, Ordering::SeqCst);
        ActiveRequest { slot: self, guard }
    }

    pub fn state(&self) -> SlotState {
        if self.running.load(Ordering::SeqCst) {
            SlotState::Running
        } else if self.queued.load(Ordering::SeqCst) > 0 {
            SlotState::Submitted
        } else {
            SlotState::Idle
        }
    }

    /// Number of frames this slot has been handed
    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::Relaxed)
    }
}

/// Running request; dropping it returns the slot to Idle
pub struct ActiveRequest<'a> {
    slot: &'a RequestSlot,
    guard: MutexGuard<'a, VisionRequest>,
}

impl ActiveRequest<'_> {
    pub fn request(&mut self) -> &mut VisionRequest {
        &mut self.guard
    }
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.slot.running.store(false, Ordering::SeqCst);
    }
}

/// Fixed ring of slots. Only the producer calls `next`.
pub struct SlotRing {
    slots: Vec<Arc<RequestSlot>>,
    cursor: Mutex<usize>,
}

impl SlotRing {
    pub fn new(count: usize, crop: CropAndScale) -> Self {
        Self {
            slots: (0..count).map(|i| Arc::new(RequestSlot::new(i, crop))).collect(),
            cursor: Mutex::new(0),
        }
    }

    /// Current slot, then advance modulo K
    pub fn next(&self) -> Arc<RequestSlot> {
        let mut cursor = self.cursor.lock();
        let slot = self.slots[*cursor].clone();
        *cursor = (*cursor + 1) % self.slots.len();
        slot
    }

    pub fn states(&self) -> Vec<SlotState> {
        self.slots.iter().map(|s| s.state()).collect()
    }

    /// Frames handed to each slot so far
    pub fn uses(&self) -> Vec<u64> {
        self.slots.iter().map(|s| s.uses()).collect()
    }
}
