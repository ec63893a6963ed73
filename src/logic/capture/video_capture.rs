//! Video Capture Session
//!
//! Drains a `CaptureDevice` on a dedicated capture thread and hands frames
//! to the registered delegate from a delivery thread ("capture queue").
//! Late frames are discarded at the mailbox; the delegate is free to block.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::logic::display::MainHandle;
use super::device::{CaptureDevice, CaptureError, DeviceProvider};
use super::mailbox::LatestFrame;
use super::types::{Frame, SessionPreset};

// ============================================================================
// DELEGATE
// ============================================================================

/// Receives frames from a `VideoCapture`. Registered non-owning.
pub trait CaptureDelegate: Send + Sync {
    /// Called on the delivery thread; may block to apply backpressure
    fn did_capture_frame(&self, frame: Frame);

    /// Called on the capture thread when a late frame is discarded
    fn did_drop_frame(&self, _frame: &Frame) {}
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureStats {
    pub session_id: String,
    pub captured: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub skipped_by_interval: u64,
}

#[derive(Default)]
struct Counters {
    captured: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
}

// ============================================================================
// SHARED STATE
// ============================================================================

struct Shared {
    session_id: String,
    device: Mutex<Option<Box<dyn CaptureDevice>>>,
    delegate: RwLock<Option<Weak<dyn CaptureDelegate>>>,
    mailbox: LatestFrame,
    running: AtomicBool,
    configured: AtomicBool,
    frame_interval: AtomicUsize,
    counters: Counters,
}

impl Shared {
    fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.read().as_ref().and_then(Weak::upgrade)
    }
}

// ============================================================================
// VIDEO CAPTURE
// ============================================================================

pub struct VideoCapture {
    shared: Arc<Shared>,
    provider: Arc<DeviceProvider>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl VideoCapture {
    pub fn new(provider: DeviceProvider) -> Self {
        Self {
            shared: Arc::new(Shared {
                session_id: uuid::Uuid::new_v4().to_string(),
                device: Mutex::new(None),
                delegate: RwLock::new(None),
                mailbox: LatestFrame::new(),
                running: AtomicBool::new(false),
                configured: AtomicBool::new(false),
                frame_interval: AtomicUsize::new(1),
                counters: Counters::default(),
            }),
            provider: Arc::new(provider),
            threads: Mutex::new(Vec::new()),
        }
    }

    // ---------------------------------------------------------------------
    // Delegate registration
    // ---------------------------------------------------------------------

    pub fn set_delegate(&self, delegate: Weak<dyn CaptureDelegate>) {
        *self.shared.delegate.write() = Some(delegate);
    }

    pub fn clear_delegate(&self) {
        *self.shared.delegate.write() = None;
    }

    /// Deliver every n-th captured frame (n >= 1)
    pub fn set_frame_interval(&self, interval: usize) {
        self.shared.frame_interval.store(interval.max(1), Ordering::Relaxed);
    }

    // ---------------------------------------------------------------------
    // Setup
    // ---------------------------------------------------------------------

    /// Configure on the capture queue, report the outcome on the main queue
    pub fn setup<F>(&self, preset: SessionPreset, main: MainHandle, completion: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let shared = self.shared.clone();
        let provider = self.provider.clone();
        let spawned = thread::Builder::new()
            .name("capture-setup".to_string())
            .spawn(move || {
                let success = configure_device(&shared, &provider, preset);
                main.dispatch(move || completion(success));
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn capture setup: {}", e);
        }
    }

    pub fn is_configured(&self) -> bool {
        self.shared.configured.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // Control
    // ---------------------------------------------------------------------

    pub fn start(&self) -> Result<(), CaptureError> {
        if !self.is_configured() {
            return Err(CaptureError("Capture session not configured".to_string()));
        }
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Threads left over from a stream that ended on its own
        self.join_finished();

        let device = self.shared.device.lock().take();
        let Some(device) = device else {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(CaptureError("Capture device busy".to_string()));
        };

        self.shared.mailbox.reopen();

        let capture = {
            let shared = self.shared.clone();
            thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || capture_loop(shared, device))
        };
        let capture = match capture {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(CaptureError(format!("Failed to spawn capture thread: {}", e)));
            }
        };

        let delivery = {
            let shared = self.shared.clone();
            thread::Builder::new()
                .name("capture-queue".to_string())
                .spawn(move || delivery_loop(shared))
        };
        let delivery = match delivery {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.mailbox.close();
                let _ = capture.join();
                return Err(CaptureError(format!("Failed to spawn delivery thread: {}", e)));
            }
        };

        self.threads.lock().extend([capture, delivery]);
        log::info!("Capture session {} started", self.shared.session_id);
        Ok(())
    }

    /// Stop and join both threads. Frames already handed to the delegate finish normally.
    pub fn stop(&self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        self.shared.mailbox.close();

        let current = thread::current().id();
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            // stop() may run on the delivery thread when the delegate drops the session
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }

        if was_running {
            log::info!("Capture session {} stopped", self.shared.session_id);
        }
    }

    fn join_finished(&self) {
        let current = thread::current().id();
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() != current && handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }

    /// False once stopped or once the device stream ended
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Block until the capture threads exit on their own (end of stream)
    pub fn wait(&self) {
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        self.shared.running.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> CaptureStats {
        let c = &self.shared.counters;
        CaptureStats {
            session_id: self.shared.session_id.clone(),
            captured: c.captured.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            skipped_by_interval: c.skipped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for VideoCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// WORKERS
// ============================================================================

fn configure_device(shared: &Shared, provider: &DeviceProvider, preset: SessionPreset) -> bool {
    if shared.running.load(Ordering::SeqCst) {
        log::warn!("Cannot reconfigure a running capture session");
        return false;
    }

    let Some(mut device) = provider() else {
        log::error!("Error: no video devices available");
        shared.configured.store(false, Ordering::SeqCst);
        return false;
    };

    if let Err(e) = device.configure(preset) {
        log::error!("Error: no device input available ({})", e);
        shared.configured.store(false, Ordering::SeqCst);
        return false;
    }

    let (w, h) = preset.dimensions();
    log::info!("Capture device '{}' configured ({:?}, {}x{})", device.name(), preset, w, h);

    *shared.device.lock() = Some(device);
    shared.configured.store(true, Ordering::SeqCst);
    true
}

fn capture_loop(shared: Arc<Shared>, mut device: Box<dyn CaptureDevice>) {
    log::debug!("Capture loop started");
    let mut sequence: usize = 0;

    while shared.running.load(Ordering::SeqCst) {
        let frame = match device.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Capture device '{}' reached end of stream", device.name());
                break;
            }
            Err(e) => {
                log::error!("Error reading frame: {}", e);
                break;
            }
        };
        shared.counters.captured.fetch_add(1, Ordering::Relaxed);

        let interval = shared.frame_interval.load(Ordering::Relaxed).max(1);
        let deliver = sequence % interval == 0;
        sequence = sequence.wrapping_add(1);
        if !deliver {
            shared.counters.skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if let Some(late) = shared.mailbox.put(frame) {
            shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!("dropped frame {}", late.id);
            if let Some(delegate) = shared.delegate() {
                delegate.did_drop_frame(&late);
            }
        }
    }

    shared.mailbox.close();
    *shared.device.lock() = Some(device);
    shared.running.store(false, Ordering::SeqCst);
    log::debug!("Capture loop stopped");
}

fn delivery_loop(shared: Arc<Shared>) {
    while let Some(frame) = shared.mailbox.take() {
        match shared.delegate() {
            Some(delegate) => {
                shared.counters.delivered.fetch_add(1, Ordering::Relaxed);
                delegate.did_capture_frame(frame);
            }
            None => log::trace!("No delegate registered, frame {} discarded", frame.id),
        }
    }
}
