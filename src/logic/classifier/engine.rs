//! Frame Classifier - bounded-concurrency inference
//!
//! At most K classifications run at once. The producer blocks on a permit
//! when all K are busy; that is the only backpressure point at this layer.
//! Inference runs on a tokio blocking pool so the producer never waits on ML work.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::capture::Frame;
use crate::logic::config::ClassifierConfig;
use crate::logic::model::{rank, ImageClassifier, Observation};
use super::permits::Permits;
use super::slots::{RequestSlot, SlotRing, SlotState};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Completed classification of one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub frame_id: u64,
    pub slot: usize,
    /// Sorted by descending confidence
    pub observations: Vec<Observation>,
    pub inference_time_us: u64,
    pub completed_at: DateTime<Utc>,
}

/// Classifier status for logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierStatus {
    pub model: String,
    pub max_in_flight: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub avg_latency_ms: f32,
    pub slots: Vec<SlotState>,
    pub slot_uses: Vec<u64>,
}

/// Called on a worker thread for every successful classification
pub type CompletionHandler = Arc<dyn Fn(ClassificationResult) + Send + Sync>;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub struct ClassifierError(pub String);

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClassifierError: {}", self.0)
    }
}

impl std::error::Error for ClassifierError {}

// ============================================================================
// STATS
// ============================================================================

#[derive(Default)]
struct Stats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    latency_sum_us: AtomicU64,
}

// ============================================================================
// FRAME CLASSIFIER
// ============================================================================

pub struct FrameClassifier {
    model: Arc<dyn ImageClassifier>,
    permits: Arc<Permits>,
    slots: SlotRing,
    runtime: tokio::runtime::Runtime,
    on_complete: CompletionHandler,
    stats: Arc<Stats>,
}

impl FrameClassifier {
    pub fn new(
        config: &ClassifierConfig,
        model: Arc<dyn ImageClassifier>,
        on_complete: CompletionHandler,
    ) -> Result<Self, ClassifierError> {
        let k = config.max_in_flight;
        if k == 0 {
            return Err(ClassifierError("max_in_flight must be >= 1".to_string()));
        }

        // Only spawn_blocking is used, so no async workers or drivers
        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(k)
            .thread_name("inference")
            .build()
            .map_err(|e| ClassifierError(format!("Failed to create inference runtime: {}", e)))?;

        log::info!("Frame classifier ready (model: {}, max in flight: {})", model.name(), k);

        Ok(Self {
            model,
            permits: Permits::new(k),
            slots: SlotRing::new(k, config.crop_and_scale),
            runtime,
            on_complete,
            stats: Arc::new(Stats::default()),
        })
    }

    /// Submit one frame. Blocks while K classifications are in flight.
    ///
    /// Returns the slot index the frame was assigned to.
    pub fn submit_frame(&self, frame: Frame) -> usize {
        let permit = self.permits.acquire();
        let slot = self.slots.next();
        let index = slot.index();

        slot.mark_submitted();
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        log::trace!("Frame {} -> slot {}", frame.id, index);

        let model = self.model.clone();
        let on_complete = self.on_complete.clone();
        let stats = self.stats.clone();

        self.runtime.spawn_blocking(move || {
            let _permit = permit;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                perform(model.as_ref(), &slot, &frame, &stats, on_complete.as_ref())
            }));
            if outcome.is_err() {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                log::error!("Classifier panicked on frame {} (slot {})", frame.id, slot.index());
            }
        });

        index
    }

    /// Block until nothing is in flight
    pub fn wait_idle(&self) {
        self.permits.wait_all_free();
    }

    /// Returns false on timeout
    pub fn wait_idle_for(&self, timeout: Duration) -> bool {
        self.permits.wait_all_free_for(timeout)
    }

    pub fn status(&self) -> ClassifierStatus {
        let completed = self.stats.completed.load(Ordering::Relaxed);
        let sum = self.stats.latency_sum_us.load(Ordering::Relaxed);
        let avg = if completed > 0 { (sum as f32 / completed as f32) / 1000.0 } else { 0.0 };

        ClassifierStatus {
            model: self.model.name().to_string(),
            max_in_flight: self.permits.capacity(),
            in_flight: self.permits.in_use(),
            peak_in_flight: self.permits.peak_in_use(),
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            completed,
            failed: self.stats.failed.load(Ordering::Relaxed),
            avg_latency_ms: avg,
            slots: self.slots.states(),
            slot_uses: self.slots.uses(),
        }
    }
}

/// Worker side of one request. Errors are logged and the frame dropped.
fn perform(
    model: &dyn ImageClassifier,
    slot: &RequestSlot,
    frame: &Frame,
    stats: &Stats,
    on_complete: &(dyn Fn(ClassificationResult) + Send + Sync),
) {
    let start_time = Instant::now();

    let result = {
        let mut active = slot.begin();
        let request = active.request();
        request.intrinsics = frame.intrinsics;
        model.classify(frame, request)
    };

    let inference_time = start_time.elapsed().as_micros() as u64;

    match result {
        Ok(mut observations) => {
            rank(&mut observations);
            stats.completed.fetch_add(1, Ordering::Relaxed);
            stats.latency_sum_us.fetch_add(inference_time, Ordering::Relaxed);

            on_complete(ClassificationResult {
                frame_id: frame.id,
                slot: slot.index(),
                observations,
                inference_time_us: inference_time,
                completed_at: Utc::now(),
            });
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            log::error!("Failed to perform request for frame {}: {}", frame.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::capture::types::CameraIntrinsics;
    use crate::logic::model::inference::InferenceError;
    use crate::logic::model::VisionRequest;
    use parking_lot::{Condvar, Mutex};
    use rand::Rng;
    use std::sync::atomic::AtomicUsize;

    /// Tracks how many classify calls overlap
    #[derive(Default)]
    struct OverlapCounter {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl ImageClassifier for OverlapCounter {
        fn name(&self) -> &str {
            "overlap"
        }

        fn classify(&self, _frame: &Frame, _request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
            let ms = rand::thread_rng().gen_range(1..10);
            std::thread::sleep(Duration::from_millis(ms));
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![Observation::new("x", 1.0)])
        }
    }

    /// Returns fixed scores; fails on odd frame ids when `fail_odd`
    struct Scripted {
        observations: Vec<Observation>,
        fail_odd: bool,
    }

    impl ImageClassifier for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn classify(&self, frame: &Frame, _request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError> {
            if self.fail_odd && frame.id % 2 == 1 {
                return Err(InferenceError("odd frame".to_string()));
            }
            Ok(self.observations.clone())
        }
    }

    /// Holds every classify call until `open` is called
    #[derive(Default)]
    struct Gated {
        open: Mutex<bool>,
        opened: Condvar,
        started: AtomicUsize,
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl Gated {
        fn open(&self) {
            *self.open.lock() = true;
            self.opened.notify_all();
        }
    }

    impl ImageClassifier for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        fn classify(&self, _frame: &Frame, _request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
            self.started.fetch_add(1, Ordering::SeqCst);

            let deadline = Instant::now() + Duration::from_secs(5);
            let mut open = self.open.lock();
            while !*open {
                if self.opened.wait_until(&mut open, deadline).timed_out() {
                    break;
                }
            }
            drop(open);

            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![Observation::new("x", 1.0)])
        }
    }

    /// Remembers the intrinsics each request carried
    #[derive(Default)]
    struct IntrinsicsRecorder {
        seen: Mutex<Vec<Option<CameraIntrinsics>>>,
    }

    impl ImageClassifier for IntrinsicsRecorder {
        fn name(&self) -> &str {
            "intrinsics"
        }

        fn classify(&self, _frame: &Frame, request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError> {
            self.seen.lock().push(request.intrinsics);
            Ok(Vec::new())
        }
    }

    struct Panicking;

    impl ImageClassifier for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn classify(&self, _frame: &Frame, _request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError> {
            panic!("model crashed");
        }
    }

    fn frame(id: u64) -> Frame {
        Frame::solid(id, 4, 4, [0, 0, 0, 255])
    }

    fn config(k: usize) -> ClassifierConfig {
        ClassifierConfig {
            max_in_flight: k,
            ..Default::default()
        }
    }

    fn collecting() -> (CompletionHandler, Arc<Mutex<Vec<ClassificationResult>>>) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        let handler: CompletionHandler = Arc::new(move |r| sink.lock().push(r));
        (handler, results)
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let (handler, _) = collecting();
        assert!(FrameClassifier::new(&config(0), Arc::new(OverlapCounter::default()), handler).is_err());
    }

    #[test]
    fn test_in_flight_never_exceeds_k() {
        let model = Arc::new(OverlapCounter::default());
        let (handler, results) = collecting();
        let classifier = FrameClassifier::new(&config(3), model.clone(), handler).unwrap();

        for id in 0..30 {
            classifier.submit_frame(frame(id));
            assert!(classifier.status().in_flight <= 3);
        }
        classifier.wait_idle();

        assert!(model.max.load(Ordering::SeqCst) <= 3);
        assert!(model.max.load(Ordering::SeqCst) >= 1);
        let status = classifier.status();
        assert!(status.peak_in_flight <= 3);
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.submitted, 30);
        assert_eq!(status.completed, 30);
        assert_eq!(results.lock().len(), 30);
    }

    #[test]
    fn test_slot_selection_is_round_robin() {
        let (handler, _) = collecting();
        let classifier = FrameClassifier::new(&config(3), Arc::new(OverlapCounter::default()), handler).unwrap();

        let slots: Vec<_> = (0..10).map(|id| classifier.submit_frame(frame(id))).collect();
        classifier.wait_idle();

        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
        let status = classifier.status();
        assert!(status.slots.iter().all(|s| *s == SlotState::Idle));
        assert_eq!(status.slot_uses, vec![4, 3, 3]);
    }

    #[test]
    fn test_results_are_ranked() {
        let model = Scripted {
            observations: vec![
                Observation::new("C", 0.3),
                Observation::new("A", 0.9),
                Observation::new("D", 0.1),
                Observation::new("B", 0.5),
            ],
            fail_odd: false,
        };
        let (handler, results) = collecting();
        let classifier = FrameClassifier::new(&config(2), Arc::new(model), handler).unwrap();

        classifier.submit_frame(frame(0));
        classifier.wait_idle();

        let results = results.lock();
        let labels: Vec<_> = results[0].observations.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_failures_do_not_stop_stream() {
        let model = Scripted {
            observations: vec![Observation::new("ok", 0.8)],
            fail_odd: true,
        };
        let (handler, results) = collecting();
        let classifier = FrameClassifier::new(&config(2), Arc::new(model), handler).unwrap();

        for id in 0..6 {
            classifier.submit_frame(frame(id));
        }
        classifier.wait_idle();

        let status = classifier.status();
        assert_eq!(status.completed, 3);
        assert_eq!(status.failed, 3);
        assert_eq!(status.in_flight, 0);

        let mut ids: Vec<_> = results.lock().iter().map(|r| r.frame_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 2, 4]);
    }

    #[test]
    fn test_panic_releases_permit() {
        let (handler, results) = collecting();
        let classifier = FrameClassifier::new(&config(1), Arc::new(Panicking), handler).unwrap();

        classifier.submit_frame(frame(0));
        classifier.submit_frame(frame(1));
        assert!(classifier.wait_idle_for(Duration::from_secs(5)));

        assert_eq!(classifier.status().failed, 2);
        assert!(results.lock().is_empty());
        assert_eq!(classifier.status().slots, vec![SlotState::Idle]);
    }

    #[test]
    fn test_inference_runs_off_the_producer_thread() {
        let model = Arc::new(Gated::default());
        let (handler, results) = collecting();
        let classifier = Arc::new(FrameClassifier::new(&config(2), model.clone(), handler).unwrap());

        // Both submits return while classify is still held at the gate
        classifier.submit_frame(frame(0));
        classifier.submit_frame(frame(1));

        let deadline = Instant::now() + Duration::from_secs(5);
        while model.started.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(model.max.load(Ordering::SeqCst), 2);
        assert_eq!(classifier.status().in_flight, 2);
        assert!(results.lock().is_empty());

        // Third submit waits for a permit
        let producer = {
            let classifier = classifier.clone();
            std::thread::spawn(move || classifier.submit_frame(frame(2)))
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(model.started.load(Ordering::SeqCst), 2);

        model.open();
        producer.join().unwrap();
        classifier.wait_idle();

        assert_eq!(model.max.load(Ordering::SeqCst), 2);
        assert_eq!(results.lock().len(), 3);
    }

    #[test]
    fn test_request_carries_frame_intrinsics() {
        let model = Arc::new(IntrinsicsRecorder::default());
        let (handler, _) = collecting();
        let classifier = FrameClassifier::new(&config(1), model.clone(), handler).unwrap();

        let intrinsics = CameraIntrinsics::pinhole(500.0, 4, 4);
        classifier.submit_frame(frame(0).with_intrinsics(intrinsics));
        classifier.submit_frame(frame(1));
        classifier.wait_idle();

        // Same slot reused, so the second request must not keep stale intrinsics
        assert_eq!(*model.seen.lock(), vec![Some(intrinsics), None]);
    }
}
