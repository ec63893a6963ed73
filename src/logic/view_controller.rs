//! View Controller - wires camera -> classifier -> results label
//!
//! Registers itself as a weak capture delegate, starts capture only after a
//! successful setup, and routes every completed classification to the label.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};

use crate::logic::capture::{CaptureDelegate, CaptureStats, DeviceProvider, Frame, SessionPreset, VideoCapture};
use crate::logic::classifier::{ClassifierError, ClassifierStatus, CompletionHandler, FrameClassifier};
use crate::logic::config::AppConfig;
use crate::logic::display::{MainHandle, ResultsLabel, TextSurface};
use crate::logic::model::ImageClassifier;

/// How long shutdown waits for in-flight classifications
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ViewController {
    capture: VideoCapture,
    classifier: FrameClassifier,
    main: MainHandle,
    preset: SessionPreset,
    /// None until setup completes, then the setup outcome
    setup_state: Mutex<Option<bool>>,
    setup_done: Condvar,
}

impl ViewController {
    pub fn new(
        config: &AppConfig,
        provider: DeviceProvider,
        model: Arc<dyn ImageClassifier>,
        surface: Arc<dyn TextSurface>,
        main: MainHandle,
    ) -> Result<Arc<Self>, ClassifierError> {
        let label = ResultsLabel::new(surface, main.clone(), config.display.top_k);
        let on_complete: CompletionHandler = Arc::new(move |result| label.show(&result));
        let classifier = FrameClassifier::new(&config.classifier, model, on_complete)?;

        let capture = VideoCapture::new(provider);
        capture.set_frame_interval(config.camera.frame_interval);

        let controller = Arc::new(Self {
            capture,
            classifier,
            main,
            preset: config.camera.session_preset,
            setup_state: Mutex::new(None),
            setup_done: Condvar::new(),
        });

        let delegate: Weak<dyn CaptureDelegate> = Arc::downgrade(&controller) as Weak<dyn CaptureDelegate>;
        controller.capture.set_delegate(delegate);

        Ok(controller)
    }

    /// Kick off camera setup; capture starts from the main queue once it succeeds
    pub fn view_did_load(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.capture.setup(self.preset, self.main.clone(), move |success| {
            if let Some(controller) = weak.upgrade() {
                controller.setup_finished(success);
            }
        });
    }

    fn setup_finished(&self, success: bool) {
        let started = if success {
            match self.capture.start() {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Failed to start capture: {}", e);
                    false
                }
            }
        } else {
            log::error!("Camera setup failed - capture not started");
            false
        };

        *self.setup_state.lock() = Some(started);
        self.setup_done.notify_all();
    }

    /// Wait for setup to finish. `None` on timeout, else whether capture is running.
    pub fn wait_until_ready(&self, timeout: Duration) -> Option<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.setup_state.lock();
        while state.is_none() {
            if self.setup_done.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state
    }

    /// Block until the camera stream ends and in-flight work drains
    pub fn wait_for_stream_end(&self) {
        self.capture.wait();
        self.classifier.wait_idle();
        self.main.flush();
    }

    /// Stop capture, let in-flight classifications finish, unregister
    pub fn shutdown(&self) {
        self.capture.stop();
        if !self.classifier.wait_idle_for(DRAIN_TIMEOUT) {
            log::warn!("Shutdown: classifications still in flight after {:?}", DRAIN_TIMEOUT);
        }
        self.capture.clear_delegate();
        self.main.flush();
        log::info!("View controller shut down");
    }

    pub fn classifier_status(&self) -> ClassifierStatus {
        self.classifier.status()
    }

    pub fn capture_stats(&self) -> CaptureStats {
        self.capture.stats()
    }

    /// False before setup, after shutdown, and once the camera stream ends
    pub fn is_capturing(&self) -> bool {
        self.capture.is_running()
    }
}

impl CaptureDelegate for ViewController {
    fn did_capture_frame(&self, frame: Frame) {
        // Blocks the capture queue while K requests are in flight
        self.classifier.submit_frame(frame);
    }
}
