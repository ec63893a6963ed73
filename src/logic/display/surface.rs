//! Text surfaces & the results label
//!
//! `ResultsLabel` only ever touches its surface from the main queue.

use std::sync::Arc;
use parking_lot::RwLock;

use super::format::format_results;
use super::main_queue::MainHandle;
use crate::logic::classifier::ClassificationResult;

/// Something that shows a block of text
pub trait TextSurface: Send + Sync {
    fn set_text(&self, text: &str);
}

/// Writes label updates to the log
#[derive(Debug, Default)]
pub struct LogSurface;

impl TextSurface for LogSurface {
    fn set_text(&self, text: &str) {
        log::info!("[results] {}", text.replace('\n', " | "));
    }
}

/// Keeps the latest text in memory
#[derive(Debug, Default)]
pub struct SharedText {
    text: RwLock<String>,
    updates: RwLock<u64>,
}

impl SharedText {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn text(&self) -> String {
        self.text.read().clone()
    }

    pub fn updates(&self) -> u64 {
        *self.updates.read()
    }
}

impl TextSurface for SharedText {
    fn set_text(&self, text: &str) {
        *self.text.write() = text.to_string();
        *self.updates.write() += 1;
    }
}

/// Label showing the latest top-K classification
#[derive(Clone)]
pub struct ResultsLabel {
    surface: Arc<dyn TextSurface>,
    main: MainHandle,
    top_k: usize,
}

impl ResultsLabel {
    pub fn new(surface: Arc<dyn TextSurface>, main: MainHandle, top_k: usize) -> Self {
        Self { surface, main, top_k }
    }

    /// Overwrites whatever is shown; callable from any thread
    pub fn show(&self, result: &ClassificationResult) {
        let text = format_results(&result.observations, self.top_k);
        let surface = self.surface.clone();
        self.main.dispatch(move || surface.set_text(&text));
    }
}
