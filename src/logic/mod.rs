//! Logic Module - Capture, Classification & Display engines
//!
//! ## Architecture
//! - `capture/` - Camera session, late-frame dropping, delegate delivery
//! - `model/` - Image classifiers (ONNX, fallback heuristics)
//! - `classifier/` - Bounded in-flight inference (permits + round-robin slots)
//! - `display/` - Main queue, results label, formatting

pub mod config;
pub mod view_controller;

pub mod capture;
pub mod model;
pub mod classifier;
pub mod display;
