//! Fallback heuristic classifier (no model)
//!
//! Labels the dominant color of the center crop.

use crate::logic::capture::Frame;
use super::inference::{ImageClassifier, InferenceError, Observation, VisionRequest};
use super::preprocess::{fill_input, Normalization};

/// Sampling grid for the heuristic
const SAMPLE_SIZE: usize = 32;

/// Saturation below this counts as gray
const GRAY_SATURATION: f32 = 0.15;

#[derive(Debug, Default)]
pub struct ColorClassifier;

impl ColorClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ImageClassifier for ColorClassifier {
    fn name(&self) -> &str {
        "fallback"
    }

    fn classify(&self, frame: &Frame, request: &mut VisionRequest) -> Result<Vec<Observation>, InferenceError> {
        fill_input(frame, SAMPLE_SIZE, request.crop_and_scale, &Normalization::default(), &mut request.input)?;

        let plane = SAMPLE_SIZE * SAMPLE_SIZE;
        let mean = |c: usize| request.input[c * plane..(c + 1) * plane].iter().sum::<f32>() / plane as f32;
        let (r, g, b) = (mean(0), mean(1), mean(2));

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let saturation = if max > 0.0 { (max - min) / max } else { 0.0 };

        let total = r + g + b;
        if total <= f32::EPSILON {
            return Ok(vec![Observation::new("black", 1.0)]);
        }

        // Gray takes the share the color channels lose to low saturation
        let gray = (1.0 - saturation / GRAY_SATURATION).clamp(0.0, 1.0);
        let color_share = 1.0 - gray;

        Ok(vec![
            Observation::new("red", color_share * r / total),
            Observation::new("green", color_share * g / total),
            Observation::new("blue", color_share * b / total),
            Observation::new("gray", gray),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::inference::rank;
    use crate::logic::model::preprocess::CropAndScale;

    fn classify(bgra: [u8; 4]) -> Vec<Observation> {
        let frame = Frame::solid(0, 16, 16, bgra);
        let mut request = VisionRequest::new(0, CropAndScale::CenterCrop);
        let mut obs = ColorClassifier::new().classify(&frame, &mut request).unwrap();
        rank(&mut obs);
        obs
    }

    #[test]
    fn test_dominant_red() {
        let obs = classify([10, 10, 250, 255]);
        assert_eq!(obs[0].label, "red");
        assert!(obs[0].confidence > 0.8);
    }

    #[test]
    fn test_gray_and_black() {
        assert_eq!(classify([128, 128, 128, 255])[0].label, "gray");
        assert_eq!(classify([0, 0, 0, 255])[0].label, "black");
    }

    #[test]
    fn test_confidences_sum_to_one() {
        let obs = classify([40, 200, 90, 255]);
        let sum: f32 = obs.iter().map(|o| o.confidence).sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
