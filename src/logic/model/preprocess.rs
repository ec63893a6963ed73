//! Preprocessing - Frame -> model input tensor
//!
//! Orientation-aware crop/scale, nearest-neighbour resample,
//! BGRA -> RGB planar (NCHW) with per-channel normalization.

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::logic::capture::Frame;
use super::inference::InferenceError;

/// How the frame is fitted into the square model input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropAndScale {
    /// Largest centered square, then scale
    #[default]
    CenterCrop,
    /// Whole frame, aspect preserved, zero padding
    ScaleFit,
    /// Whole frame stretched to the square
    ScaleFill,
}

/// Per-channel normalization (RGB order), applied after scaling to [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }
}

impl Normalization {
    /// ImageNet statistics
    pub fn imagenet() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Fill `out` with a (1, 3, size, size) tensor. `out` is resized in place, never shrunk.
pub fn fill_input(
    frame: &Frame,
    size: usize,
    crop: CropAndScale,
    norm: &Normalization,
    out: &mut Vec<f32>,
) -> Result<(), InferenceError> {
    let (w, h) = (frame.width(), frame.height());
    if w == 0 || h == 0 || size == 0 {
        return Err(InferenceError(format!("Empty image ({}x{} -> {})", w, h, size)));
    }
    if frame.pixels.shape()[2] < 3 {
        return Err(InferenceError("Expected BGRA pixels".to_string()));
    }

    let orientation = frame.orientation;
    let (uw, uh) = if orientation.swaps_axes() { (h, w) } else { (w, h) };

    let plane = size * size;
    out.resize(3 * plane, 0.0);

    let std = norm.std.map(|s| if s.abs() < 1e-8 { 1.0 } else { s });
    let pad = [
        (0.0 - norm.mean[0]) / std[0],
        (0.0 - norm.mean[1]) / std[1],
        (0.0 - norm.mean[2]) / std[2],
    ];

    for oy in 0..size {
        for ox in 0..size {
            let idx = oy * size + ox;
            let Some((ux, uy)) = upright_coords(crop, ox, oy, size, uw, uh) else {
                out[idx] = pad[0];
                out[plane + idx] = pad[1];
                out[2 * plane + idx] = pad[2];
                continue;
            };

            let (sx, sy) = orientation.source_coords(ux, uy, w, h);
            let b = frame.pixels[[sy, sx, 0]] as f32 / 255.0;
            let g = frame.pixels[[sy, sx, 1]] as f32 / 255.0;
            let r = frame.pixels[[sy, sx, 2]] as f32 / 255.0;

            out[idx] = (r - norm.mean[0]) / std[0];
            out[plane + idx] = (g - norm.mean[1]) / std[1];
            out[2 * plane + idx] = (b - norm.mean[2]) / std[2];
        }
    }

    Ok(())
}

/// Output pixel -> upright image pixel; `None` inside letterbox padding
fn upright_coords(crop: CropAndScale, ox: usize, oy: usize, size: usize, uw: usize, uh: usize) -> Option<(usize, usize)> {
    match crop {
        CropAndScale::CenterCrop => {
            let side = uw.min(uh);
            let x0 = (uw - side) / 2;
            let y0 = (uh - side) / 2;
            Some((x0 + ox * side / size, y0 + oy * side / size))
        }
        CropAndScale::ScaleFill => Some((ox * uw / size, oy * uh / size)),
        CropAndScale::ScaleFit => {
            let longest = uw.max(uh);
            let cw = (uw * size / longest).max(1);
            let ch = (uh * size / longest).max(1);
            let px = (size - cw) / 2;
            let py = (size - ch) / 2;
            if ox < px || ox >= px + cw || oy < py || oy >= py + ch {
                return None;
            }
            Some(((ox - px) * uw / cw, (oy - py) * uh / ch))
        }
    }
}

/// Copy the flat buffer into a (1, 3, size, size) array
pub fn to_array(input: &[f32], size: usize) -> Result<Array4<f32>, InferenceError> {
    Array4::from_shape_vec((1, 3, size, size), input.to_vec())
        .map_err(|e| InferenceError(format!("Array error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::capture::Orientation;
    use ndarray::Array3;

    #[test]
    fn test_solid_frame_rgb_planes() {
        // BGRA: blue=0, green=128, red=255
        let frame = Frame::solid(0, 8, 4, [0, 128, 255, 255]);
        let mut out = Vec::new();
        fill_input(&frame, 2, CropAndScale::CenterCrop, &Normalization::default(), &mut out).unwrap();

        assert_eq!(out.len(), 12);
        assert!(out[..4].iter().all(|v| (*v - 1.0).abs() < 1e-6));
        assert!(out[4..8].iter().all(|v| (*v - 128.0 / 255.0).abs() < 1e-6));
        assert!(out[8..].iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_center_crop_takes_middle() {
        // 4x2 frame: left and right columns red, middle two columns green
        let pixels = Array3::from_shape_fn((2, 4, 4), |(_, x, c)| {
            let bgra = if x == 1 || x == 2 { [0, 255, 0, 255] } else { [0, 0, 255, 255] };
            bgra[c]
        });
        let frame = Frame::new(0, pixels, Orientation::Up);
        let mut out = Vec::new();
        fill_input(&frame, 2, CropAndScale::CenterCrop, &Normalization::default(), &mut out).unwrap();

        // red plane all zero, green plane all one
        assert!(out[..4].iter().all(|v| *v == 0.0));
        assert!(out[4..8].iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_scale_fit_pads() {
        let frame = Frame::solid(0, 4, 2, [255, 255, 255, 255]);
        let mut out = Vec::new();
        fill_input(&frame, 4, CropAndScale::ScaleFit, &Normalization::default(), &mut out).unwrap();

        // content rows 1..3, padding rows 0 and 3
        let red = &out[..16];
        assert!(red[..4].iter().all(|v| *v == 0.0));
        assert!(red[4..12].iter().all(|v| *v == 1.0));
        assert!(red[12..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_buffer_reused() {
        let frame = Frame::solid(0, 4, 4, [0, 0, 0, 255]);
        let mut out = Vec::with_capacity(3 * 16);
        let ptr = out.as_ptr();
        fill_input(&frame, 4, CropAndScale::ScaleFill, &Normalization::default(), &mut out).unwrap();
        fill_input(&frame, 4, CropAndScale::ScaleFill, &Normalization::default(), &mut out).unwrap();
        assert_eq!(out.as_ptr(), ptr);
    }

    #[test]
    fn test_to_array_shape() {
        let arr = to_array(&vec![0.0; 3 * 9], 3).unwrap();
        assert_eq!(arr.shape(), &[1, 3, 3, 3]);
        assert!(to_array(&[0.0; 5], 3).is_err());
    }
}
