// THEORY:
// The detection core never touches pixels directly. It asks a `Frame` for two
// things: the mean brightness that drives the adaptive threshold, and the list
// of blob candidates under that threshold. This keeps the camera firmware's blob
// finder, a host-side image file and a synthetic test pattern interchangeable.
//
// `GrayFrame` is the host implementation, backed by `image::GrayImage` and the
// reference `blob_detector`.

use crate::core_modules::blob_detector::{blob_detector, SegmentationLimits};
use crate::core_modules::candidate::BlobCandidate;
use crate::core_modules::threshold::Threshold;
use image::{DynamicImage, GrayImage};

/// One captured camera frame, as seen by the detection core.
pub trait Frame {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Mean luminance over the whole frame, in `[0, 255]`.
    fn mean_luminance(&self) -> f64;
    /// Segments the frame under `threshold`.
    fn blob_candidates(&self, threshold: Threshold, limits: SegmentationLimits) -> Vec<BlobCandidate>;
}

/// A grayscale frame held in memory.
#[derive(Debug, Clone)]
pub struct GrayFrame {
    image: GrayImage,
}

impl GrayFrame {
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    /// Converts any decoded image to 8-bit luminance.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_luma8())
    }

    /// Wraps a row-major luminance buffer. Returns `None` when the length does
    /// not match the dimensions.
    pub fn from_raw(width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, luma).map(Self::new)
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }
}

impl Frame for GrayFrame {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn mean_luminance(&self) -> f64 {
        let raw = self.image.as_raw();
        if raw.is_empty() {
            return 0.0;
        }
        let sum: u64 = raw.iter().map(|&v| v as u64).sum();
        sum as f64 / raw.len() as f64
    }

    fn blob_candidates(&self, threshold: Threshold, limits: SegmentationLimits) -> Vec<BlobCandidate> {
        blob_detector::find_blobs(
            self.image.as_raw(),
            self.image.width(),
            self.image.height(),
            threshold,
            limits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::threshold::ThresholdMode;
    use image::Luma;

    #[test]
    fn mean_luminance_averages_every_pixel() {
        let frame = GrayFrame::from_raw(2, 2, vec![0, 100, 200, 100]).unwrap();
        assert_eq!(frame.mean_luminance(), 100.0);
    }

    #[test]
    fn from_raw_rejects_mismatched_buffers() {
        assert!(GrayFrame::from_raw(4, 4, vec![0; 15]).is_none());
    }

    #[test]
    fn dark_square_on_bright_floor() {
        let image = GrayImage::from_fn(64, 48, |x, y| {
            if (20..40).contains(&x) && (10..30).contains(&y) {
                Luma([20])
            } else {
                Luma([180])
            }
        });
        let frame = GrayFrame::new(image);
        let threshold = Threshold::from_brightness(frame.mean_luminance(), 30.0, ThresholdMode::Dark);
        let blobs = frame.blob_candidates(threshold, SegmentationLimits::default());

        assert_eq!(blobs.len(), 1);
        assert_eq!((blobs[0].x, blobs[0].y, blobs[0].width, blobs[0].height), (20, 10, 20, 20));
        assert_eq!(blobs[0].pixels, 400);
    }
}
