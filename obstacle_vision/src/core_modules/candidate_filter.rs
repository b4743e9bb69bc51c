//! Rejects candidates that cannot be a real obstacle.
//!
//! The main failure mode of background-relative thresholding is a frame where
//! the whole background itself passes the threshold and comes back as one giant
//! blob. Those are dropped by pixel count. Simpler deployments instead bound the
//! bounding-box area on both sides.

use crate::core_modules::candidate::BlobCandidate;

/// Default share of the frame above which a blob is treated as background.
pub const DEFAULT_MAX_FRACTION: f64 = 0.95;

/// Limits applied to the upstream candidate list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateLimits {
    pub frame_width: u32,
    pub frame_height: u32,
    pub max_fraction: f64,
    /// Exclusive `(min, max)` bounds on the bounding-box area.
    pub area_bounds: Option<(u64, u64)>,
}

impl CandidateLimits {
    /// Pixel count at or above which a candidate is rejected.
    pub fn max_pixels(&self) -> f64 {
        self.max_fraction * self.frame_width as f64 * self.frame_height as f64
    }

    pub fn accepts(&self, candidate: &BlobCandidate) -> bool {
        if candidate.pixels as f64 >= self.max_pixels() {
            return false;
        }
        match self.area_bounds {
            Some((min_area, max_area)) => {
                let area = candidate.box_area();
                min_area < area && area < max_area
            }
            None => true,
        }
    }
}

/// Keeps the acceptable candidates, preserving their order.
pub fn filter_candidates(candidates: Vec<BlobCandidate>, limits: &CandidateLimits) -> Vec<BlobCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| limits.accepts(candidate))
        .collect()
}
