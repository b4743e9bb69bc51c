//! Pipeline configuration.
//!
//! Every deployment variant of the module differs only in a handful of
//! constants, so they all share this one struct. Values can come from a YAML
//! file; anything left out falls back to the reference module's defaults.

use crate::core_modules::blob_detector::SegmentationLimits;
use crate::core_modules::candidate_filter::{CandidateLimits, DEFAULT_MAX_FRACTION};
use crate::core_modules::geometry::DEFAULT_FOCAL_LENGTH_PX;
use crate::core_modules::smoothing::DEFAULT_WINDOW_SIZE;
use crate::core_modules::target_selector::{
    DistanceGate, SelectionPolicy, DEFAULT_MAX_VALID_DISTANCE_MM, DEFAULT_MIN_VALID_DISTANCE_MM,
};
use crate::core_modules::threshold::{ThresholdMode, DEFAULT_OFFSET};
use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable behavior of the obstacle pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Grey levels between the background mean and the obstacle threshold.
    pub offset_threshold: f64,
    /// Minimum pixel count for a region to become a candidate.
    pub min_pixels: u32,
    /// Minimum bounding-box area for a region to become a candidate.
    pub min_area: u32,
    /// Share of the frame at or above which a candidate is treated as background.
    pub max_fraction: f64,
    /// Exclusive bounding-box area bounds used by the area-bounded variant.
    pub area_bounds: Option<(u32, u32)>,
    pub min_valid_distance_mm: i32,
    pub max_valid_distance_mm: Option<i32>,
    pub focal_length_px: f64,
    pub smoothing_window_size: usize,
    pub threshold_mode: ThresholdMode,
    pub selection: SelectionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            offset_threshold: DEFAULT_OFFSET,
            min_pixels: 300,
            min_area: 300,
            max_fraction: DEFAULT_MAX_FRACTION,
            area_bounds: None,
            min_valid_distance_mm: DEFAULT_MIN_VALID_DISTANCE_MM,
            max_valid_distance_mm: Some(DEFAULT_MAX_VALID_DISTANCE_MM),
            focal_length_px: DEFAULT_FOCAL_LENGTH_PX,
            smoothing_window_size: DEFAULT_WINDOW_SIZE,
            threshold_mode: ThresholdMode::Dark,
            selection: SelectionPolicy::LineOfSightThenNearest,
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.smoothing_window_size == 0 {
            return Err(invalid("smoothing_window_size must be at least 1"));
        }
        if !(self.focal_length_px > 0.0) {
            return Err(invalid("focal_length_px must be positive"));
        }
        if !(self.max_fraction > 0.0 && self.max_fraction <= 1.0) {
            return Err(invalid("max_fraction must lie in (0, 1]"));
        }
        if !(0.0..=255.0).contains(&self.offset_threshold) {
            return Err(invalid("offset_threshold must lie in [0, 255]"));
        }
        if let Some(max) = self.max_valid_distance_mm {
            if self.min_valid_distance_mm >= max {
                return Err(invalid("min_valid_distance_mm must be below max_valid_distance_mm"));
            }
        }
        if let Some((min, max)) = self.area_bounds {
            if min >= max {
                return Err(invalid("area_bounds must be (min, max) with min < max"));
            }
        }
        Ok(())
    }

    pub fn distance_gate(&self) -> DistanceGate {
        DistanceGate {
            min_mm: self.min_valid_distance_mm,
            max_mm: self.max_valid_distance_mm,
        }
    }

    pub fn segmentation_limits(&self) -> SegmentationLimits {
        SegmentationLimits {
            min_pixels: self.min_pixels,
            min_area: self.min_area,
        }
    }

    pub fn candidate_limits(&self, frame_width: u32, frame_height: u32) -> CandidateLimits {
        CandidateLimits {
            frame_width,
            frame_height,
            max_fraction: self.max_fraction,
            area_bounds: self.area_bounds.map(|(min, max)| (min as u64, max as u64)),
        }
    }
}

fn invalid(message: &str) -> VisionError {
    VisionError::InvalidConfig(message.to_string())
}
