// THEORY:
// The `pipeline` module is the top-level API of the detection core. One call
// runs one complete detection cycle: one camera frame plus one distance reading
// in, one `(x_offset, width, distance)` triple out.
//
// The cycle is a fixed sequence of stages:
//
//   AwaitFrame -> Segment -> Filter -> Select -> (NoTarget | Measure)
//              -> SmoothOrZero -> Emit
//
// Every stage up to `Select` is a pure function of the current frame. The only
// state carried from one cycle to the next is the `SmoothingBuffer`, owned here.
// A cycle without a usable target short-circuits straight to emitting the zero
// sentinel and leaves the buffer untouched. A cycle with a target always feeds
// the buffer, but only reports a value once the buffer holds a full window.
//
// Pixel-to-millimetre conversion is applied exactly once, at the end, to the
// smoothed pixel/mm means. The buffer itself only ever holds raw values.

use crate::config::PipelineConfig;
use crate::core_modules::candidate_filter::filter_candidates;
use crate::core_modules::frame::Frame;
use crate::core_modules::geometry::GeometryConverter;
use crate::core_modules::smoothing::SmoothingBuffer;
use crate::core_modules::target_selector::{
    frame_center, select_target, DistanceReading, Rejection,
};
use crate::core_modules::threshold::Threshold;
use crate::error::Result;
use crate::sources::{FrameSource, RangeSensor};
use serde::Serialize;
use tracing::{debug, trace};

// Re-export key data structures for the public API.
pub use crate::core_modules::candidate::{BlobCandidate, Point};
pub use crate::core_modules::geometry::{Measurement, RawMeasurement};

/// The stages of one detection cycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    AwaitFrame,
    Segment,
    Filter,
    Select,
    NoTarget,
    Measure,
    SmoothOrZero,
    Emit,
}

/// Why a cycle ended without a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoTargetReason {
    /// Segmentation produced nothing.
    NoCandidates,
    /// The distance reading was missing or out of range.
    InvalidDistance,
    /// Every candidate was rejected by the filter.
    NoSurvivors,
    /// Nothing covered the beam and the policy has no fallback.
    NoLineOfSight,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CycleOutcome {
    NoTarget { reason: NoTargetReason },
    /// A target was recorded but the smoothing window is not full yet.
    Filling { buffered: usize, capacity: usize },
    /// A full window was averaged and converted.
    Smoothed { mean: RawMeasurement },
}

/// Everything one cycle learned about its frame, before smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub frame_width: u32,
    pub frame_height: u32,
    pub brightness: f64,
    pub threshold: Threshold,
    pub distance: DistanceReading,
    pub target: Option<BlobCandidate>,
    pub raw: std::result::Result<RawMeasurement, NoTargetReason>,
}

/// The final output of the pipeline for a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// The triple handed to the transport layer.
    pub measurement: Measurement,
    pub outcome: CycleOutcome,
    pub detection: Detection,
}

impl CycleReport {
    pub fn has_target(&self) -> bool {
        self.detection.target.is_some()
    }
}

/// Pre-segmented inputs for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleInput {
    pub frame_width: u32,
    pub frame_height: u32,
    pub brightness: f64,
    pub candidates: Vec<BlobCandidate>,
    pub distance: DistanceReading,
}

/// A frame together with the report computed from it.
#[derive(Debug, Clone)]
pub struct Captured<F> {
    pub frame: F,
    pub report: CycleReport,
}

/// Runs the stateless stages (filter and select) on pre-segmented inputs.
pub fn detect(config: &PipelineConfig, input: CycleInput) -> Detection {
    let threshold = Threshold::from_brightness(
        input.brightness,
        config.offset_threshold,
        config.threshold_mode,
    );
    let mut detection = Detection {
        frame_width: input.frame_width,
        frame_height: input.frame_height,
        brightness: input.brightness,
        threshold,
        distance: input.distance,
        target: None,
        raw: Err(NoTargetReason::NoCandidates),
    };

    if input.candidates.is_empty() {
        return detection;
    }

    trace!(stage = ?CycleStage::Filter, candidates = input.candidates.len());
    let limits = config.candidate_limits(input.frame_width, input.frame_height);
    let survivors = filter_candidates(input.candidates, &limits);

    trace!(stage = ?CycleStage::Select, survivors = survivors.len());
    let center = frame_center(input.frame_width, input.frame_height);
    match select_target(
        &survivors,
        center,
        input.distance,
        &config.distance_gate(),
        config.selection,
    ) {
        Ok(selection) => {
            trace!(stage = ?CycleStage::Measure, line_of_sight = selection.line_of_sight);
            let target = selection.target;
            detection.raw = Ok(RawMeasurement::new(
                target.x as i32,
                target.x_max() as i32,
                selection.distance_mm,
            ));
            detection.target = Some(target.clone());
        }
        Err(rejection) => {
            let reason = match rejection {
                // The list was non-empty before filtering.
                Rejection::NoCandidates => NoTargetReason::NoSurvivors,
                Rejection::InvalidDistance => NoTargetReason::InvalidDistance,
                Rejection::NoLineOfSight => NoTargetReason::NoLineOfSight,
            };
            detection.raw = Err(reason);
        }
    }
    detection
}

/// Turns a detection plus the smoothing result into the emitted report.
pub fn report(
    config: &PipelineConfig,
    detection: Detection,
    smoothed: Option<RawMeasurement>,
    buffered: usize,
) -> CycleReport {
    let (measurement, outcome) = match (&detection.raw, smoothed) {
        (Err(reason), _) => (
            Measurement::ZERO,
            CycleOutcome::NoTarget { reason: *reason },
        ),
        (Ok(_), Some(mean)) => {
            let geometry = GeometryConverter::new(config.focal_length_px, detection.frame_width);
            (geometry.convert(&mean), CycleOutcome::Smoothed { mean })
        }
        (Ok(_), None) => (
            Measurement::ZERO,
            CycleOutcome::Filling {
                buffered,
                capacity: config.smoothing_window_size,
            },
        ),
    };
    trace!(stage = ?CycleStage::Emit, ?measurement);
    CycleReport {
        measurement,
        outcome,
        detection,
    }
}

/// The single-threaded cycle orchestrator.
pub struct ObstaclePipeline {
    config: PipelineConfig,
    smoothing: SmoothingBuffer,
    cycles: u64,
}

impl ObstaclePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            smoothing: SmoothingBuffer::new(config.smoothing_window_size),
            config,
            cycles: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn smoothing(&self) -> &SmoothingBuffer {
        &self.smoothing
    }

    /// Number of cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs one cycle on pre-segmented inputs.
    pub fn run_cycle(&mut self, input: CycleInput) -> CycleReport {
        self.cycles += 1;
        let detection = detect(&self.config, input);

        trace!(stage = ?CycleStage::SmoothOrZero);
        let smoothed = match &detection.raw {
            Ok(raw) => self.smoothing.record(*raw),
            Err(reason) => {
                trace!(stage = ?CycleStage::NoTarget, ?reason);
                None
            }
        };
        let report = report(&self.config, detection, smoothed, self.smoothing.len());
        debug!(cycle = self.cycles, outcome = ?report.outcome, measurement = ?report.measurement, "cycle complete");
        report
    }

    /// Runs one cycle on a captured frame, segmenting it first.
    pub fn process_frame<F: Frame>(&mut self, frame: &F, distance: DistanceReading) -> CycleReport {
        let brightness = frame.mean_luminance();
        let threshold = Threshold::from_brightness(
            brightness,
            self.config.offset_threshold,
            self.config.threshold_mode,
        );
        trace!(stage = ?CycleStage::Segment, brightness, ?threshold);
        let candidates = frame.blob_candidates(threshold, self.config.segmentation_limits());
        self.run_cycle(CycleInput {
            frame_width: frame.width(),
            frame_height: frame.height(),
            brightness,
            candidates,
            distance,
        })
    }

    /// Pulls one frame and one reading from the collaborators and runs a cycle.
    pub fn step<S, R>(&mut self, source: &mut S, sensor: &mut R) -> Result<Captured<S::Frame>>
    where
        S: FrameSource,
        R: RangeSensor,
    {
        trace!(stage = ?CycleStage::AwaitFrame);
        let frame = source.next_frame()?;
        let distance = sensor.read_distance_mm()?;
        let report = self.process_frame(&frame, distance);
        Ok(Captured { frame, report })
    }
}
