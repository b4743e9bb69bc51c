// THEORY:
// The ranging sensor is mounted so that its beam hits the center of the camera
// frame. The selector's job is to decide which of the frame's candidates the
// distance reading actually belongs to, and it does so in two tiers:
//
// 1.  **Line of sight**: a candidate whose bounding box contains the frame
//     center is, very plausibly, the thing the beam is hitting. The first such
//     candidate in upstream order wins outright.
// 2.  **Nearest fallback**: otherwise the candidate whose centroid is closest to
//     the center is taken as a proxy. Comparison is strict, so on an exact tie
//     the earlier candidate stays selected.
//
// Before either tier runs, the distance reading is gated. A missing or
// out-of-range reading means the beam is not seeing anything usable, and the
// cycle reports no target at all, even when the camera sees candidates.
//
// The selector is a stateless utility, like the other per-frame stages. It
// neither reorders nor remembers candidates; upstream order is treated as a
// black box and preserved.

use crate::core_modules::candidate::{BlobCandidate, Point};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_VALID_DISTANCE_MM: i32 = 40;
pub const DEFAULT_MAX_VALID_DISTANCE_MM: i32 = 2000;

/// One millimetre reading from the ranging sensor, or `None` when the sensor
/// had nothing valid to report.
pub type DistanceReading = Option<i32>;

/// How a target is picked among the surviving candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Line-of-sight hit, else the candidate nearest the center.
    #[default]
    LineOfSightThenNearest,
    /// Line-of-sight hit only.
    LineOfSightOnly,
    /// Largest bounding box, ignoring the beam.
    LargestArea,
}

/// Accepted range of distance readings. Both ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceGate {
    pub min_mm: i32,
    pub max_mm: Option<i32>,
}

impl Default for DistanceGate {
    fn default() -> Self {
        Self {
            min_mm: DEFAULT_MIN_VALID_DISTANCE_MM,
            max_mm: Some(DEFAULT_MAX_VALID_DISTANCE_MM),
        }
    }
}

impl DistanceGate {
    /// Returns the reading if it is usable.
    pub fn admit(&self, reading: DistanceReading) -> Option<i32> {
        let distance = reading?;
        if distance <= self.min_mm {
            return None;
        }
        match self.max_mm {
            Some(max) if distance >= max => None,
            _ => Some(distance),
        }
    }
}

/// Why a selection came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NoCandidates,
    InvalidDistance,
    NoLineOfSight,
}

/// The selected candidate and the reading that was admitted alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub target: &'a BlobCandidate,
    pub distance_mm: i32,
    /// True when the target was chosen by containing the frame center.
    pub line_of_sight: bool,
}

/// Frame center used as the beam's aim point, `(W/2, H/2)` in integer pixels.
pub fn frame_center(width: u32, height: u32) -> Point {
    Point::new(width / 2, height / 2)
}

/// Picks at most one candidate for this cycle.
pub fn select_target<'a>(
    candidates: &'a [BlobCandidate],
    center: Point,
    reading: DistanceReading,
    gate: &DistanceGate,
    policy: SelectionPolicy,
) -> Result<Selection<'a>, Rejection> {
    if candidates.is_empty() {
        return Err(Rejection::NoCandidates);
    }
    let distance_mm = gate.admit(reading).ok_or(Rejection::InvalidDistance)?;

    if policy == SelectionPolicy::LargestArea {
        let target = largest_area(candidates).ok_or(Rejection::NoCandidates)?;
        return Ok(Selection {
            target,
            distance_mm,
            line_of_sight: target.contains(center),
        });
    }

    if let Some(target) = candidates.iter().find(|c| c.contains(center)) {
        return Ok(Selection {
            target,
            distance_mm,
            line_of_sight: true,
        });
    }

    if policy == SelectionPolicy::LineOfSightOnly {
        return Err(Rejection::NoLineOfSight);
    }

    let target = nearest_to(candidates, center).ok_or(Rejection::NoCandidates)?;
    Ok(Selection {
        target,
        distance_mm,
        line_of_sight: false,
    })
}

/// Candidate whose centroid is closest to `center`; the first one wins ties.
pub fn nearest_to(candidates: &[BlobCandidate], center: Point) -> Option<&BlobCandidate> {
    let mut nearest: Option<&BlobCandidate> = None;
    let mut nearest_dist = f64::INFINITY;
    for candidate in candidates {
        let dist = candidate.centroid_distance(center);
        if dist < nearest_dist {
            nearest_dist = dist;
            nearest = Some(candidate);
        }
    }
    nearest
}

fn largest_area(candidates: &[BlobCandidate]) -> Option<&BlobCandidate> {
    let mut largest: Option<&BlobCandidate> = None;
    for candidate in candidates {
        if largest.is_none_or(|best| candidate.box_area() > best.box_area()) {
            largest = Some(candidate);
        }
    }
    largest
}
