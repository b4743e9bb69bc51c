// THEORY:
// Pixel extents become millimetres through the pinhole-camera similar-triangles
// relation: an object `w` pixels wide at distance `d` is roughly
// `w * d / f` millimetres wide, where `f` is the focal length expressed in
// pixels. The same relation turns the horizontal offset of the object's left
// edge from the frame center into a lateral offset (negative = left).
//
// The focal length is a calibration constant. `CameraModel` documents how it is
// derived from the sensor datasheet plus an empirically tuned correction, but the
// pipeline only ever sees the resulting number.
//
// Conversion happens once per cycle, on the smoothed pixel/mm triple coming out
// of the smoothing buffer, never on the raw per-frame values.

use serde::{Deserialize, Serialize};

/// Focal length of the reference module at QVGA, tuned.
pub const DEFAULT_FOCAL_LENGTH_PX: f64 = 348.0;

/// The pixel/mm triple recorded per cycle: the target's horizontal extent in
/// pixels plus the distance reading in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub x_min: i32,
    pub x_max: i32,
    pub distance: i32,
}

impl RawMeasurement {
    pub fn new(x_min: i32, x_max: i32, distance: i32) -> Self {
        Self {
            x_min,
            x_max,
            distance,
        }
    }
}

/// The triple shipped to the downstream consumer: lateral offset of the
/// obstacle's left edge, its width and its distance, all in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub x_offset_mm: i16,
    pub width_mm: i16,
    pub distance_mm: i16,
}

impl Measurement {
    /// Reported on cold start and on cycles without a usable target.
    pub const ZERO: Measurement = Measurement {
        x_offset_mm: 0,
        width_mm: 0,
        distance_mm: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Converts pixel extents at a known distance into millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryConverter {
    pub focal_length_px: f64,
    /// Horizontal frame center in pixels (`W/2`).
    pub center_x: i32,
}

impl GeometryConverter {
    pub fn new(focal_length_px: f64, frame_width: u32) -> Self {
        Self {
            focal_length_px,
            center_x: (frame_width / 2) as i32,
        }
    }

    /// Object width in millimetres, unrounded.
    pub fn width_mm(&self, raw: &RawMeasurement) -> f64 {
        (raw.x_max - raw.x_min) as f64 * raw.distance as f64 / self.focal_length_px
    }

    /// Offset of the object's left edge from the frame center, unrounded.
    pub fn offset_mm(&self, raw: &RawMeasurement) -> f64 {
        (raw.x_min - self.center_x) as f64 * raw.distance as f64 / self.focal_length_px
    }

    /// Converts and truncates toward zero, saturating into the wire range.
    pub fn convert(&self, raw: &RawMeasurement) -> Measurement {
        Measurement {
            x_offset_mm: to_wire(self.offset_mm(raw)),
            width_mm: to_wire(self.width_mm(raw)),
            distance_mm: to_wire(raw.distance as f64),
        }
    }
}

fn to_wire(value: f64) -> i16 {
    // `as` truncates toward zero and saturates at the i16 bounds.
    value.trunc() as i16
}

/// Optical parameters from which the focal length in pixels is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub pixel_pitch_mm: f64,
    pub active_width_px: u32,
    pub capture_width_px: u32,
    pub lens_focal_length_mm: f64,
    /// Empirical correction; larger values shrink width estimates.
    pub tuned_offset_mm: f64,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            pixel_pitch_mm: 1.75e-3,
            active_width_px: 1616,
            capture_width_px: 320,
            lens_focal_length_mm: 2.2,
            tuned_offset_mm: 100.0,
        }
    }
}

impl CameraModel {
    pub fn sensor_width_mm(&self) -> f64 {
        self.pixel_pitch_mm * self.active_width_px as f64
    }

    pub fn focal_length_px(&self) -> f64 {
        let optical = self.lens_focal_length_mm * self.capture_width_px as f64 / self.sensor_width_mm();
        self.tuned_offset_mm + optical.trunc()
    }
}
