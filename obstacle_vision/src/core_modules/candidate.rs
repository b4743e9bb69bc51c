// THEORY:
// A `BlobCandidate` is the unit of work handed to the detection core by the
// segmentation step. It is a "dumb" data container: an axis-aligned bounding
// box in pixel space (origin at the frame's top-left), the number of pixels that
// actually passed the threshold, and the centroid of those pixels.
//
// Candidates live for exactly one cycle. They are produced by a `Frame`, pruned
// by the candidate filter, and at most one of them survives target selection.
// Nothing about a candidate is remembered once the cycle ends.

use serde::{Deserialize, Serialize};

/// A 2D pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// One segmented region of obstacle pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobCandidate {
    /// Left edge of the bounding box.
    pub x: u32,
    /// Top edge of the bounding box.
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Number of pixels in the region. Never exceeds `width * height`.
    pub pixels: u32,
    /// Centroid of the region's pixels.
    pub centroid: Point,
}

impl BlobCandidate {
    /// Builds a candidate from its box and pixel count, placing the centroid at
    /// the box center. Use [`BlobCandidate::with_centroid`] when the segmenter
    /// knows the true pixel centroid.
    pub fn new(x: u32, y: u32, width: u32, height: u32, pixels: u32) -> Self {
        let centroid = Point::new(x + width / 2, y + height / 2);
        Self::with_centroid(x, y, width, height, pixels, centroid)
    }

    pub fn with_centroid(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: u32,
        centroid: Point,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            pixels: pixels.min(width.saturating_mul(height)),
            centroid,
        }
    }

    /// Area of the bounding box, not of the region itself.
    pub fn box_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Right edge of the box, `x + width`.
    pub fn x_max(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge of the box, `y + height`.
    pub fn y_max(&self) -> u32 {
        self.y + self.height
    }

    /// True when `point` lies inside the box, edges included.
    pub fn contains(&self, point: Point) -> bool {
        self.x <= point.x && point.x <= self.x_max() && self.y <= point.y && point.y <= self.y_max()
    }

    /// Euclidean distance from the centroid to `point`.
    pub fn centroid_distance(&self, point: Point) -> f64 {
        let dx = self.centroid.x as f64 - point.x as f64;
        let dy = self.centroid.y as f64 - point.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}
