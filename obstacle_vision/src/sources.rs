//! Input collaborators: the camera and the ranging sensor.
//!
//! Both are blocking: the pipeline calls them once per cycle and waits however
//! long they take. Timeouts belong to the implementations, which must surface a
//! stuck device as an error instead of hanging the cycle.

use crate::core_modules::frame::Frame;
use crate::core_modules::target_selector::DistanceReading;
use crate::error::{Result, VisionError};
use std::collections::VecDeque;

/// Delivers camera frames.
pub trait FrameSource {
    type Frame: Frame;

    fn next_frame(&mut self) -> Result<Self::Frame>;
}

/// Delivers single-point distance readings in millimetres.
pub trait RangeSensor {
    fn read_distance_mm(&mut self) -> Result<DistanceReading>;
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    type Frame = T::Frame;

    fn next_frame(&mut self) -> Result<Self::Frame> {
        (**self).next_frame()
    }
}

impl<T: RangeSensor + ?Sized> RangeSensor for &mut T {
    fn read_distance_mm(&mut self) -> Result<DistanceReading> {
        (**self).read_distance_mm()
    }
}

/// Hands out a fixed list of frames, then reports the source as exhausted.
#[derive(Debug, Clone)]
pub struct VecFrameSource<F> {
    frames: VecDeque<F>,
}

impl<F> VecFrameSource<F> {
    pub fn new(frames: Vec<F>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl<F: Frame> FrameSource for VecFrameSource<F> {
    type Frame = F;

    fn next_frame(&mut self) -> Result<F> {
        self.frames
            .pop_front()
            .ok_or_else(|| VisionError::FrameSource("no frames left".to_string()))
    }
}

/// Replays a list of readings, starting over at the end of the list.
#[derive(Debug, Clone)]
pub struct ScriptedRange {
    readings: Vec<DistanceReading>,
    next: usize,
}

impl ScriptedRange {
    pub fn new(readings: Vec<DistanceReading>) -> Self {
        Self { readings, next: 0 }
    }

    /// Always reports the same distance.
    pub fn constant(distance_mm: i32) -> Self {
        Self::new(vec![Some(distance_mm)])
    }

    /// Parses one reading per line. Blank lines and `#` comments are skipped;
    /// `none`/`-` stands for a missing reading. A script without a single
    /// reading is rejected.
    pub fn parse(script: &str) -> Result<Self> {
        let mut readings = Vec::new();
        for (number, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.eq_ignore_ascii_case("none") || line == "-" {
                readings.push(None);
                continue;
            }
            let value = line.parse::<i32>().map_err(|e| {
                VisionError::RangeSensor(format!("line {}: {line:?}: {e}", number + 1))
            })?;
            readings.push(Some(value));
        }
        if readings.is_empty() {
            return Err(VisionError::RangeSensor("no readings in script".to_string()));
        }
        Ok(Self::new(readings))
    }
}

impl RangeSensor for ScriptedRange {
    fn read_distance_mm(&mut self) -> Result<DistanceReading> {
        if self.readings.is_empty() {
            return Err(VisionError::RangeSensor("no readings scripted".to_string()));
        }
        let reading = self.readings[self.next];
        self.next = (self.next + 1) % self.readings.len();
        Ok(reading)
    }
}
