// THEORY:
// Single frames are noisy: blob edges flicker by a few pixels and the ToF
// reading jitters by a few millimetres. The smoothing buffer low-pass-filters
// both by keeping the last N raw triples and reporting their plain mean.
//
// Key properties:
// 1.  **Fixed depth**: capacity is chosen at construction and never grows. A
//     push into a full buffer evicts the oldest entry first.
// 2.  **All-or-nothing emission**: a partial window is never reported. Until the
//     buffer has seen N entries, callers get `None` and ship the zero sentinel.
// 3.  **Sole cross-cycle state**: nothing else in the pipeline outlives a cycle,
//     which makes this struct the only thing that needs guarding if cycles ever
//     run concurrently.

use crate::core_modules::geometry::RawMeasurement;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Bounded FIFO of recent raw measurements.
#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    readings: VecDeque<RawMeasurement>,
    capacity: usize,
}

impl Default for SmoothingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl SmoothingBuffer {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, reading: RawMeasurement) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.readings.len() == self.capacity
    }

    /// Entries in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RawMeasurement> {
        self.readings.iter()
    }

    /// Integer-truncated mean of every field over the current contents.
    pub fn mean(&self) -> Option<RawMeasurement> {
        if self.readings.is_empty() {
            return None;
        }
        let n = self.readings.len() as i64;
        let (x_min, x_max, distance) = self.readings.iter().fold((0i64, 0i64, 0i64), |acc, r| {
            (
                acc.0 + r.x_min as i64,
                acc.1 + r.x_max as i64,
                acc.2 + r.distance as i64,
            )
        });
        Some(RawMeasurement {
            x_min: (x_min / n) as i32,
            x_max: (x_max / n) as i32,
            distance: (distance / n) as i32,
        })
    }

    /// The mean, but only once the window is full.
    pub fn smoothed(&self) -> Option<RawMeasurement> {
        if self.is_full() { self.mean() } else { None }
    }

    /// Pushes and returns the gated mean in one step.
    pub fn record(&mut self, reading: RawMeasurement) -> Option<RawMeasurement> {
        self.push(reading);
        self.smoothed()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_stays_at_capacity_and_keeps_the_newest() {
        let mut buffer = SmoothingBuffer::new(DEFAULT_WINDOW_SIZE);
        for i in 0..(DEFAULT_WINDOW_SIZE as i32 + 7) {
            buffer.push(RawMeasurement::new(i, i + 1, 100 + i));
            assert!(buffer.len() <= DEFAULT_WINDOW_SIZE);
        }
        assert_eq!(buffer.len(), DEFAULT_WINDOW_SIZE);
        let kept: Vec<i32> = buffer.iter().map(|r| r.x_min).collect();
        assert_eq!(kept, (7..17).collect::<Vec<_>>());
    }

    #[test]
    fn emission_waits_for_a_full_window() {
        let mut buffer = SmoothingBuffer::new(3);
        assert_eq!(buffer.record(RawMeasurement::new(10, 20, 300)), None);
        assert_eq!(buffer.record(RawMeasurement::new(10, 20, 300)), None);
        assert_eq!(
            buffer.record(RawMeasurement::new(10, 20, 300)),
            Some(RawMeasurement::new(10, 20, 300))
        );
        assert!(buffer.mean().is_some());
    }

    #[test]
    fn mean_truncates() {
        let mut buffer = SmoothingBuffer::new(3);
        buffer.push(RawMeasurement::new(1, 10, 100));
        buffer.push(RawMeasurement::new(2, 10, 100));
        buffer.push(RawMeasurement::new(2, 11, 101));
        assert_eq!(buffer.mean(), Some(RawMeasurement::new(1, 10, 100)));
    }

    #[test]
    fn identical_window_then_one_zero_reading_evicts_the_oldest() {
        let mut buffer = SmoothingBuffer::default();
        for _ in 0..10 {
            buffer.push(RawMeasurement::new(100, 140, 500));
        }
        assert_eq!(buffer.smoothed(), Some(RawMeasurement::new(100, 140, 500)));

        buffer.push(RawMeasurement::new(0, 0, 0));
        assert_eq!(buffer.len(), 10);
        // Nine copies of (100, 140, 500) plus one zero entry.
        assert_eq!(buffer.smoothed(), Some(RawMeasurement::new(90, 126, 450)));
    }

    #[test]
    fn zero_capacity_is_bumped() {
        let mut buffer = SmoothingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(
            buffer.record(RawMeasurement::new(1, 2, 3)),
            Some(RawMeasurement::new(1, 2, 3))
        );
    }

    #[test]
    fn empty_buffer_has_no_mean() {
        assert_eq!(SmoothingBuffer::default().mean(), None);
    }
}
