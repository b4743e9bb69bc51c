// THEORY:
// The threshold adapts to the scene instead of being a fixed luminance cut-off.
// Each frame the camera reports its mean brightness; obstacles are assumed to
// stand out from that background by at least `offset` grey levels, either darker
// (the usual case: a dark object against a lit floor) or brighter.
//
// The mode is chosen once in configuration and never flips mid-stream.

use serde::{Deserialize, Serialize};

/// Default distance, in grey levels, between background and obstacle pixels.
pub const DEFAULT_OFFSET: f64 = 30.0;

/// Which side of the background brightness counts as "obstacle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    #[default]
    Dark,
    Bright,
}

/// An inclusive luminance interval `[low, high]` selecting obstacle pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub low: u8,
    pub high: u8,
}

impl Threshold {
    /// Derives the segmentation threshold for one frame from its mean luminance.
    ///
    /// Dark mode yields `(0, max(0, mean - offset))`, bright mode yields
    /// `(min(255, mean + offset), 255)`. Fractional limits are rounded towards
    /// the background: the dark limit down and the bright limit up, so no pixel
    /// closer to `mean` than `offset` is ever selected.
    pub fn from_brightness(mean: f64, offset: f64, mode: ThresholdMode) -> Self {
        match mode {
            ThresholdMode::Dark => {
                let high = (mean - offset).clamp(0.0, 255.0);
                Self {
                    low: 0,
                    high: high as u8,
                }
            }
            ThresholdMode::Bright => {
                let low = (mean + offset).ceil().clamp(0.0, 255.0);
                Self {
                    low: low as u8,
                    high: 255,
                }
            }
        }
    }

    /// True when `luminance` falls inside the interval.
    pub fn contains(&self, luminance: u8) -> bool {
        self.low <= luminance && luminance <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_limit_sits_below_the_mean() {
        for mean in [0.0, 12.5, 30.0, 31.0, 128.0, 200.7, 255.0] {
            for offset in [0.0, 1.0, 30.0, 300.0] {
                let t = Threshold::from_brightness(mean, offset, ThresholdMode::Dark);
                assert_eq!(t.low, 0);
                assert!(t.high as f64 <= mean, "mean={mean} offset={offset} -> {t:?}");
            }
        }
    }

    #[test]
    fn dark_limit_clamps_at_zero() {
        let t = Threshold::from_brightness(20.0, DEFAULT_OFFSET, ThresholdMode::Dark);
        assert_eq!(t, Threshold { low: 0, high: 0 });
    }

    #[test]
    fn bright_limit_sits_above_the_mean_and_clamps() {
        let t = Threshold::from_brightness(100.0, DEFAULT_OFFSET, ThresholdMode::Bright);
        assert_eq!(t, Threshold { low: 130, high: 255 });

        let t = Threshold::from_brightness(240.0, DEFAULT_OFFSET, ThresholdMode::Bright);
        assert_eq!(t, Threshold { low: 255, high: 255 });
    }

    #[test]
    fn fractional_bright_limit_rounds_up() {
        let t = Threshold::from_brightness(100.7, DEFAULT_OFFSET, ThresholdMode::Bright);
        assert_eq!(t, Threshold { low: 131, high: 255 });
        assert!(!t.contains(130));
        assert!(t.contains(131));

        for mean in [0.2, 12.5, 99.01, 200.7, 224.9] {
            let t = Threshold::from_brightness(mean, DEFAULT_OFFSET, ThresholdMode::Bright);
            assert!(t.low as f64 >= mean + DEFAULT_OFFSET, "mean={mean} -> {t:?}");
        }
    }

    #[test]
    fn interval_is_inclusive() {
        let t = Threshold::from_brightness(130.0, DEFAULT_OFFSET, ThresholdMode::Dark);
        assert!(t.contains(0));
        assert!(t.contains(100));
        assert!(!t.contains(101));
    }
}
