use serde::Serialize;
use std::fmt;

/// Which third of the frame the target's centroid falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub fn from_center_x(cx: u32, frame_width: u32) -> Self {
        let left = frame_width / 3;
        let right = 2 * frame_width / 3;
        if cx < left {
            Zone::Left
        } else if cx < right {
            Zone::Center
        } else {
            Zone::Right
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Left => "LEFT",
            Zone::Center => "CENTER",
            Zone::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_the_frame_into_thirds() {
        assert_eq!(Zone::from_center_x(0, 320), Zone::Left);
        assert_eq!(Zone::from_center_x(105, 320), Zone::Left);
        assert_eq!(Zone::from_center_x(106, 320), Zone::Center);
        assert_eq!(Zone::from_center_x(212, 320), Zone::Center);
        assert_eq!(Zone::from_center_x(213, 320), Zone::Right);
        assert_eq!(Zone::from_center_x(319, 320), Zone::Right);
    }
}
