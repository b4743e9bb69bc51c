// THEORY:
// Every fallible operation in the library reports through one error type. The
// detection core itself is infallible: an empty scene, an out-of-range distance
// or a frame with nothing worth measuring are ordinary cycle outcomes, not
// errors. What *can* fail lives at the edges: reading configuration, talking to
// the camera or the ranging sensor, and pushing bytes down a transport.
//
// The variants are grouped so the cycle driver can make its one decision
// cheaply: collaborator faults (`FrameSource`, `RangeSensor`) cost a single
// cycle, transport faults send the driver into its reconnect state, and
// `ReconnectExhausted` ends the loop.

use thiserror::Error;

/// Errors produced at the boundaries of the obstacle pipeline.
#[derive(Debug, Error)]
pub enum VisionError {
    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The camera (or whatever stands in for it) could not deliver a frame.
    #[error("frame source failed: {0}")]
    FrameSource(String),
    /// The ranging sensor could not deliver a reading.
    #[error("range sensor failed: {0}")]
    RangeSensor(String),
    /// The link to the downstream consumer broke.
    #[error("transport fault: {0}")]
    Transport(String),
    /// The reconnect policy gave up.
    #[error("transport could not be re-established after {0} attempts")]
    ReconnectExhausted(u32),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    /// A background task the caller depends on has stopped.
    #[error("{0} is no longer running")]
    TaskStopped(&'static str),
}

impl VisionError {
    /// Transport faults are the only errors the driver tries to recover from
    /// by reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(self, VisionError::Transport(_))
    }

    /// Faults that cost one cycle but leave the loop running.
    pub fn is_cycle_fault(&self) -> bool {
        matches!(
            self,
            VisionError::FrameSource(_) | VisionError::RangeSensor(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_faults() {
        assert!(VisionError::Transport("gone".into()).is_transport());
        assert!(!VisionError::Transport("gone".into()).is_cycle_fault());
        assert!(VisionError::RangeSensor("timeout".into()).is_cycle_fault());
        assert!(VisionError::FrameSource("no frame".into()).is_cycle_fault());
        assert!(!VisionError::ReconnectExhausted(3).is_transport());
    }

    #[test]
    fn messages_name_the_failure() {
        let err = VisionError::ReconnectExhausted(5);
        assert_eq!(
            err.to_string(),
            "transport could not be re-established after 5 attempts"
        );
    }
}
