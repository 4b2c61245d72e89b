//! Error kinds surfaced by validation and by the capture session.

/// Everything that can go wrong between collecting parameters and reaping
/// the capture engine.
///
/// Validation errors (`InvalidLink` .. `InvalidSegment`) are raised before
/// any capture starts.  A user-initiated stop is never an error.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("invalid RTSP link: should start with rtsp://")]
    InvalidLink,
    #[error("RTSP link not working: {0}")]
    ProbeFailed(String),
    #[error("RTSP link not working: no video frames found")]
    NoVideoStream,
    #[error("invalid output path: {0}")]
    InvalidPath(String),
    #[error("invalid segment length {value:?}: {reason}")]
    InvalidSegment { value: String, reason: &'static str },
    #[error("capture engine could not be started: {0}")]
    EngineLaunchFailed(String),
    #[error("capture engine exited with {status}\n{diagnostics}")]
    EngineRuntimeFailed { status: String, diagnostics: String },
    #[error("capture session already finished")]
    SessionClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// True for errors raised by the validators, before any capture starts.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CaptureError::InvalidLink
                | CaptureError::ProbeFailed(_)
                | CaptureError::NoVideoStream
                | CaptureError::InvalidPath(_)
                | CaptureError::InvalidSegment { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kinds() {
        assert!(CaptureError::InvalidLink.is_validation());
        assert!(CaptureError::InvalidSegment {
            value: "-1".into(),
            reason: "expected a non-negative integer",
        }
        .is_validation());
        assert!(!CaptureError::EngineLaunchFailed("x".into()).is_validation());
        assert!(!CaptureError::SessionClosed.is_validation());
    }

    #[test]
    fn test_runtime_failure_carries_diagnostics() {
        let err = CaptureError::EngineRuntimeFailed {
            status: "exit status: 1".into(),
            diagnostics: "Connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit status: 1"));
        assert!(msg.contains("Connection refused"));
    }
}
