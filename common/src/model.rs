//! Session data model shared between the controller and its front ends.

/// Stream metadata reported by the probe engine for an RTSP endpoint.
///
/// Produced by parsing the probe output, consumed by the link validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeResult {
    pub has_video_stream: bool,
    pub width: u32,
    pub height: u32,
    /// False when the probe process exited with an error.
    pub succeeded: bool,
}

impl ProbeResult {
    /// Result for a probe process that exited non-zero.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Result for a successful probe whose first stream is `width`x`height`.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self {
            has_video_stream: width != 0 && height != 0,
            width,
            height,
            succeeded: true,
        }
    }
}

/// Lifecycle of a capture session.
///
/// `Starting -> Running -> {Completed, Failed}`, plus
/// `Running -> Stopping -> Completed` when the session is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Stopping,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a session reached `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The engine exited on its own with success (stream ended).
    Finished,
    /// The session was cancelled and the engine shut down.
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_dimensions() {
        assert!(ProbeResult::from_dimensions(1920, 1080).has_video_stream);
        assert!(!ProbeResult::from_dimensions(0, 1080).has_video_stream);
        assert!(!ProbeResult::from_dimensions(640, 0).has_video_stream);
        assert!(!ProbeResult::failed().succeeded);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Stopping.is_terminal());
        assert_eq!(SessionState::Running.to_string(), "running");
    }
}
