//! rtspdump capture library – the stream-capture session controller.
//!
//! Flow for one recording:
//! 1. [`CaptureRequest::validate`] checks the output path and probes the
//!    RTSP link through a [`CaptureEngine`]
//! 2. [`CaptureRequest::plan`] derives the output file names
//! 3. [`CaptureSession::start`] launches the engine and
//!    [`CaptureSession::await_completion`] supervises it until the stream
//!    ends, the engine fails, or the caller's cancellation token fires.

pub mod engine;
pub mod probe;
pub mod request;
pub mod session;

pub use engine::{CaptureEngine, CaptureJob, FfmpegEngine, Invocation};
pub use probe::{probe_stream, validate_rtsp_link};
pub use request::{CaptureParams, CaptureRequest};
pub use rtspdump_common::model::{CaptureOutcome, ProbeResult, SessionState};
pub use rtspdump_common::naming::OutputPlan;
pub use rtspdump_common::CaptureError;
pub use session::{CaptureSession, SessionOptions};
