//! Capture engine abstraction and the ffmpeg implementation.
//!
//! An engine knows how to probe a URL for stream metadata and how to
//! copy-record a URL into an [`OutputPlan`], optionally segmented.  The
//! session controller only deals with the resulting [`Invocation`]s, so
//! another engine can be plugged in without touching the state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use rtspdump_common::config::Config;
use rtspdump_common::model::ProbeResult;
use rtspdump_common::naming::OutputPlan;
use rtspdump_common::validate::redact_url;
use rtspdump_common::CaptureError;

/// A program and its arguments, ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Shell-like rendering for logs, with URL credentials redacted.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains("://") {
                write!(f, " {}", redact_url(arg))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// What the controller asks an engine to record.
#[derive(Debug, Clone, Copy)]
pub struct CaptureJob<'a> {
    pub input_url: &'a str,
    pub plan: &'a OutputPlan,
    /// 0 writes one continuous file.
    pub segment_seconds: u64,
}

/// An external program pair that can probe and copy-record a stream.
pub trait CaptureEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Invocation printing stream metadata for `url` to stdout.
    fn probe_invocation(&self, url: &str, timeout: Duration) -> Invocation;

    /// Interpret the stdout of a successful probe.
    fn parse_probe(&self, stdout: &[u8]) -> Result<ProbeResult, CaptureError>;

    /// Invocation recording `job` by stream copy, never re-encoding.
    fn capture_invocation(&self, job: &CaptureJob<'_>) -> Invocation;
}

// ── ffmpeg ───────────────────────────────────────────────────────────────

/// ffprobe output subset we care about.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// ffmpeg / ffprobe based engine.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    rtsp_transport: Option<String>,
    loglevel: String,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FfmpegEngine {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg: config.ffmpeg_bin.clone(),
            ffprobe: config.ffprobe_bin.clone(),
            rtsp_transport: config.rtsp_transport.clone(),
            loglevel: config.engine_loglevel.clone(),
        }
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    /// Check if ffmpeg can be executed.
    pub fn available(&self) -> bool {
        std::process::Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// First line of `ffmpeg -version`.
    pub fn version(&self) -> Option<String> {
        let output = std::process::Command::new(&self.ffmpeg)
            .arg("-version")
            .stderr(Stdio::null())
            .output()
            .ok()?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            stdout.lines().next().map(|s| s.to_string())
        } else {
            None
        }
    }

    fn transport_args(&self, url: &str) -> Vec<String> {
        match &self.rtsp_transport {
            Some(t) if url.starts_with("rtsp") => vec!["-rtsp_transport".into(), t.clone()],
            _ => Vec::new(),
        }
    }
}

impl CaptureEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn probe_invocation(&self, url: &str, timeout: Duration) -> Invocation {
        Invocation::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json"])
            .args(["-timeout".to_string(), timeout.as_micros().to_string()])
            .args(self.transport_args(url))
            .args(["-show_streams", url])
    }

    fn parse_probe(&self, stdout: &[u8]) -> Result<ProbeResult, CaptureError> {
        let output: FfprobeOutput = serde_json::from_slice(stdout)
            .map_err(|e| CaptureError::ProbeFailed(format!("unparsable probe output: {e}")))?;

        Ok(match output.streams.first() {
            Some(stream) => ProbeResult::from_dimensions(stream.width, stream.height),
            None => ProbeResult::from_dimensions(0, 0),
        })
    }

    fn capture_invocation(&self, job: &CaptureJob<'_>) -> Invocation {
        let inv = Invocation::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-nostats", "-loglevel"])
            .arg(self.loglevel.as_str())
            .args(self.transport_args(job.input_url))
            .args(["-fflags", "nobuffer", "-i", job.input_url])
            .args(["-c", "copy"]);

        if job.segment_seconds == 0 {
            inv.arg("-y")
                .arg(job.plan.continuous_file().to_string_lossy())
        } else {
            inv.args(["-f", "segment", "-segment_time"])
                .arg(job.segment_seconds.to_string())
                .args(["-reset_timestamps", "1", "-y"])
                .arg(job.plan.segment_file_template.to_string_lossy())
        }
    }
}
