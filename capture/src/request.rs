//! Capture parameters as collected by a front end, and the validated
//! request the session controller accepts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rtspdump_common::naming::{plan_output, OutputPlan};
use rtspdump_common::validate::{redact_url, validate_path};
use rtspdump_common::CaptureError;

use crate::engine::CaptureEngine;
use crate::probe::validate_rtsp_link;

/// Unvalidated capture parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureParams {
    pub rtsp_url: String,
    pub output_path: String,
    /// 0 records one unlimited file.
    pub segment_seconds: u64,
    /// Insert a timestamp before the extension so reruns never overwrite
    /// earlier recordings.
    pub add_unique_suffix: bool,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            rtsp_url: "rtsp://".into(),
            output_path: "rtsp2filedump.mp4".into(),
            segment_seconds: 300,
            add_unique_suffix: true,
        }
    }
}

/// A capture request that passed validation.  Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    rtsp_url: String,
    output_path: PathBuf,
    segment_seconds: u64,
    add_unique_suffix: bool,
}

impl CaptureRequest {
    /// Validate `params`: the output path first (local and cheap), then the
    /// RTSP link, which probes the endpoint through `engine`.
    pub async fn validate(
        params: CaptureParams,
        engine: &dyn CaptureEngine,
        probe_timeout: Duration,
    ) -> Result<Self, CaptureError> {
        let output_path = validate_path(&params.output_path)?;
        let rtsp_url = validate_rtsp_link(&params.rtsp_url, engine, probe_timeout).await?;

        Ok(Self {
            rtsp_url,
            output_path,
            segment_seconds: params.segment_seconds,
            add_unique_suffix: params.add_unique_suffix,
        })
    }

    pub fn rtsp_url(&self) -> &str {
        &self.rtsp_url
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn segment_seconds(&self) -> u64 {
        self.segment_seconds
    }

    pub fn add_unique_suffix(&self) -> bool {
        self.add_unique_suffix
    }

    /// Output naming for a session started now.
    pub fn plan(&self) -> OutputPlan {
        plan_output(&self.output_path, self.add_unique_suffix)
    }
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("rtsp_url", &redact_url(&self.rtsp_url))
            .field("output_path", &self.output_path)
            .field("segment_seconds", &self.segment_seconds)
            .field("add_unique_suffix", &self.add_unique_suffix)
            .finish()
    }
}
