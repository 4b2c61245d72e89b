//! RTSP link validation by probing the endpoint with the engine's prober.

use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, info, warn};

use rtspdump_common::model::ProbeResult;
use rtspdump_common::validate::{check_rtsp_scheme, redact_url};
use rtspdump_common::CaptureError;

use crate::engine::CaptureEngine;

/// Extra time granted on top of the engine-level probe timeout before the
/// probe process is killed.
pub const PROBE_GRACE: Duration = Duration::from_secs(5);

/// Run the engine's probe against `url` and parse its answer.
///
/// A probe process exiting non-zero yields [`ProbeResult::failed`]; spawn
/// errors, a probe that outlives `timeout + PROBE_GRACE` and unparsable
/// output are `ProbeFailed`.
pub async fn probe_stream(
    engine: &dyn CaptureEngine,
    url: &str,
    timeout: Duration,
) -> Result<ProbeResult, CaptureError> {
    let invocation = engine.probe_invocation(url, timeout);
    debug!("Probing: {invocation}");

    let mut cmd = invocation.command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        CaptureError::ProbeFailed(format!(
            "cannot run {}: {e}",
            invocation.program.display()
        ))
    })?;

    // Dropping the wait future on timeout kills the child (kill_on_drop).
    let output = match tokio::time::timeout(timeout + PROBE_GRACE, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(CaptureError::ProbeFailed(format!("probe I/O error: {e}"))),
        Err(_) => {
            return Err(CaptureError::ProbeFailed(format!(
                "no answer within {}s",
                (timeout + PROBE_GRACE).as_secs()
            )))
        }
    };

    if !output.status.success() {
        warn!(
            "Probe of {} exited with {}",
            redact_url(url),
            output.status
        );
        return Ok(ProbeResult::failed());
    }

    engine.parse_probe(&output.stdout)
}

/// Check that `url` is an `rtsp://` link serving at least one video stream.
///
/// Malformed links fail with `InvalidLink` without spawning anything.
/// Returns the URL unchanged.
pub async fn validate_rtsp_link(
    url: &str,
    engine: &dyn CaptureEngine,
    timeout: Duration,
) -> Result<String, CaptureError> {
    check_rtsp_scheme(url)?;

    let probe = probe_stream(engine, url, timeout).await?;
    if !probe.succeeded {
        return Err(CaptureError::ProbeFailed("connection failed".into()));
    }
    if !probe.has_video_stream {
        return Err(CaptureError::NoVideoStream);
    }

    info!(
        "RTSP link {} carries {}x{} video",
        redact_url(url),
        probe.width,
        probe.height
    );
    Ok(url.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptEngine;

    const URL: &str = "rtsp://cam.local:554/live";
    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_valid_link_returned_unchanged() {
        let engine = ScriptEngine::with_video(1280, 720);
        let url = validate_rtsp_link(URL, &engine, TIMEOUT).await.unwrap();
        assert_eq!(url, URL);
    }

    #[tokio::test]
    async fn test_bad_scheme_never_probes() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("probed");
        let engine = ScriptEngine::new(&format!("touch '{}'", marker.display()), "exit 0");

        for bad in ["http://cam.local/live", "rtsp:/cam", "", "cam.local:554"] {
            let err = validate_rtsp_link(bad, &engine, TIMEOUT).await.unwrap_err();
            assert!(matches!(err, CaptureError::InvalidLink), "{bad:?}: {err}");
        }
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_probe_exit_code() {
        let engine = ScriptEngine::new(r#"echo '{"streams":[]}'; exit 1"#, "exit 0");
        let probe = probe_stream(&engine, URL, TIMEOUT).await.unwrap();
        assert!(!probe.succeeded);

        let err = validate_rtsp_link(URL, &engine, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, CaptureError::ProbeFailed(_)));
    }

    #[tokio::test]
    async fn test_unparsable_probe_output() {
        let engine = ScriptEngine::new("echo 'not json'", "exit 0");
        let err = validate_rtsp_link(URL, &engine, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, CaptureError::ProbeFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_probe_binary() {
        let mut engine = ScriptEngine::with_video(640, 480);
        engine.program = "/nonexistent/ffprobe".into();
        let err = validate_rtsp_link(URL, &engine, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, CaptureError::ProbeFailed(_)));
    }

    #[tokio::test]
    async fn test_no_video_stream() {
        let empty = ScriptEngine::new(r#"echo '{"streams":[]}'"#, "exit 0");
        assert!(matches!(
            validate_rtsp_link(URL, &empty, TIMEOUT).await,
            Err(CaptureError::NoVideoStream)
        ));

        let zero_width = ScriptEngine::with_video(0, 480);
        assert!(matches!(
            validate_rtsp_link(URL, &zero_width, TIMEOUT).await,
            Err(CaptureError::NoVideoStream)
        ));
    }

    #[tokio::test]
    async fn test_hanging_probe_is_killed() {
        let engine = ScriptEngine::new("exec sleep 60", "exit 0");
        let started = std::time::Instant::now();
        let err = probe_stream(&engine, URL, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, CaptureError::ProbeFailed(_)));
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
