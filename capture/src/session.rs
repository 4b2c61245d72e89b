//! Capture session controller.
//!
//! Launches the capture engine for a validated [`CaptureRequest`], tees the
//! engine's diagnostic output into the session log file and supervises the
//! process until it exits on its own or the session is cancelled:
//!
//! ```text
//! Starting -> Running -> Completed | Failed
//!             Running -> Stopping -> Completed   (cancelled)
//! ```
//!
//! A session is a single attempt.  Nothing here retries; restarting after
//! a failure is a new session.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rtspdump_common::config::Config;
use rtspdump_common::model::{CaptureOutcome, SessionState};
use rtspdump_common::naming::OutputPlan;
use rtspdump_common::CaptureError;

use crate::engine::{CaptureEngine, CaptureJob, Invocation};
use crate::request::CaptureRequest;

/// Upper bound for draining engine output once the process is gone.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Supervision knobs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Time a stopping engine gets to exit before it is killed.
    pub stop_timeout: Duration,
    /// Engine output lines kept as diagnostics for a failed session.
    pub log_tail_lines: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stop_timeout: config.stop_timeout(),
            log_tail_lines: config.log_tail_lines,
        }
    }
}

/// One capture attempt and the engine process that performs it.
pub struct CaptureSession {
    request: CaptureRequest,
    plan: OutputPlan,
    options: SessionOptions,
    state: SessionState,
    child: Option<Child>,
    log_pump: Option<JoinHandle<Vec<String>>>,
}

impl CaptureSession {
    /// Launch the engine for `request` writing to `plan`.
    ///
    /// Spawns the engine, then creates the log file, and returns a
    /// `Running` session.  A launch failure leaves an existing log alone.  Must be called from within a tokio runtime.  The engine
    /// is killed if the session is dropped while it still runs.
    pub fn start(
        engine: &dyn CaptureEngine,
        request: CaptureRequest,
        plan: OutputPlan,
        options: SessionOptions,
    ) -> Result<Self, CaptureError> {
        let mut session = Self {
            request,
            plan,
            options,
            state: SessionState::Starting,
            child: None,
            log_pump: None,
        };

        let invocation = engine.capture_invocation(&CaptureJob {
            input_url: session.request.rtsp_url(),
            plan: &session.plan,
            segment_seconds: session.request.segment_seconds(),
        });
        info!("Spawning: {invocation}");

        let mut cmd = invocation.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches us, not the engine,
        // so shutdown always goes through `stop`.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| launch_error(&invocation, e))?;
        // Dropping `child` on error kills the engine.
        let log_file = std::fs::File::create(&session.plan.log_file_path)?;

        let tail_len = session.options.log_tail_lines;
        session.log_pump = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(pump_log(stderr, log_file, tail_len)));

        info!(
            "{} started (pid={:?}, log={})",
            engine.name(),
            child.id(),
            session.plan.log_file_path.display()
        );

        session.child = Some(child);
        session.state = SessionState::Running;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &CaptureRequest {
        &self.request
    }

    pub fn plan(&self) -> &OutputPlan {
        &self.plan
    }

    /// Engine process id while it is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Wait until the engine exits or `cancel` fires.
    ///
    /// * engine exits with success: `Completed`, `Ok(Finished)`
    /// * engine exits with failure: `Failed`, `Err(EngineRuntimeFailed)`
    ///   carrying the tail of the engine output
    /// * cancelled: the engine is asked to terminate, killed after
    ///   `stop_timeout`, and reaped: `Completed`, `Ok(Interrupted)`
    pub async fn await_completion(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<CaptureOutcome, CaptureError> {
        if self.state.is_terminal() {
            return Err(CaptureError::SessionClosed);
        }
        let exit = {
            let child = self.child.as_mut().ok_or(CaptureError::SessionClosed)?;
            tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel.cancelled() => None,
            }
        };

        match exit {
            Some(Ok(status)) => self.finish(status).await,
            Some(Err(e)) => {
                error!("Cannot wait for capture engine: {e}");
                self.stop().await;
                self.state = SessionState::Failed;
                Err(CaptureError::Io(e))
            }
            None => {
                info!("Capture cancelled, stopping engine");
                self.stop().await;
                self.state = SessionState::Completed;
                Ok(CaptureOutcome::Interrupted)
            }
        }
    }

    async fn finish(&mut self, status: ExitStatus) -> Result<CaptureOutcome, CaptureError> {
        self.child = None;
        let tail = self.drain_log().await;

        if status.success() {
            info!("Capture engine finished ({status})");
            self.state = SessionState::Completed;
            Ok(CaptureOutcome::Finished)
        } else {
            error!("Capture engine exited with {status}");
            self.state = SessionState::Failed;
            Err(CaptureError::EngineRuntimeFailed {
                status: status.to_string(),
                diagnostics: tail.join("\n"),
            })
        }
    }

    /// Ask the engine to terminate, kill it after `stop_timeout`, reap it.
    async fn stop(&mut self) {
        self.state = SessionState::Stopping;

        if let Some(mut child) = self.child.take() {
            request_termination(&mut child);

            match tokio::time::timeout(self.options.stop_timeout, child.wait()).await {
                Ok(Ok(status)) => info!("Capture engine stopped ({status})"),
                Ok(Err(e)) => {
                    warn!("Cannot wait for capture engine: {e}, killing");
                    kill(&mut child).await;
                }
                Err(_) => {
                    warn!(
                        "Capture engine did not stop within {:?}, killing",
                        self.options.stop_timeout
                    );
                    kill(&mut child).await;
                }
            }
        }

        self.drain_log().await;
    }

    /// Wait for the log pump to see end-of-output and return the tail.
    async fn drain_log(&mut self) -> Vec<String> {
        let Some(mut pump) = self.log_pump.take() else {
            return Vec::new();
        };
        match tokio::time::timeout(LOG_DRAIN_TIMEOUT, &mut pump).await {
            Ok(Ok(tail)) => tail,
            Ok(Err(e)) => {
                warn!("Engine log task failed: {e}");
                Vec::new()
            }
            Err(_) => {
                warn!("Engine output still open after exit, detaching log");
                pump.abort();
                Vec::new()
            }
        }
    }
}

fn launch_error(invocation: &Invocation, e: std::io::Error) -> CaptureError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CaptureError::EngineLaunchFailed(format!(
            "{} not found - is it installed?",
            invocation.program.display()
        ))
    } else {
        CaptureError::EngineLaunchFailed(format!("{}: {e}", invocation.program.display()))
    }
}

/// Graceful termination request: SIGTERM lets ffmpeg finalise the current
/// file.
#[cfg(unix)]
fn request_termination(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: `pid` is our un-reaped child, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        warn!(
            "Cannot send SIGTERM to capture engine (pid={pid}): {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Cannot terminate capture engine: {e}");
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Cannot kill capture engine: {e}");
    }
}

/// Copy engine stderr into the session log file, keeping the last
/// `tail_len` lines.
async fn pump_log(stderr: ChildStderr, log_file: std::fs::File, tail_len: usize) -> Vec<String> {
    let mut reader = BufReader::new(stderr);
    let mut writer = Some(BufWriter::new(tokio::fs::File::from_std(log_file)));
    let mut tail = VecDeque::with_capacity(tail_len);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Cannot read engine output: {e}");
                break;
            }
        }

        if let Some(w) = writer.as_mut() {
            if let Err(e) = w.write_all(&buf).await {
                warn!("Cannot write session log, continuing without it: {e}");
                writer = None;
            }
        }

        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        debug!(target: "engine", "{line}");
        if tail_len > 0 {
            if tail.len() == tail_len {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    if let Some(mut w) = writer {
        if let Err(e) = w.flush().await {
            warn!("Cannot flush session log: {e}");
        }
    }
    tail.into()
}
