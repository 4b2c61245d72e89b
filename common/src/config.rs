//! Configuration parsing – reads a KEY=VALUE file such as `rtspdump.conf`.
//!
//! Every key is optional; missing keys fall back to [`Config::default`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

/// Engine and session settings.  Capture parameters (URL, output file,
/// segment length) come from the front end, not from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // ── engine ───────────────────────────────────────────────────────
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    /// Forced RTSP lower transport (`tcp`, `udp`, ...).  `None` leaves the
    /// engine default.
    pub rtsp_transport: Option<String>,
    pub engine_loglevel: String,

    // ── session ──────────────────────────────────────────────────────
    pub probe_timeout_secs: u64,
    /// How long a stopping engine gets before it is killed.
    pub stop_timeout_secs: u64,
    /// Engine output lines kept as diagnostics for a failed session.
    pub log_tail_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            rtsp_transport: None,
            engine_loglevel: "info".into(),
            probe_timeout_secs: 5,
            stop_timeout_secs: 10,
            log_tail_lines: 20,
        }
    }
}

impl Config {
    /// Default config path, relative to the working directory.
    pub fn default_path() -> &'static str {
        "rtspdump.conf"
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Parse a `KEY=VALUE` configuration file.
///
/// Lines starting with `#` are comments.  Values may be optionally
/// double-quoted.  Unknown keys are silently ignored, as are values that
/// do not parse (the default is kept).
pub fn load(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config: {}", path.display()))?;

    let config = from_map(&parse_conf(&text));
    info!("Loaded config from {}", path.display());
    Ok(config)
}

fn from_map(map: &HashMap<String, String>) -> Config {
    let defaults = Config::default();

    let get = |key: &str| -> Option<String> { map.get(key).cloned().filter(|v| !v.is_empty()) };
    let get_u64 = |key: &str, default: u64| -> u64 {
        get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    };

    Config {
        ffmpeg_bin: get("FFMPEG_BIN").map(PathBuf::from).unwrap_or(defaults.ffmpeg_bin),
        ffprobe_bin: get("FFPROBE_BIN").map(PathBuf::from).unwrap_or(defaults.ffprobe_bin),
        rtsp_transport: get("RTSP_TRANSPORT"),
        engine_loglevel: get("ENGINE_LOGLEVEL").unwrap_or(defaults.engine_loglevel),

        probe_timeout_secs: get_u64("PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
        stop_timeout_secs: get_u64("STOP_TIMEOUT_SECS", defaults.stop_timeout_secs),
        log_tail_lines: get("LOG_TAIL_LINES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.log_tail_lines),
    }
}

/// Parse `KEY=VALUE` lines into a map, stripping optional double-quotes.
fn parse_conf(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            let key = key.trim();
            let val = val.trim().trim_matches('"');
            map.insert(key.to_string(), val.to_string());
        }
    }
    map
}

// ─── tests ───────────────────────────────────────────────────────────────
