//! rtspdump – saves an RTSP stream to file.
//!
//! This binary:
//! 1. Parses the command line and reads `rtspdump.conf` if present
//! 2. Validates the output path and probes the RTSP link
//! 3. Runs ffmpeg in stream-copy mode, optionally segmented, until the
//!    stream ends or Ctrl-C is pressed

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use rtspdump_capture::{
    CaptureOutcome, CaptureParams, CaptureRequest, CaptureSession, FfmpegEngine, SessionOptions,
};
use rtspdump_common::config::{self, Config};
use rtspdump_common::validate::{redact_url, validate_path, validate_segment_seconds};
use rtspdump_common::CaptureError;

#[derive(Parser, Debug)]
#[command(name = "rtspdump")]
#[command(about = "Save RTSP stream to file")]
#[command(version)]
struct Cli {
    /// KEY=VALUE config file [default: rtspdump.conf, if present]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dump an RTSP stream to file, optionally in fixed-length segments
    #[command(name = "rtsp-to-file-dump", visible_alias = "dump")]
    RtspToFileDump(DumpArgs),
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// RTSP link. Embed username & password in the link if required
    #[arg(short, long, value_name = "RTSP_LINK", default_value = "rtsp://")]
    rtsp: String,

    /// Output file (mp4, mkv, avi, wmv, mov, ...)
    #[arg(short, long, default_value = "rtsp2filedump.mp4", value_parser = parse_output_file)]
    output_file: String,

    /// Save stream in segments of this length in seconds. 0 for unlimited length
    #[arg(short, long, value_name = "SECS", default_value = "300", value_parser = validate_segment_seconds)]
    segment_length: u64,

    /// Do not add the unique timestamp suffix that keeps existing files from
    /// being overwritten
    #[arg(long)]
    no_suffix: bool,
}

fn parse_output_file(value: &str) -> Result<String, CaptureError> {
    validate_path(value).map(|_| value.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // ── load config ──────────────────────────────────────────────────
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::RtspToFileDump(args) => dump(args, &config).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load(path).context("Config load failed"),
        None => {
            let default = Path::new(Config::default_path());
            if default.exists() {
                config::load(default).context("Config load failed")
            } else {
                Ok(Config::default())
            }
        }
    }
}

async fn dump(args: DumpArgs, config: &Config) -> Result<()> {
    let engine = FfmpegEngine::from_config(config);
    match engine.version() {
        Some(version) => info!("Using {version}"),
        None => anyhow::bail!(
            "{} not found - is ffmpeg installed? (set FFMPEG_BIN in {})",
            engine.ffmpeg().display(),
            Config::default_path()
        ),
    }

    // ── validate ─────────────────────────────────────────────────────
    let params = CaptureParams {
        rtsp_url: args.rtsp,
        output_path: args.output_file,
        segment_seconds: args.segment_length,
        add_unique_suffix: !args.no_suffix,
    };
    let request = CaptureRequest::validate(params, &engine, config.probe_timeout())
        .await
        .map_err(request_error)?;
    let plan = request.plan();

    println!(
        "Dumping {} to {}",
        redact_url(request.rtsp_url()),
        plan.segment_file_template.display()
    );

    // ── ctrl-c ───────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        on_signal.cancel();
    })
    .context("Cannot set Ctrl-C handler")?;

    // ── capture ──────────────────────────────────────────────────────
    let mut session =
        CaptureSession::start(&engine, request, plan, SessionOptions::from_config(config))?;

    match session.await_completion(cancel).await? {
        CaptureOutcome::Finished => println!("Stream ended."),
        CaptureOutcome::Interrupted => println!("Stopped dumping."),
    }

    Ok(())
}

/// Validation failures are the user's to fix; anything else is reported as is.
fn request_error(e: CaptureError) -> anyhow::Error {
    if e.is_validation() {
        anyhow::Error::new(e).context("Invalid capture request, nothing was recorded")
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dump_defaults() {
        let cli = Cli::try_parse_from(["rtspdump", "dump"]).unwrap();
        let Commands::RtspToFileDump(args) = cli.command;
        assert_eq!(args.rtsp, "rtsp://");
        assert_eq!(args.output_file, "rtsp2filedump.mp4");
        assert_eq!(args.segment_length, 300);
        assert!(!args.no_suffix);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_dump_flags() {
        let cli = Cli::try_parse_from([
            "rtspdump",
            "rtsp-to-file-dump",
            "-r",
            "rtsp://cam/live",
            "-o",
            "front.mkv",
            "-s",
            "0",
            "--no-suffix",
        ])
        .unwrap();
        let Commands::RtspToFileDump(args) = cli.command;
        assert_eq!(args.rtsp, "rtsp://cam/live");
        assert_eq!(args.output_file, "front.mkv");
        assert_eq!(args.segment_length, 0);
        assert!(args.no_suffix);
    }

    #[test]
    fn test_request_error_wording() {
        let invalid = format!("{:#}", request_error(CaptureError::NoVideoStream));
        assert!(invalid.starts_with("Invalid capture request"), "{invalid}");
        assert!(invalid.contains("no video frames found"), "{invalid}");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let other = format!("{:#}", request_error(CaptureError::Io(io)));
        assert!(!other.contains("Invalid capture request"), "{other}");
    }

    #[test]
    fn test_invalid_arguments_rejected_at_parse() {
        assert!(Cli::try_parse_from(["rtspdump", "dump", "-s", "-5"]).is_err());
        assert!(Cli::try_parse_from(["rtspdump", "dump", "-s", "ten"]).is_err());
        assert!(Cli::try_parse_from(["rtspdump", "dump", "-o", "noext"]).is_err());
        assert!(Cli::try_parse_from(["rtspdump", "dump", "-o", "/no/such/dir/x.mp4"]).is_err());
        assert!(Cli::try_parse_from(["rtspdump", "dump", "-o", "video.mp4/"]).is_err());
    }
}
