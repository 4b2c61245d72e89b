//! Output filename policy.
//!
//! From a validated base path this derives the segment template handed to
//! the capture engine and the companion log file:
//!
//! ```text
//! video.mp4            -> video_part%d.mp4            + video.txt
//! video.mp4 (suffixed) -> video_2024_3_7_9_5_12_48_part%d.mp4 + video_2024_3_7_9_5_12_48.txt
//! ```
//!
//! The engine substitutes `%d` with the segment index, starting at
//! [`FIRST_SEGMENT_INDEX`].

use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

/// Placeholder the engine replaces with the segment index.
pub const SEGMENT_PLACEHOLDER: &str = "%d";
/// Index of the first segment written by the engine.
pub const FIRST_SEGMENT_INDEX: u32 = 0;
/// Extension used when the base path has none.
pub const DEFAULT_EXTENSION: &str = ".mp4";
/// Extension of the session log file.
pub const LOG_EXTENSION: &str = ".txt";

/// Concrete output naming for one capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// `<stem>_part%d<ext>`; any literal `%` in the stem is escaped as `%%`.
    pub segment_file_template: PathBuf,
    /// `<stem>.txt`, shared by all segments.
    pub log_file_path: PathBuf,
}

impl OutputPlan {
    /// Path the engine writes for segment `index`.
    pub fn segment_file(&self, index: u32) -> PathBuf {
        let name = self
            .segment_file_template
            .file_name()
            .map(|n| expand_template(&n.to_string_lossy(), index))
            .unwrap_or_default();
        self.segment_file_template.with_file_name(name)
    }

    /// The single file written when segmenting is disabled.
    pub fn continuous_file(&self) -> PathBuf {
        self.segment_file(FIRST_SEGMENT_INDEX)
    }
}

/// Plan output names using the local clock for the unique suffix.
pub fn plan_output(output_path: &Path, add_unique_suffix: bool) -> OutputPlan {
    plan_output_at(output_path, add_unique_suffix, Local::now().naive_local())
}

/// Deterministic core of [`plan_output`].  `now` is only consulted when
/// `add_unique_suffix` is set.
pub fn plan_output_at(output_path: &Path, add_unique_suffix: bool, now: NaiveDateTime) -> OutputPlan {
    let dir = output_path.parent().unwrap_or_else(|| Path::new(""));
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (stem, ext) = split_extension(&file_name);
    let ext = ext.unwrap_or(DEFAULT_EXTENSION);

    let stem = if add_unique_suffix {
        format!("{stem}{}", unique_suffix(now))
    } else {
        stem.to_string()
    };

    OutputPlan {
        segment_file_template: dir.join(format!(
            "{}_part{SEGMENT_PLACEHOLDER}{ext}",
            stem.replace('%', "%%")
        )),
        log_file_path: dir.join(format!("{stem}{LOG_EXTENSION}")),
    }
}

/// `_Y_M_D_H_Min_S_ms`, every field decimal and unpadded.
pub fn unique_suffix(now: NaiveDateTime) -> String {
    let millis = (now.nanosecond() % 1_000_000_000) / 1_000 / 1_000;
    format!(
        "_{}_{}_{}_{}_{}_{}_{}",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        millis
    )
}

/// Split `name` at its last `.`; a trailing `.` counts as no extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => (&name[..idx], Some(&name[idx..])),
        Some(idx) => (&name[..idx], None),
        None => (name, None),
    }
}

/// Substitute the segment index the way the engine does: `%d` becomes the
/// index and `%%` a literal `%`.
fn expand_template(name: &str, index: u32) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('d') => {
                chars.next();
                out.push_str(&index.to_string());
            }
            _ => out.push('%'),
        }
    }
    out
}
