//! Parsing of yt-dlp stdout lines
//!
//! yt-dlp is driven with a `--progress-template` and several `--print` templates, each
//! emitting one tagged line. Everything untagged is passed through as [`YtDlpLine::Other`].

use super::traits::ProgressSample;
use crate::types::{MediaFormat, MediaInfo, MediaMetadata, Platform};
use serde::Deserialize;
use std::path::PathBuf;

/// Prefix of progress lines
pub const PROGRESS_TAG: &str = "[progress]";
/// Prefix of the pre-download destination line
pub const DESTINATION_TAG: &str = "[destination]";
/// Prefix of the post-move final path line
pub const FILEPATH_TAG: &str = "[filepath]";
/// Prefix of the metadata JSON line
pub const META_TAG: &str = "[meta]";

/// One classified line of yt-dlp output
#[derive(Debug, Clone, PartialEq)]
pub enum YtDlpLine {
    /// Download progress
    Progress(ProgressSample),
    /// Where yt-dlp is about to write
    Destination(PathBuf),
    /// Final artifact location after post-processing
    FinalPath(PathBuf),
    /// Resolved title, duration and thumbnail
    Metadata(MediaMetadata),
    /// Anything else
    Other(String),
}

/// Classify a single stdout line
pub fn parse_line(line: &str) -> YtDlpLine {
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix(PROGRESS_TAG) {
        if let Some(sample) = parse_progress(rest) {
            return YtDlpLine::Progress(sample);
        }
    } else if let Some(rest) = trimmed.strip_prefix(DESTINATION_TAG) {
        let path = rest.trim();
        if !path.is_empty() && path != "NA" {
            return YtDlpLine::Destination(PathBuf::from(path));
        }
    } else if let Some(rest) = trimmed.strip_prefix(FILEPATH_TAG) {
        let path = rest.trim();
        if !path.is_empty() && path != "NA" {
            return YtDlpLine::FinalPath(PathBuf::from(path));
        }
    } else if let Some(rest) = trimmed.strip_prefix(META_TAG) {
        if let Some(metadata) = parse_metadata(rest.trim()) {
            return YtDlpLine::Metadata(metadata);
        }
    }

    YtDlpLine::Other(trimmed.to_string())
}

/// Fields: downloaded, total, total estimate, speed, eta
fn parse_progress(rest: &str) -> Option<ProgressSample> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }

    let bytes_done = parse_number(fields[0])?;
    let bytes_total = parse_number(fields[1]).or_else(|| parse_number(fields[2]));
    let rate = parse_number(fields[3]).filter(|r| *r >= 0.0);
    let eta = parse_number(fields[4]).filter(|e| *e >= 0.0);

    Some(ProgressSample {
        bytes_done: bytes_done.max(0.0) as u64,
        bytes_total: bytes_total.filter(|t| *t > 0.0).map(|t| t as u64),
        rate,
        eta: eta.map(|e| e.round() as u64),
    })
}

/// yt-dlp prints `NA` (or `None` in some versions) for unknown fields
fn parse_number(field: &str) -> Option<f64> {
    match field {
        "NA" | "None" | "" => None,
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

fn parse_metadata(json: &str) -> Option<MediaMetadata> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let object = value.as_object()?;

    Some(MediaMetadata {
        title: object
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::to_string),
        duration: object
            .get("duration")
            .and_then(|d| d.as_f64())
            .filter(|d| *d >= 0.0)
            .map(|d| d.round() as u64),
        thumbnail_url: object
            .get("thumbnail")
            .and_then(|t| t.as_str())
            .map(str::to_string),
    })
}

/// Top level of `yt-dlp --dump-single-json`
#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    is_live: Option<bool>,
    #[serde(default)]
    formats: Vec<FormatJson>,
    #[serde(flatten)]
    single: FormatJson,
}

#[derive(Debug, Default, Deserialize)]
struct FormatJson {
    format_id: Option<String>,
    ext: Option<String>,
    height: Option<u32>,
    resolution: Option<String>,
    fps: Option<f64>,
    vcodec: Option<String>,
    acodec: Option<String>,
    filesize: Option<u64>,
    filesize_approx: Option<f64>,
    tbr: Option<f64>,
}

impl From<FormatJson> for MediaFormat {
    fn from(raw: FormatJson) -> Self {
        MediaFormat {
            format_id: raw.format_id.unwrap_or_else(|| "default".to_string()),
            ext: raw.ext,
            height: raw.height,
            resolution: raw.resolution,
            fps: raw.fps,
            vcodec: raw.vcodec,
            acodec: raw.acodec,
            filesize: raw
                .filesize
                .or_else(|| raw.filesize_approx.filter(|s| *s > 0.0).map(|s| s as u64)),
            tbr: raw.tbr,
        }
    }
}

/// Parse the info document yt-dlp prints for `--dump-single-json`
///
/// A resource without a `formats` list is described by its top-level fields as a single
/// format.
pub fn parse_info(json: &str, url: String, platform: Platform) -> serde_json::Result<MediaInfo> {
    let info: InfoJson = serde_json::from_str(json)?;
    let formats = if info.formats.is_empty() {
        vec![info.single.into()]
    } else {
        info.formats.into_iter().map(MediaFormat::from).collect()
    };

    Ok(MediaInfo {
        url,
        platform,
        title: info.title,
        description: info.description,
        uploader: info.uploader,
        duration: info
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64),
        thumbnail_url: info.thumbnail,
        is_live: info.is_live.unwrap_or(false),
        formats,
    })
}
