//! Utility functions for file naming, media detection, and artifact cleanup

use crate::error::{Error, Result};
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Video container extensions fetched directly over HTTP
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "webm", "mov", "flv", "m4v", "3gp"];

/// Audio extensions fetched directly over HTTP
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"];

/// Get a path that does not collide with an existing file
///
/// If `path` exists, tries `stem (1).ext`, `stem (2).ext`, and so on.
///
/// ```
/// use media_dl::utils::get_unique_path;
/// use std::path::Path;
///
/// let unique = get_unique_path(Path::new("/nonexistent/clip.mp4")).unwrap();
/// assert_eq!(unique, Path::new("/nonexistent/clip.mp4"));
/// ```
pub fn get_unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Other(format!("cannot extract file stem from {}", path.display())))?;
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().ok_or_else(|| {
        Error::Other(format!(
            "cannot extract parent directory from {}",
            path.display()
        ))
    })?;

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(Error::Other(format!(
        "could not find unique filename for {} after {MAX_RENAME_ATTEMPTS} attempts",
        path.display()
    )))
}

/// Derive a file name for a direct HTTP fetch
///
/// Order: `Content-Disposition` (`filename*=` RFC 5987, then `filename=`), then the last URL
/// path segment, then `"download"`. The result is sanitised and keeps its extension.
pub fn filename_from_headers(headers: &HeaderMap, url: &str) -> String {
    if let Some(value) = headers.get(CONTENT_DISPOSITION)
        && let Ok(value) = value.to_str()
        && let Some(name) = parse_content_disposition(value)
    {
        let name = sanitize_filename(&name);
        if !name.is_empty() {
            return name;
        }
    }

    if let Ok(parsed) = url::Url::parse(url)
        && let Some(mut segments) = parsed.path_segments()
        && let Some(last) = segments.next_back()
        && !last.is_empty()
    {
        let decoded = urlencoding::decode(last)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| last.to_string());
        let name = sanitize_filename(&decoded);
        if !name.is_empty() {
            return name;
        }
    }

    "download".to_string()
}

fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'percent-encoded
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            plain = Some(name.trim_matches('"').to_string());
        }
    }
    plain
}

/// Strip path separators and control characters from a server-supplied file name
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() || cleaned == ".." {
        String::new()
    } else {
        cleaned
    }
}

/// Whether the URL path ends in a known video or audio extension
///
/// ```
/// use media_dl::utils::is_direct_media_url;
///
/// assert!(is_direct_media_url(&url::Url::parse("https://cdn.example/a/clip.MP4").unwrap()));
/// assert!(!is_direct_media_url(&url::Url::parse("https://example.com/watch?v=1").unwrap()));
/// ```
#[must_use]
pub fn is_direct_media_url(url: &url::Url) -> bool {
    let Some(ext) = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    else {
        return false;
    };
    VIDEO_EXTENSIONS.contains(&ext.as_str()) || AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// Delete a partial output artifact and the working files a fetch tool leaves next to it,
/// returning whether anything was removed
///
/// Besides `path` itself this removes `<name>.part`, `<name>.ytdl`, `<name>.part-Frag*` and
/// per-format streams such as `<stem>.f137.mp4` in the same directory. A missing file is not
/// an error. Directories are left alone.
pub async fn remove_artifact(path: &Path) -> std::io::Result<bool> {
    let mut removed = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => remove_file_if_present(path).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };

    let (Some(dir), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
    else {
        return Ok(removed);
    };
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(candidate) = file_name.to_str() else {
            continue;
        };
        if is_partial_sibling(name, candidate) && entry.file_type().await?.is_file() {
            removed |= remove_file_if_present(&entry.path()).await?;
        }
    }
    Ok(removed)
}

async fn remove_file_if_present(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `candidate` is a working file belonging to the artifact named `name`
fn is_partial_sibling(name: &str, candidate: &str) -> bool {
    if let Some(rest) = candidate.strip_prefix(name) {
        return rest == ".part" || rest == ".ytdl" || rest.starts_with(".part-Frag");
    }

    // Separate video/audio streams downloaded before the merge
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    candidate
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix(".f"))
        .is_some_and(|rest| {
            let digits = rest.chars().take_while(char::is_ascii_digit).count();
            digits > 0 && rest[digits..].starts_with('.')
        })
}
