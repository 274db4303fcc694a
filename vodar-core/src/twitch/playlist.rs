use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Stream-identifier label the platform uses for the multi-segment source
/// rendition.
pub const CHUNKED_GROUP: &str = "chunked";

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("missing #EXTM3U header")]
    MissingHeader,
    #[error("invalid {tag} value: {value}")]
    InvalidTag { tag: &'static str, value: String },
    #[error("invalid rendition url {url}: {source}")]
    RenditionUrl { url: String, source: url::ParseError },
    #[error("cannot resolve segment uri {uri} against {base}: {source}")]
    SegmentUrl {
        uri: String,
        base: String,
        source: url::ParseError,
    },
}

pub type PlaylistResult<T> = Result<T, PlaylistError>;

/// One quality variant of a master manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionVariant {
    pub url: String,
    pub resolution: String,
    pub frame_rate: f64,
    pub chunked: bool,
}

/// One media segment of a rendition manifest. `path`/`downloaded` are filled
/// in by the downloader.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: u64,
    pub uri: String,
    pub duration: f64,
    pub path: Option<PathBuf>,
    pub downloaded: bool,
}

/// Picks the variant with the strictly largest pixel area from a master
/// manifest. Variants without a resolution are ignored; on equal area the
/// first one seen wins. Returns `None` for media-kind input or when no
/// variant qualifies.
pub fn resolve_best_rendition(contents: &str) -> PlaylistResult<Option<RenditionVariant>> {
    if !contents.trim_start().starts_with("#EXTM3U") {
        return Err(PlaylistError::MissingHeader);
    }
    if !is_master(contents) {
        return Ok(None);
    }

    let mut best: Option<(u64, RenditionVariant)> = None;
    let mut pending: Option<(String, f64, bool)> = None;
    for line in contents.lines().map(str::trim) {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let attributes = parse_attributes(attrs);
            let resolution = attributes.get("RESOLUTION").cloned().unwrap_or_default();
            let frame_rate = attributes
                .get("FRAME-RATE")
                .and_then(|value| value.parse().ok())
                .unwrap_or(0.0);
            let chunked = attributes
                .get("VIDEO")
                .map(|value| value == CHUNKED_GROUP)
                .unwrap_or(false);
            pending = Some((resolution, frame_rate, chunked));
        } else if line.starts_with('#') || line.is_empty() {
            continue;
        } else if let Some((resolution, frame_rate, chunked)) = pending.take() {
            if resolution.is_empty() {
                continue;
            }
            let Some(area) = resolution_area(&resolution) else {
                continue;
            };
            let replace = best.as_ref().map(|(max, _)| area > *max).unwrap_or(true);
            if replace {
                best = Some((
                    area,
                    RenditionVariant {
                        url: line.to_string(),
                        resolution,
                        frame_rate,
                        chunked,
                    },
                ));
            }
        }
    }
    Ok(best.map(|(_, variant)| variant))
}

/// Enumerates the segments of a media-kind manifest, assigning the
/// platform's sequence ids (`EXT-X-MEDIA-SEQUENCE` offset plus position) and
/// resolving each URI against the rendition URL. Master-kind input yields an
/// empty sequence.
pub fn resolve_segments(contents: &str, rendition_url: &str) -> PlaylistResult<Vec<Segment>> {
    if !contents.trim_start().starts_with("#EXTM3U") {
        return Err(PlaylistError::MissingHeader);
    }
    if is_master(contents) {
        return Ok(Vec::new());
    }

    let base = Url::parse(rendition_url).map_err(|source| PlaylistError::RenditionUrl {
        url: rendition_url.to_string(),
        source,
    })?;

    let mut media_sequence = 0u64;
    let mut pending_duration: Option<f64> = None;
    let mut segments = Vec::new();
    for line in contents.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            media_sequence = value.parse().map_err(|_| PlaylistError::InvalidTag {
                tag: "EXT-X-MEDIA-SEQUENCE",
                value: value.to_string(),
            })?;
        } else if let Some(value) = line.strip_prefix("#EXTINF:") {
            let raw = value.split_once(',').map(|(head, _)| head).unwrap_or(value);
            let duration = raw.trim().parse().map_err(|_| PlaylistError::InvalidTag {
                tag: "EXTINF",
                value: value.to_string(),
            })?;
            pending_duration = Some(duration);
        } else if line.starts_with('#') || line.is_empty() {
            continue;
        } else if let Some(duration) = pending_duration.take() {
            let uri = resolve_uri(&base, line)?;
            segments.push(Segment {
                id: media_sequence + segments.len() as u64,
                uri,
                duration,
                path: None,
                downloaded: false,
            });
        }
    }
    Ok(segments)
}

fn is_master(contents: &str) -> bool {
    contents.contains("#EXT-X-STREAM-INF")
}

fn resolution_area(resolution: &str) -> Option<u64> {
    let (width, height) = resolution.split_once('x')?;
    let width: u64 = width.trim().parse().ok()?;
    let height: u64 = height.trim().parse().ok()?;
    Some(width * height)
}

/// Splits an attribute list on commas outside quotes; quotes are dropped
/// from values.
fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in input.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    let mut attributes = HashMap::new();
    for part in parts {
        if let Some((key, value)) = part.split_once('=') {
            attributes.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    attributes
}

fn resolve_uri(base: &Url, uri: &str) -> PlaylistResult<String> {
    if let Ok(parsed) = Url::parse(uri) {
        if matches!(parsed.scheme(), "http" | "https" | "file") {
            return Ok(uri.to_string());
        }
    }
    base.join(uri)
        .map(String::from)
        .map_err(|source| PlaylistError::SegmentUrl {
            uri: uri.to_string(),
            base: base.to_string(),
            source,
        })
}
