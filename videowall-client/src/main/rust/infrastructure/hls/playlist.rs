use std::collections::HashMap;
use std::time::Duration;

use crate::domain::value_objects::PlaybackFailure;

const HEADER: &str = "#EXTM3U";

#[derive(Debug, Clone, PartialEq)]
pub struct VariantStream {
    pub uri: String,
    pub bandwidth: Option<u64>,
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRef {
    pub sequence: u64,
    pub duration: Duration,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    pub target_duration: Duration,
    pub media_sequence: u64,
    pub segments: Vec<SegmentRef>,
    pub ended: bool,
}

impl MediaPlaylist {
    pub fn last_sequence(&self) -> Option<u64> {
        self.segments.last().map(|s| s.sequence)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(Vec<VariantStream>),
    Media(MediaPlaylist),
}

fn invalid(reason: impl Into<String>) -> PlaybackFailure {
    PlaybackFailure::ManifestInvalid(reason.into())
}

/// Parse an HLS master or media playlist
pub fn parse(text: &str) -> Result<Playlist, PlaybackFailure> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some(HEADER) {
        return Err(invalid("missing #EXTM3U header"));
    }

    let mut variants = Vec::new();
    let mut pending_variant: Option<VariantStream> = None;

    let mut target_duration = None;
    let mut media_sequence = 0u64;
    let mut segments = Vec::new();
    let mut pending_duration: Option<Duration> = None;
    let mut ended = false;

    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let attrs = parse_attributes(attrs);
            pending_variant = Some(VariantStream {
                uri: String::new(),
                bandwidth: attrs.get("BANDWIDTH").and_then(|b| b.parse().ok()),
                resolution: attrs.get("RESOLUTION").cloned(),
            });
        } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            let secs: u64 = value
                .parse()
                .map_err(|_| invalid(format!("bad target duration '{value}'")))?;
            target_duration = Some(Duration::from_secs(secs));
        } else if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            media_sequence = value
                .parse()
                .map_err(|_| invalid(format!("bad media sequence '{value}'")))?;
        } else if let Some(value) = line.strip_prefix("#EXTINF:") {
            let secs = value.split(',').next().unwrap_or_default();
            let secs: f64 = secs
                .parse()
                .map_err(|_| invalid(format!("bad segment duration '{secs}'")))?;
            let duration = Duration::try_from_secs_f64(secs)
                .map_err(|_| invalid(format!("bad segment duration '{secs}'")))?;
            pending_duration = Some(duration);
        } else if line == "#EXT-X-ENDLIST" {
            ended = true;
        } else if line.starts_with('#') {
            continue;
        } else if let Some(mut variant) = pending_variant.take() {
            variant.uri = line.to_string();
            variants.push(variant);
        } else if let Some(duration) = pending_duration.take() {
            let sequence = u64::try_from(segments.len())
                .ok()
                .and_then(|offset| media_sequence.checked_add(offset))
                .ok_or_else(|| invalid(format!("media sequence overflows at '{line}'")))?;
            segments.push(SegmentRef {
                sequence,
                duration,
                uri: line.to_string(),
            });
        } else {
            return Err(invalid(format!("URI '{line}' without preceding tag")));
        }
    }

    if !variants.is_empty() {
        return Ok(Playlist::Master(variants));
    }

    let target_duration = target_duration.ok_or_else(|| invalid("missing #EXT-X-TARGETDURATION"))?;
    Ok(Playlist::Media(MediaPlaylist {
        target_duration,
        media_sequence,
        segments,
        ended,
    }))
}

/// Split `KEY=VALUE,KEY="quoted,value"` attribute lists
fn parse_attributes(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut in_quotes = false;
    let mut start = 0;

    let mut push = |part: &str| {
        if let Some((key, value)) = part.split_once('=') {
            attrs.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
        }
    };

    for (i, c) in raw.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&raw[start..]);
    attrs
}
