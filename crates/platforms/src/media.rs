//! Stream format classification.
//!
//! The player picks its playback strategy from the [`StreamKind`] of the
//! embed URL only; the hosting platform plays no part in that decision.

use serde::{Deserialize, Serialize};

use crate::utils::path_extension;

/// Segmented manifest formats an adaptive client can play.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Hls,
    Dash,
}

impl ManifestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Hls => "hls",
            ManifestKind::Dash => "dash",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ManifestKind::Hls => "application/vnd.apple.mpegurl",
            ManifestKind::Dash => "application/dash+xml",
        }
    }
}

/// Progressive (single file) containers recognized by extension.
const CONTAINERS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
    ("ogv", "video/ogg"),
    ("ogg", "video/ogg"),
    ("avi", "video/x-msvideo"),
    ("ts", "video/mp2t"),
    ("flv", "video/x-flv"),
];

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamKind {
    /// Segmented adaptive manifest (`.m3u8`, `.mpd`).
    Manifest { format: ManifestKind },
    /// A single media file with a recognized container extension.
    Progressive { container: String },
    /// No recognized extension. Still handed to native playback.
    Unknown,
}

impl StreamKind {
    pub fn is_manifest(&self) -> bool {
        matches!(self, StreamKind::Manifest { .. })
    }

    /// MIME type used when asking a runtime whether it can play this natively.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            StreamKind::Manifest { format } => Some(format.mime_type()),
            StreamKind::Progressive { container } => CONTAINERS
                .iter()
                .find(|(ext, _)| *ext == container.as_str())
                .map(|(_, mime)| *mime),
            StreamKind::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StreamKind::Manifest { format } => format.as_str(),
            StreamKind::Progressive { container } => container,
            StreamKind::Unknown => "unknown",
        }
    }
}

/// Classifies a stream URL by the extension of its path.
pub fn classify_stream(url: &str) -> StreamKind {
    let Some(ext) = path_extension(url) else {
        return StreamKind::Unknown;
    };
    match ext.as_str() {
        "m3u8" | "m3u" => StreamKind::Manifest {
            format: ManifestKind::Hls,
        },
        "mpd" => StreamKind::Manifest {
            format: ManifestKind::Dash,
        },
        other if CONTAINERS.iter().any(|(known, _)| *known == other) => StreamKind::Progressive {
            container: ext,
        },
        _ => StreamKind::Unknown,
    }
}

/// Whether a direct URL points at something a media element can be given:
/// a manifest or a recognized container. Resolution never calls this;
/// callers do before treating a `direct` source as playable.
pub fn is_playable_direct(url: &str) -> bool {
    !matches!(classify_stream(url), StreamKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_manifests() {
        assert_eq!(
            classify_stream("https://cdn.example.com/live/master.m3u8?token=1"),
            StreamKind::Manifest {
                format: ManifestKind::Hls
            }
        );
        assert_eq!(
            classify_stream("https://cdn.example.com/vod/manifest.MPD"),
            StreamKind::Manifest {
                format: ManifestKind::Dash
            }
        );
    }

    #[test]
    fn test_classify_progressive_and_unknown() {
        let kind = classify_stream("https://cdn.example.com/clip.webm");
        assert_eq!(
            kind,
            StreamKind::Progressive {
                container: "webm".to_string()
            }
        );
        assert_eq!(kind.mime_type(), Some("video/webm"));

        assert_eq!(classify_stream("https://cdn.example.com/doc.pdf"), StreamKind::Unknown);
        assert_eq!(
            classify_stream("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            StreamKind::Unknown
        );
    }

    #[test]
    fn test_is_playable_direct() {
        assert!(is_playable_direct("https://cdn.example.com/clip.mp4"));
        assert!(is_playable_direct("https://cdn.example.com/hls/index.m3u8"));
        assert!(!is_playable_direct("https://cdn.example.com/page.html"));
    }
}
