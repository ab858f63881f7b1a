use std::fmt;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::media::{StreamKind, classify_stream};
use crate::platform::{PlatformTag, detect_platform};

/// Where a source is hosted: a known platform, or a direct media URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourcePlatform {
    Hosted(PlatformTag),
    Direct,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::Hosted(tag) => tag.as_str(),
            SourcePlatform::Direct => "direct",
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, SourcePlatform::Direct)
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourcePlatform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The normalized, playable representation of a raw video URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSource {
    pub raw_url: String,
    pub platform: SourcePlatform,
    pub resolved_id: Option<String>,
    pub embed_url: String,
    pub thumbnail_url: Option<String>,
    /// The URL matched a platform but no id could be extracted; `embed_url`
    /// is the raw URL as a best-effort target.
    pub degraded: bool,
}

impl VideoSource {
    /// Classification of the URL the player will actually load.
    pub fn stream_kind(&self) -> StreamKind {
        classify_stream(&self.embed_url)
    }
}

/// Resolves a raw URL against the platform table. Never fails: anything
/// unrecognized becomes a `direct` source pointing at the input unchanged.
pub fn resolve(raw_url: &str) -> VideoSource {
    let trimmed = raw_url.trim();

    let Some(platform) = detect_platform(trimmed) else {
        debug!(url = %trimmed, "no platform matched, using direct playback");
        return VideoSource {
            raw_url: raw_url.to_string(),
            platform: SourcePlatform::Direct,
            resolved_id: None,
            embed_url: raw_url.to_string(),
            thumbnail_url: None,
            degraded: false,
        };
    };

    match platform.extract_id(trimmed) {
        Some(id) => {
            debug!(platform = %platform.tag, id, "resolved platform source");
            VideoSource {
                raw_url: raw_url.to_string(),
                platform: SourcePlatform::Hosted(platform.tag),
                resolved_id: Some(id.to_string()),
                embed_url: platform.embed_url_of(id),
                thumbnail_url: platform.thumbnail_url_of(id),
                degraded: false,
            }
        }
        None => {
            debug!(platform = %platform.tag, url = %trimmed, "platform matched but id extraction failed");
            VideoSource {
                raw_url: raw_url.to_string(),
                platform: SourcePlatform::Hosted(platform.tag),
                resolved_id: None,
                embed_url: raw_url.to_string(),
                thumbnail_url: None,
                degraded: true,
            }
        }
    }
}

/// Holds the source for one mounted player and re-resolves only when the
/// raw URL changes.
#[derive(Debug, Default)]
pub struct SourceSlot {
    current: Option<VideoSource>,
}

impl SourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the source for `raw_url` and whether it was recomputed.
    pub fn update(&mut self, raw_url: &str) -> (&VideoSource, bool) {
        let changed = self
            .current
            .as_ref()
            .is_none_or(|source| source.raw_url != raw_url);
        if changed {
            self.current = None;
        }
        let source = self.current.get_or_insert_with(|| resolve(raw_url));
        (source, changed)
    }

    pub fn current(&self) -> Option<&VideoSource> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
