use std::fmt;

use platforms_resolver::StreamKind;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::runtime::MediaRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStrategy {
    /// Segmented manifest played through the adaptive client.
    Adaptive,
    /// Handed to the runtime's native media element.
    Native,
}

impl PlaybackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adaptive => "adaptive",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for PlaybackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks how a stream of `kind` is played on `runtime`.
///
/// Manifests prefer the adaptive client, then native support for the
/// manifest MIME type. Everything else goes to native playback, since
/// resolution never enforces playability.
pub fn select_strategy(
    kind: &StreamKind,
    runtime: &dyn MediaRuntime,
) -> Result<PlaybackStrategy, ErrorKind> {
    match kind {
        StreamKind::Manifest { format } => {
            if runtime.supports_adaptive_client(*format) {
                Ok(PlaybackStrategy::Adaptive)
            } else if runtime.native_supports(format.mime_type()) {
                Ok(PlaybackStrategy::Native)
            } else {
                Err(ErrorKind::UnsupportedFormat)
            }
        }
        StreamKind::Progressive { .. } | StreamKind::Unknown => Ok(PlaybackStrategy::Native),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{AttachRequest, MediaAttachment};
    use platforms_resolver::{ManifestKind, classify_stream};

    struct Caps {
        adaptive_hls: bool,
        native: &'static [&'static str],
    }

    impl MediaRuntime for Caps {
        fn supports_adaptive_client(&self, format: ManifestKind) -> bool {
            self.adaptive_hls && format == ManifestKind::Hls
        }

        fn native_supports(&self, mime: &str) -> bool {
            self.native.contains(&mime)
        }

        fn attach(&self, _request: AttachRequest) -> Box<dyn MediaAttachment> {
            unimplemented!("strategy tests never attach")
        }
    }

    #[test]
    fn test_manifest_prefers_adaptive_client() {
        let runtime = Caps {
            adaptive_hls: true,
            native: &["application/vnd.apple.mpegurl"],
        };
        let kind = classify_stream("https://cdn.example.com/master.m3u8");
        assert_eq!(select_strategy(&kind, &runtime), Ok(PlaybackStrategy::Adaptive));
    }

    #[test]
    fn test_manifest_falls_back_to_native() {
        let runtime = Caps {
            adaptive_hls: false,
            native: &["application/vnd.apple.mpegurl"],
        };
        let kind = classify_stream("https://cdn.example.com/master.m3u8");
        assert_eq!(select_strategy(&kind, &runtime), Ok(PlaybackStrategy::Native));
    }

    #[test]
    fn test_manifest_unsupported() {
        let runtime = Caps {
            adaptive_hls: true,
            native: &[],
        };
        let kind = classify_stream("https://cdn.example.com/vod/manifest.mpd");
        assert_eq!(
            select_strategy(&kind, &runtime),
            Err(ErrorKind::UnsupportedFormat)
        );
    }

    #[test]
    fn test_progressive_and_unknown_go_native() {
        let runtime = Caps {
            adaptive_hls: false,
            native: &[],
        };
        for url in [
            "https://cdn.example.com/clip.mp4",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            let kind = classify_stream(url);
            assert_eq!(select_strategy(&kind, &runtime), Ok(PlaybackStrategy::Native));
        }
    }
}
