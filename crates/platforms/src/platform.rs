use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::capture_group_1;

/// Third-party hosting platforms with a known share-link shape.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformTag {
    YouTube,
    Vimeo,
    Dailymotion,
    Wistia,
    Loom,
    Streamable,
}

impl PlatformTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::YouTube => "YouTube",
            PlatformTag::Vimeo => "Vimeo",
            PlatformTag::Dailymotion => "Dailymotion",
            PlatformTag::Wistia => "Wistia",
            PlatformTag::Loom => "Loom",
            PlatformTag::Streamable => "Streamable",
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Detection patterns are anchored at the scheme so a platform link carried
// inside another URL's query string never matches.

static YOUTUBE_DETECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch|embed/|shorts/|live/|v/)|youtube-nocookie\.com/embed/|youtu\.be/)",
    )
    .unwrap()
});
static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)|youtube-nocookie\.com/embed/|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/]|$)",
    )
    .unwrap()
});

static VIMEO_DETECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:(?:www\.)?vimeo\.com/(?:channels/|groups/|video/|\d)|player\.vimeo\.com/video/)")
        .unwrap()
});
static VIMEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:(?:www\.)?vimeo\.com/(?:channels/[\w-]+/|groups/[\w-]+/videos/|video/)?|player\.vimeo\.com/video/)(\d+)(?:[/?#]|$)",
    )
    .unwrap()
});

static DAILYMOTION_DETECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:(?:www\.)?dailymotion\.com/(?:embed/)?video/|dai\.ly/)").unwrap()
});
static DAILYMOTION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:(?:www\.)?dailymotion\.com/(?:embed/)?video/|dai\.ly/)([A-Za-z0-9]+)(?:[_/?#&]|$)",
    )
    .unwrap()
});

static WISTIA_DETECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:[\w-]+\.)?(?:wistia\.(?:com|net)/(?:medias|embed/iframe)/|wi\.st/medias/)")
        .unwrap()
});
static WISTIA_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:[\w-]+\.)?(?:wistia\.(?:com|net)/(?:medias|embed/iframe)/|wi\.st/medias/)([a-z0-9]{10})(?:[/?#]|$)",
    )
    .unwrap()
});

static LOOM_DETECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(?:www\.)?loom\.com/(?:share|embed)/").unwrap());
static LOOM_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?loom\.com/(?:share|embed)/(?:[\w-]*-)?([a-f0-9]{32})(?:[/?#]|$)")
        .unwrap()
});

static STREAMABLE_DETECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?streamable\.com/(?:[eos]/)?[A-Za-z0-9]").unwrap()
});
static STREAMABLE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?streamable\.com/(?:[eos]/)?([A-Za-z0-9]{4,8})(?:[/?#]|$)")
        .unwrap()
});

fn youtube_embed(id: &str) -> String {
    format!("https://www.youtube.com/embed/{id}")
}

fn youtube_thumbnail(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/hqdefault.jpg")
}

fn vimeo_embed(id: &str) -> String {
    format!("https://player.vimeo.com/video/{id}")
}

fn vimeo_thumbnail(id: &str) -> String {
    format!("https://vumbnail.com/{id}.jpg")
}

fn dailymotion_embed(id: &str) -> String {
    format!("https://www.dailymotion.com/embed/video/{id}")
}

fn dailymotion_thumbnail(id: &str) -> String {
    format!("https://www.dailymotion.com/thumbnail/video/{id}")
}

fn wistia_embed(id: &str) -> String {
    format!("https://fast.wistia.net/embed/iframe/{id}")
}

fn loom_embed(id: &str) -> String {
    format!("https://www.loom.com/embed/{id}")
}

fn loom_thumbnail(id: &str) -> String {
    format!("https://cdn.loom.com/sessions/thumbnails/{id}-with-play.gif")
}

fn streamable_embed(id: &str) -> String {
    format!("https://streamable.com/e/{id}")
}

fn streamable_thumbnail(id: &str) -> String {
    format!("https://cdn-cf-east.streamable.com/image/{id}.jpg")
}

/// How to recognize and resolve the URLs of one hosting platform.
pub struct PlatformDescriptor {
    pub tag: PlatformTag,
    detect: &'static LazyLock<Regex>,
    extract: &'static LazyLock<Regex>,
    embed: fn(&str) -> String,
    thumbnail: Option<fn(&str) -> String>,
}

impl PlatformDescriptor {
    pub fn detect(&self, url: &str) -> bool {
        self.detect.is_match(url)
    }

    pub fn extract_id<'a>(&self, url: &'a str) -> Option<&'a str> {
        capture_group_1(self.extract, url)
    }

    pub fn embed_url_of(&self, id: &str) -> String {
        (self.embed)(id)
    }

    pub fn thumbnail_url_of(&self, id: &str) -> Option<String> {
        self.thumbnail.map(|thumbnail| thumbnail(id))
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }
}

impl fmt::Debug for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDescriptor")
            .field("tag", &self.tag)
            .field("detect", &self.detect.as_str())
            .finish()
    }
}

macro_rules! platform_registry {
    ( $( $tag:ident => ($detect:path, $extract:path, $embed:path, $thumbnail:expr) ),+ $(,)? ) => {
        &[
            $(
                PlatformDescriptor {
                    tag: PlatformTag::$tag,
                    detect: &$detect,
                    extract: &$extract,
                    embed: $embed,
                    thumbnail: $thumbnail,
                },
            )+
        ]
    };
}

// Static platform registry. Order is the tie-break: first match wins.
static PLATFORMS: &[PlatformDescriptor] = platform_registry![
    YouTube => (YOUTUBE_DETECT, YOUTUBE_ID, youtube_embed, Some(youtube_thumbnail)),
    Vimeo => (VIMEO_DETECT, VIMEO_ID, vimeo_embed, Some(vimeo_thumbnail)),
    Dailymotion => (DAILYMOTION_DETECT, DAILYMOTION_ID, dailymotion_embed, Some(dailymotion_thumbnail)),
    Wistia => (WISTIA_DETECT, WISTIA_ID, wistia_embed, None),
    Loom => (LOOM_DETECT, LOOM_ID, loom_embed, Some(loom_thumbnail)),
    Streamable => (STREAMABLE_DETECT, STREAMABLE_ID, streamable_embed, Some(streamable_thumbnail)),
];

/// The ordered, read-only descriptor table.
pub fn platforms() -> &'static [PlatformDescriptor] {
    PLATFORMS
}

/// First descriptor whose detection pattern matches `url`.
pub fn detect_platform(url: &str) -> Option<&'static PlatformDescriptor> {
    PLATFORMS.iter().find(|platform| platform.detect(url))
}
