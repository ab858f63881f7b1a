//! Manifest fetching and parsing for the headless runtime.

use std::time::Duration;

use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist, VariantStream, parse_playlist_res};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::FaultClass;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid manifest URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("failed to parse playlist: {0}")]
    Parse(String),

    #[error("playlist has no playable content: {0}")]
    Empty(String),
}

impl ManifestError {
    /// Transport problems are network faults. A manifest that arrived but
    /// cannot be played is a media fault.
    pub fn fault_class(&self) -> FaultClass {
        match self {
            Self::InvalidUrl { .. } | Self::Transport(_) | Self::Status { .. } => {
                FaultClass::Network
            }
            Self::Parse(_) | Self::Empty(_) => FaultClass::Media,
        }
    }
}

/// The media playlist a stream resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub playlist_url: String,
    pub duration: f64,
    pub segments: usize,
    pub bandwidth: Option<u64>,
    /// Whether the playlist is complete (VOD) rather than live.
    pub end_list: bool,
}

pub fn parse_playlist(bytes: &[u8]) -> Result<Playlist, ManifestError> {
    parse_playlist_res(bytes).map_err(|e| ManifestError::Parse(e.to_string()))
}

/// Picks the highest-bandwidth variant at or below `max_bandwidth`, or the
/// lowest one when every variant exceeds it. I-frame variants are skipped.
pub fn select_variant(
    master: &MasterPlaylist,
    max_bandwidth: Option<u64>,
) -> Option<&VariantStream> {
    let playable = || master.variants.iter().filter(|v| !v.is_i_frame);
    match max_bandwidth {
        None => playable().max_by_key(|v| v.bandwidth),
        Some(ceiling) => playable()
            .filter(|v| v.bandwidth <= ceiling)
            .max_by_key(|v| v.bandwidth)
            .or_else(|| playable().min_by_key(|v| v.bandwidth)),
    }
}

/// Total duration of a media playlist in seconds.
pub fn media_duration(playlist: &MediaPlaylist) -> f64 {
    playlist
        .segments
        .iter()
        .map(|s| f64::from(s.duration))
        .sum()
}

async fn fetch_playlist(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<Playlist, ManifestError> {
    let response = client.get(url.clone()).timeout(timeout).send().await?;
    if !response.status().is_success() {
        return Err(ManifestError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    let bytes = response.bytes().await?;
    parse_playlist(&bytes)
}

fn join(base: &Url, uri: &str) -> Result<Url, ManifestError> {
    base.join(uri).map_err(|e| ManifestError::InvalidUrl {
        url: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Fetches `url`, follows a master playlist to one variant and measures the
/// resulting media playlist.
pub async fn resolve_media(
    client: &Client,
    url: &str,
    max_bandwidth: Option<u64>,
    timeout: Duration,
) -> Result<ResolvedMedia, ManifestError> {
    let playlist_url = Url::parse(url).map_err(|e| ManifestError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let (media, media_url, bandwidth) =
        match fetch_playlist(client, &playlist_url, timeout).await? {
            Playlist::MediaPlaylist(media) => (media, playlist_url, None),
            Playlist::MasterPlaylist(master) => {
                let variant = select_variant(&master, max_bandwidth).ok_or_else(|| {
                    ManifestError::Empty(format!("master playlist {playlist_url} has no variants"))
                })?;
                let variant_url = join(&playlist_url, &variant.uri)?;
                debug!(
                    bandwidth = variant.bandwidth,
                    variant = %variant_url,
                    "selected variant"
                );
                match fetch_playlist(client, &variant_url, timeout).await? {
                    Playlist::MediaPlaylist(media) => {
                        (media, variant_url, Some(variant.bandwidth))
                    }
                    Playlist::MasterPlaylist(_) => {
                        return Err(ManifestError::Parse(format!(
                            "variant {variant_url} is itself a master playlist"
                        )));
                    }
                }
            }
        };

    if media.segments.is_empty() {
        return Err(ManifestError::Empty(format!(
            "media playlist {media_url} has no segments"
        )));
    }

    Ok(ResolvedMedia {
        playlist_url: media_url.to_string(),
        duration: media_duration(&media),
        segments: media.segments.len(),
        bandwidth,
        end_list: media.end_list,
    })
}
