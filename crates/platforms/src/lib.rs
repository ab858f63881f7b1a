//! Video source resolution.
//!
//! Classifies arbitrary video URLs against an ordered table of hosting
//! platforms and produces a normalized [`VideoSource`] with embed and
//! thumbnail URLs, falling back to direct playback for anything else.

pub mod media;
pub mod platform;
pub mod resolver;
mod utils;

pub use media::{ManifestKind, StreamKind, classify_stream, is_playable_direct};
pub use platform::{PlatformDescriptor, PlatformTag, detect_platform, platforms};
pub use resolver::{SourcePlatform, SourceSlot, VideoSource, resolve};
