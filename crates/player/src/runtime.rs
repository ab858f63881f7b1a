use platforms_resolver::{ManifestKind, StreamKind};
use tokio_util::sync::CancellationToken;

use crate::events::EventSink;
use crate::strategy::PlaybackStrategy;

/// Everything a runtime needs to create one attachment.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub url: String,
    pub kind: StreamKind,
    pub strategy: PlaybackStrategy,
    pub sink: EventSink,
    /// Cancelled when the attachment is torn down.
    pub token: CancellationToken,
}

/// The media runtime a player renders into: a browser media element with an
/// optional adaptive client, or the headless runtime.
pub trait MediaRuntime: Send + Sync {
    /// Whether the adaptive client can play this manifest format here.
    fn supports_adaptive_client(&self, format: ManifestKind) -> bool;

    /// Whether native playback declares support for `mime`.
    fn native_supports(&self, mime: &str) -> bool;

    fn attach(&self, request: AttachRequest) -> Box<dyn MediaAttachment>;
}

/// One live stream attachment. All methods return immediately; outcomes are
/// reported through the attachment's [`EventSink`].
pub trait MediaAttachment: Send {
    /// Start or restart loading, optionally from a position in seconds.
    fn load(&mut self, start_position: Option<f64>);

    /// Re-attach the media pipeline in place without reloading the stream.
    fn recover_media(&mut self);

    fn seek(&mut self, position: f64);

    /// Release decoder and network resources. Called exactly once.
    fn release(&mut self);
}
