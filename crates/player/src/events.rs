use std::fmt;

use tokio::sync::mpsc;

use crate::error::{ErrorKind, FaultClass};
use crate::state::PlayerState;

/// Identifies one stream attachment. Events carrying any other generation
/// than the player's live one are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub(crate) u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaFault {
    pub class: FaultClass,
    pub detail: String,
}

impl MediaFault {
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            class: FaultClass::Network,
            detail: detail.into(),
        }
    }

    pub fn media(detail: impl Into<String>) -> Self {
        Self {
            class: FaultClass::Media,
            detail: detail.into(),
        }
    }
}

/// Events a media runtime reports for an attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Manifest parsed or metadata loaded; the stream can start.
    MetadataLoaded { duration: f64 },
    /// Periodic position report at the runtime's native cadence.
    TimeUpdate { current_time: f64, duration: f64 },
    /// Playback stalled waiting for data.
    Waiting,
    /// Playback (re)started.
    Playing,
    /// Natural end of stream.
    Ended,
    Error(MediaFault),
}

#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub generation: Generation,
    pub event: MediaEvent,
}

/// Sender half handed to an attachment. Stamps every event with the
/// attachment's generation.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub(crate) fn new(generation: Generation, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns false once the player side has gone away.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// The event surface exposed to the surrounding UI layer.
pub trait PlayerListener: Send + Sync {
    fn on_time_update(&self, _current_time: f64, _duration: f64) {}

    fn on_ended(&self) {}

    fn on_error(&self, _kind: ErrorKind) {}

    fn on_state_change(&self, _state: PlayerState) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl PlayerListener for NoopListener {}
