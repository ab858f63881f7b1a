//! Adaptive stream player.
//!
//! The player chooses adaptive or native playback for a resolved source,
//! walks a small state machine, and recovers from transport and decode
//! faults a bounded number of times before reporting a terminal error.
//! Every attachment is stamped with a [`Generation`] so nothing a released
//! attachment reports can reach the listener.

pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod headless;
pub mod player;
pub mod runtime;
pub mod state;
pub mod strategy;

pub use config::PlaybackConfig;
pub use driver::{PlaybackControl, PlayerCommand, PlayerDriver, PlayerHandle};
pub use error::{ErrorKind, FaultClass, PlayerError};
pub use events::{
    EventSink, Generation, MediaEvent, MediaFault, NoopListener, PlayerListener, TaggedEvent,
};
pub use headless::{HeadlessConfig, HeadlessRuntime};
pub use player::{AdaptiveStreamPlayer, PlaybackSession};
pub use runtime::{AttachRequest, MediaAttachment, MediaRuntime};
pub use state::PlayerState;
pub use strategy::{PlaybackStrategy, select_strategy};
