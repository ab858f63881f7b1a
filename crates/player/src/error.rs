use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::PlayerState;

/// Error taxonomy surfaced to the caller.
///
/// Only `UnsupportedFormat`, and `NetworkError`/`MediaError` once their
/// recovery budget is spent, ever reach the player's `on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    NetworkError,
    MediaError,
    PersistenceError,
    ResolutionAmbiguous,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::NetworkError => "NetworkError",
            Self::MediaError => "MediaError",
            Self::PersistenceError => "PersistenceError",
            Self::ResolutionAmbiguous => "ResolutionAmbiguous",
        }
    }

    /// Whether the player may try to recover from this error on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::MediaError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer a media fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultClass {
    /// Manifest or segment transport failure.
    Network,
    /// Decode or corruption failure.
    Media,
}

impl FaultClass {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Network => ErrorKind::NetworkError,
            Self::Media => ErrorKind::MediaError,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: PlayerState, to: PlayerState },

    #[error("player driver is closed")]
    Closed,
}
