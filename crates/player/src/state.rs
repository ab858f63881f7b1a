//! Player state machine.

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// Playback states of a single player instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    /// No source attached.
    #[default]
    Idle,
    /// A source was assigned and the stream is loading.
    Attaching,
    /// Media is playing.
    Playing,
    /// Playback stalled waiting for data.
    Buffering,
    /// A recoverable fault is being handled.
    Recovering,
    /// The stream reached its natural end.
    Ended,
    /// Recovery was exhausted or the format is unsupported.
    Failed,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Attaching => "ATTACHING",
            Self::Playing => "PLAYING",
            Self::Buffering => "BUFFERING",
            Self::Recovering => "RECOVERING",
            Self::Ended => "ENDED",
            Self::Failed => "FAILED",
        }
    }

    /// Check if this state only leaves through teardown.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if a stream attachment is live in this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Attaching | Self::Playing | Self::Buffering | Self::Recovering
        )
    }

    /// Check if a fault in this state may be recovered from.
    pub fn accepts_faults(&self) -> bool {
        matches!(self, Self::Attaching | Self::Playing | Self::Buffering)
    }

    /// Validate a state transition.
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;

        match (self, target) {
            (from, to) if from == &to => true,

            // Teardown is always allowed
            (_, Idle) => true,

            (Idle, Attaching) => true,

            (Attaching, Playing | Recovering | Failed) => true,

            // Failed is reached directly once a recovery budget is spent
            (Playing, Buffering | Ended | Recovering | Failed) => true,

            (Buffering, Playing | Ended | Recovering | Failed) => true,

            (Recovering, Attaching | Failed) => true,

            // Replay after the end
            (Ended, Playing) => true,

            _ => false,
        }
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&self, target: PlayerState) -> Result<PlayerState, PlayerError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(PlayerError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
