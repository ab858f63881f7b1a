use serde::{Deserialize, Serialize};

/// Recovery budgets, counted per error class for the lifetime of one
/// playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Reloads from the last known position after a transport failure.
    pub network_retries: u32,
    /// In-place recoveries after a decode failure.
    pub media_recoveries: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            network_retries: 1,
            media_recoveries: 1,
        }
    }
}
