use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`super::HeadlessRuntime`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeadlessConfig {
    /// How often a position report is emitted, in milliseconds.
    pub tick_interval_ms: u64,
    /// Media seconds advanced per wall-clock second.
    pub playback_rate: f64,
    /// Highest variant bandwidth (bits/s) picked from a master playlist.
    /// `None` picks the best variant.
    pub max_bandwidth: Option<u64>,
    /// Duration assumed for progressive files, whose length is not probed.
    pub default_duration_secs: f64,
    pub request_timeout_secs: u64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            playback_rate: 1.0,
            max_bandwidth: None,
            default_duration_secs: 60.0,
            request_timeout_secs: 15,
        }
    }
}

impl HeadlessConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Media time covered by one tick.
    pub fn tick_advance(&self) -> f64 {
        self.tick_interval().as_secs_f64() * self.playback_rate.max(0.0)
    }
}
