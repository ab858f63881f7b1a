use serde::{Deserialize, Serialize};

/// Write gate for progress samples.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProgressConfig {
    /// Samples are persisted when the percent is a multiple of this step.
    pub step_percent: u8,
    /// Samples above this percent are persisted and count as completed.
    pub completion_threshold: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            step_percent: 5,
            completion_threshold: 95,
        }
    }
}

impl ProgressConfig {
    pub fn is_completion(&self, percent: u8) -> bool {
        percent > self.completion_threshold
    }

    pub fn should_write(&self, percent: u8) -> bool {
        percent % self.step_percent.max(1) == 0 || self.is_completion(percent)
    }
}

/// `floor(current / duration * 100)`, capped to 100. `None` when the
/// duration is not known yet.
pub fn sample_percent(current_time: f64, duration: f64) -> Option<u8> {
    if !duration.is_finite() || duration <= 0.0 || !current_time.is_finite() {
        return None;
    }
    let percent = (current_time.max(0.0) / duration * 100.0).floor();
    Some(percent.min(100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_gate() {
        let config = ProgressConfig::default();
        assert!(config.should_write(0));
        assert!(config.should_write(45));
        assert!(!config.should_write(46));
        assert!(config.should_write(95));
        assert!(!config.is_completion(95));
        assert!(config.should_write(97));
        assert!(config.is_completion(97));
    }

    #[test]
    fn test_zero_step_writes_every_percent() {
        let config = ProgressConfig {
            step_percent: 0,
            completion_threshold: 95,
        };
        assert!(config.should_write(13));
    }

    #[test]
    fn test_sample_percent() {
        assert_eq!(sample_percent(97.0, 100.0), Some(97));
        assert_eq!(sample_percent(59.9, 600.0), Some(9));
        assert_eq!(sample_percent(700.0, 600.0), Some(100));
        assert_eq!(sample_percent(10.0, 0.0), None);
        assert_eq!(sample_percent(10.0, f64::NAN), None);
    }
}
