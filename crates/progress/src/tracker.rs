//! Throttled progress persistence.
//!
//! Samples are reduced to whole percents and only persisted on the
//! configured step or above the completion threshold, which bounds writes
//! to about twenty per playthrough. A failed write is recorded and logged,
//! and the next gated sample tries again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use player_engine::{ErrorKind, PlaybackControl};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ProgressConfig, sample_percent};
use crate::error::Result;
use crate::model::{ProgressFilter, ProgressKey, ProgressRecord};
use crate::store::ProgressStore;

/// The last persistence failure, kept as a non-fatal error field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceFailure {
    pub video_id: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl PersistenceFailure {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PersistenceError
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CachedProgress {
    last_written_percent: Option<u8>,
    completed: bool,
}

pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
    viewer_id: String,
    config: ProgressConfig,
    cache: Mutex<HashMap<String, CachedProgress>>,
    last_error: Mutex<Option<PersistenceFailure>>,
    control: Mutex<Option<Arc<dyn PlaybackControl>>>,
}

impl ProgressTracker {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        viewer_id: impl Into<String>,
        config: ProgressConfig,
    ) -> Self {
        Self {
            store,
            viewer_id: viewer_id.into(),
            config,
            cache: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
            control: Mutex::new(None),
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    /// Player used by [`ProgressTracker::reset`] to seek back to the start.
    pub fn attach_control(&self, control: Arc<dyn PlaybackControl>) {
        *self.control.lock() = Some(control);
    }

    pub fn detach_control(&self) {
        *self.control.lock() = None;
    }

    pub fn last_error(&self) -> Option<PersistenceFailure> {
        self.last_error.lock().clone()
    }

    fn key(&self, video_id: &str) -> ProgressKey {
        ProgressKey::new(video_id, &self.viewer_id)
    }

    /// Records a playback sample. Best-effort: errors are kept in
    /// [`ProgressTracker::last_error`] and never returned.
    pub async fn observe(&self, video_id: &str, current_time: f64, duration: f64) {
        let Some(percent) = sample_percent(current_time, duration) else {
            return;
        };
        if !self.config.should_write(percent) {
            return;
        }

        let Some(cached) = self.cached(video_id).await else {
            return;
        };
        let completed = cached.completed || self.config.is_completion(percent);

        // Claim the percent before writing so concurrent samples of the
        // same percent do not write twice.
        let previous = {
            let mut cache = self.cache.lock();
            let entry = cache.entry(video_id.to_string()).or_default();
            if entry.last_written_percent == Some(percent) {
                debug!(video_id, percent, "progress unchanged, skipping write");
                return;
            }
            entry.last_written_percent.replace(percent)
        };

        let record = ProgressRecord::new(&self.key(video_id), percent, completed);
        if self.write(&record).await {
            let mut cache = self.cache.lock();
            let entry = cache.entry(video_id.to_string()).or_default();
            entry.completed |= completed;
        } else {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get_mut(video_id)
                && entry.last_written_percent == Some(percent)
            {
                entry.last_written_percent = previous;
            }
        }
    }

    /// Force-writes `(100, completed)` regardless of cadence.
    pub async fn mark_completed(&self, video_id: &str) {
        let record = ProgressRecord::new(&self.key(video_id), 100, true);
        if self.write(&record).await {
            info!(video_id, viewer_id = %self.viewer_id, "video completed");
            self.cache.lock().insert(
                video_id.to_string(),
                CachedProgress {
                    last_written_percent: Some(100),
                    completed: true,
                },
            );
        }
    }

    /// Force-writes `(0, not completed)` and seeks the attached player to 0.
    pub async fn reset(&self, video_id: &str) {
        // Completion is sticky on upsert, so the old record goes first.
        let filter = ProgressFilter::viewer(&self.viewer_id).with_videos([video_id]);
        let cleared = match self.store.delete(&filter).await {
            Ok(_) => true,
            Err(e) => {
                self.record_failure(video_id, e.to_string());
                false
            }
        };
        let record = ProgressRecord::new(&self.key(video_id), 0, false);
        if cleared && self.write(&record).await {
            info!(video_id, viewer_id = %self.viewer_id, "progress reset");
            self.cache.lock().insert(
                video_id.to_string(),
                CachedProgress {
                    last_written_percent: Some(0),
                    completed: false,
                },
            );
        }
        let control = self.control.lock().clone();
        if let Some(control) = control {
            control.seek_to(0.0);
        }
    }

    pub async fn fetch_one(&self, video_id: &str) -> Result<Option<ProgressRecord>> {
        let record = self.store.get(&self.key(video_id)).await?;
        if let Some(record) = &record {
            self.remember(record);
        }
        Ok(record)
    }

    pub async fn fetch_many<S: AsRef<str>>(
        &self,
        video_ids: &[S],
    ) -> Result<HashMap<String, ProgressRecord>> {
        let filter = ProgressFilter::viewer(&self.viewer_id)
            .with_videos(video_ids.iter().map(|id| id.as_ref().to_string()));
        let records = self.store.query(&filter).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                self.remember(&record);
                (record.video_id.clone(), record)
            })
            .collect())
    }

    /// Deletes every record of this viewer.
    pub async fn clear_history(&self) -> Result<u64> {
        let removed = self
            .store
            .delete(&ProgressFilter::viewer(&self.viewer_id))
            .await?;
        self.cache.lock().clear();
        info!(viewer_id = %self.viewer_id, removed, "progress history cleared");
        Ok(removed)
    }

    fn remember(&self, record: &ProgressRecord) {
        let mut cache = self.cache.lock();
        let entry = cache.entry(record.video_id.clone()).or_default();
        entry.completed |= record.completed;
    }

    /// Cache entry for `video_id`, seeded from the store on first use.
    async fn cached(&self, video_id: &str) -> Option<CachedProgress> {
        if let Some(cached) = self.cache.lock().get(video_id).copied() {
            return Some(cached);
        }

        match self.store.get(&self.key(video_id)).await {
            Ok(stored) => {
                let seeded = CachedProgress {
                    last_written_percent: stored.as_ref().map(|r| r.progress_percent),
                    completed: stored.is_some_and(|r| r.completed),
                };
                Some(*self.cache.lock().entry(video_id.to_string()).or_insert(seeded))
            }
            Err(e) => {
                self.record_failure(video_id, e.to_string());
                None
            }
        }
    }

    async fn write(&self, record: &ProgressRecord) -> bool {
        match self.store.upsert(record).await {
            Ok(()) => {
                debug!(
                    video_id = %record.video_id,
                    percent = record.progress_percent,
                    completed = record.completed,
                    "progress written"
                );
                self.last_error.lock().take();
                true
            }
            Err(e) => {
                self.record_failure(&record.video_id, e.to_string());
                false
            }
        }
    }

    fn record_failure(&self, video_id: &str, message: String) {
        warn!(video_id, error = %message, "progress write failed");
        *self.last_error.lock() = Some(PersistenceFailure {
            video_id: video_id.to_string(),
            message,
            at: Utc::now(),
        });
    }
}
