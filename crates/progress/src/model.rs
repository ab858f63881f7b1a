use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Unique key of a progress record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressKey {
    pub video_id: String,
    pub viewer_id: String,
}

impl ProgressKey {
    pub fn new(video_id: impl Into<String>, viewer_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            viewer_id: viewer_id.into(),
        }
    }
}

/// Persisted per-viewer, per-video completion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub video_id: String,
    pub viewer_id: String,
    /// 0 to 100.
    pub progress_percent: u8,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn new(key: &ProgressKey, progress_percent: u8, completed: bool) -> Self {
        Self {
            video_id: key.video_id.clone(),
            viewer_id: key.viewer_id.clone(),
            progress_percent: progress_percent.min(100),
            completed,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.video_id, &self.viewer_id)
    }
}

/// Selects the records of one viewer, optionally narrowed to some videos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressFilter {
    pub viewer_id: String,
    pub video_ids: Option<Vec<String>>,
}

impl ProgressFilter {
    pub fn viewer(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            video_ids: None,
        }
    }

    pub fn with_videos<I, S>(mut self, video_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.video_ids = Some(video_ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, record: &ProgressRecord) -> bool {
        record.viewer_id == self.viewer_id
            && self
                .video_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| *id == record.video_id))
    }
}

/// A deduplicated record that a viewer session opened a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEvent {
    pub video_id: String,
    pub viewer_session_id: String,
    pub viewer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ViewEvent {
    pub fn new(
        video_id: impl Into<String>,
        viewer_session_id: impl Into<String>,
        viewer_id: Option<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            viewer_session_id: viewer_session_id.into(),
            viewer_id,
            created_at: Utc::now(),
        }
    }
}

/// Timestamps are stored as Unix epoch milliseconds.
pub(crate) fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
