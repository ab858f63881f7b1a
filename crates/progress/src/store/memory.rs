use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ProgressStore, ViewStore};
use crate::error::{Result, StoreError};
use crate::model::{ProgressFilter, ProgressKey, ProgressRecord, ViewEvent};

/// In-process store for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    progress: Mutex<HashMap<ProgressKey, ProgressRecord>>,
    views: Mutex<HashMap<(String, String), ViewEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress_len(&self) -> usize {
        self.progress.lock().len()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn upsert(&self, record: &ProgressRecord) -> Result<()> {
        let mut progress = self.progress.lock();
        let mut record = record.clone();
        if let Some(existing) = progress.get(&record.key()) {
            record.completed |= existing.completed;
        }
        progress.insert(record.key(), record);
        Ok(())
    }

    async fn get(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>> {
        Ok(self.progress.lock().get(key).cloned())
    }

    async fn query(&self, filter: &ProgressFilter) -> Result<Vec<ProgressRecord>> {
        let mut records: Vec<_> = self
            .progress
            .lock()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn delete(&self, filter: &ProgressFilter) -> Result<u64> {
        let mut progress = self.progress.lock();
        let before = progress.len();
        progress.retain(|_, r| !filter.matches(r));
        Ok((before - progress.len()) as u64)
    }
}

#[async_trait]
impl ViewStore for MemoryStore {
    async fn insert(&self, event: &ViewEvent) -> Result<()> {
        let key = (event.video_id.clone(), event.viewer_session_id.clone());
        let mut views = self.views.lock();
        if views.contains_key(&key) {
            return Err(StoreError::conflict(format!(
                "view of {} by session {}",
                event.video_id, event.viewer_session_id
            )));
        }
        views.insert(key, event.clone());
        Ok(())
    }

    async fn count_views(&self, video_id: &str) -> Result<u64> {
        Ok(self
            .views
            .lock()
            .keys()
            .filter(|(video, _)| video == video_id)
            .count() as u64)
    }
}
