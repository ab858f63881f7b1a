//! Storage collaborators for progress records and view events.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ProgressFilter, ProgressKey, ProgressRecord, ViewEvent};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Keyed record store for progress. One record per `(video, viewer)`.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Insert or replace the record under its key. A stored `completed`
    /// flag survives later writes; clearing it takes a [`Self::delete`].
    async fn upsert(&self, record: &ProgressRecord) -> Result<()>;

    async fn get(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>>;

    async fn query(&self, filter: &ProgressFilter) -> Result<Vec<ProgressRecord>>;

    /// Returns the number of records removed.
    async fn delete(&self, filter: &ProgressFilter) -> Result<u64>;
}

/// Append-only store for view events, unique per `(video, viewer session)`.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Fails with [`crate::StoreError::Conflict`] on a duplicate.
    async fn insert(&self, event: &ViewEvent) -> Result<()>;

    async fn count_views(&self, video_id: &str) -> Result<u64>;
}
