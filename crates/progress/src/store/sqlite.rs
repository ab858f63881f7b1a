use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use super::{ProgressStore, ViewStore};
use crate::error::{Result, StoreError};
use crate::model::{ProgressFilter, ProgressKey, ProgressRecord, ViewEvent, ms_to_datetime};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS video_progress (
    video_id TEXT NOT NULL,
    viewer_id TEXT NOT NULL,
    progress_percent INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (video_id, viewer_id)
);

CREATE TABLE IF NOT EXISTS video_views (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL,
    viewer_session_id TEXT NOT NULL,
    viewer_id TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (video_id, viewer_session_id)
);
"#;

#[derive(sqlx::FromRow)]
struct ProgressRow {
    video_id: String,
    viewer_id: String,
    progress_percent: i64,
    completed: bool,
    updated_at: i64,
}

impl From<ProgressRow> for ProgressRecord {
    fn from(row: ProgressRow) -> Self {
        Self {
            video_id: row.video_id,
            viewer_id: row.viewer_id,
            progress_percent: row.progress_percent.clamp(0, 100) as u8,
            completed: row.completed,
            updated_at: ms_to_datetime(row.updated_at),
        }
    }
}

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `database_url` and makes
    /// sure both tables exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        // Every connection to an in-memory database is a separate database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            4
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        info!(database_url, "progress database ready");
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProgressFilter) {
    builder.push(" WHERE viewer_id = ");
    builder.push_bind(filter.viewer_id.clone());
    if let Some(video_ids) = &filter.video_ids {
        if video_ids.is_empty() {
            builder.push(" AND 0");
            return;
        }
        builder.push(" AND video_id IN (");
        let mut separated = builder.separated(", ");
        for id in video_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn upsert(&self, record: &ProgressRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO video_progress (
                video_id, viewer_id, progress_percent, completed, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (video_id, viewer_id) DO UPDATE SET
                progress_percent = excluded.progress_percent,
                completed = video_progress.completed OR excluded.completed,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.video_id)
        .bind(&record.viewer_id)
        .bind(i64::from(record.progress_percent))
        .bind(record.completed)
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "SELECT * FROM video_progress WHERE video_id = ? AND viewer_id = ?",
        )
        .bind(&key.video_id)
        .bind(&key.viewer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn query(&self, filter: &ProgressFilter) -> Result<Vec<ProgressRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM video_progress");
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY updated_at DESC");

        let rows = builder
            .build_query_as::<ProgressRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, filter: &ProgressFilter) -> Result<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM video_progress");
        push_filter(&mut builder, filter);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ViewStore for SqliteStore {
    async fn insert(&self, event: &ViewEvent) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO video_views (video_id, viewer_session_id, viewer_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&event.video_id)
        .bind(&event.viewer_session_id)
        .bind(&event.viewer_id)
        .bind(event.created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::conflict(format!(
                    "view of {} by session {}",
                    event.video_id, event.viewer_session_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_views(&self, video_id: &str) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM video_views WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_record() {
        let store = memory_store().await;
        let key = ProgressKey::new("lesson-1", "viewer-a");

        store
            .upsert(&ProgressRecord::new(&key, 60, false))
            .await
            .unwrap();
        store
            .upsert(&ProgressRecord::new(&key, 100, true))
            .await
            .unwrap();

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.progress_percent, 100);
        assert!(record.completed);
        assert_eq!(
            store.query(&ProgressFilter::viewer("viewer-a")).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_upsert_never_clears_completion() {
        let store = memory_store().await;
        let key = ProgressKey::new("lesson-1", "viewer-a");

        store
            .upsert(&ProgressRecord::new(&key, 100, true))
            .await
            .unwrap();
        store
            .upsert(&ProgressRecord::new(&key, 20, false))
            .await
            .unwrap();

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.progress_percent, 20);
        assert!(record.completed);
    }

    #[tokio::test]
    async fn test_query_and_delete_by_videos() {
        let store = memory_store().await;
        for video in ["a", "b", "c"] {
            store
                .upsert(&ProgressRecord::new(&ProgressKey::new(video, "u1"), 25, false))
                .await
                .unwrap();
        }
        store
            .upsert(&ProgressRecord::new(&ProgressKey::new("a", "u2"), 25, false))
            .await
            .unwrap();

        let filter = ProgressFilter::viewer("u1").with_videos(["a", "c", "missing"]);
        let mut found: Vec<_> = store
            .query(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.video_id)
            .collect();
        found.sort();
        assert_eq!(found, vec!["a", "c"]);

        let empty = ProgressFilter::viewer("u1").with_videos(Vec::<String>::new());
        assert!(store.query(&empty).await.unwrap().is_empty());

        assert_eq!(store.delete(&filter).await.unwrap(), 2);
        assert_eq!(store.delete(&ProgressFilter::viewer("u1")).await.unwrap(), 1);
        assert!(
            store
                .get(&ProgressKey::new("a", "u2"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_duplicate_view_maps_to_conflict() {
        let store = memory_store().await;
        let event = ViewEvent::new("lesson-1", "session-1", Some("viewer-a".into()));

        store.insert(&event).await.unwrap();
        let err = store.insert(&event).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.count_views("lesson-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ensure_schema_is_repeatable() {
        let store = memory_store().await;
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();
    }
}
