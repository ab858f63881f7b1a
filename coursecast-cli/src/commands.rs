use std::sync::Arc;
use std::time::Duration;

use platforms_resolver::{VideoSource, platforms, resolve};
use player_engine::{
    AdaptiveStreamPlayer, HeadlessRuntime, PlaybackSession, PlayerDriver, PlayerHandle,
    PlayerState,
};
use progress_sync::{
    MemoryStore, ProgressFilter, ProgressRecord, ProgressStore, ProgressTracker, SqliteStore,
    StoreError, ViewRegistrar, ViewRegistration, ViewStore, ViewerSession, WatchBinding,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::output::{OutputManager, PlaySummary, write_output};

/// Options of the `play` command.
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub url: String,
    pub video_id: Option<String>,
    pub viewer: Option<String>,
    pub start: Option<f64>,
    pub resume: bool,
    pub rate: Option<f64>,
    pub max_bandwidth: Option<u64>,
    pub dry_run: bool,
    pub output: OutputFormat,
}

/// Progress and view storage, backed by SQLite or by memory for dry runs.
#[derive(Clone)]
struct Stores {
    progress: Arc<dyn ProgressStore>,
    views: Arc<dyn ViewStore>,
}

pub struct CommandExecutor {
    config: AppConfig,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, colored: bool) -> Self {
        let colored = colored && config.colored;
        Self {
            config,
            output: OutputManager::new(colored),
        }
    }

    pub fn resolve_urls(&self, urls: &[String], format: &OutputFormat) -> Result<()> {
        let sources: Vec<VideoSource> = urls.iter().map(|url| resolve(url)).collect();
        for source in &sources {
            info!(
                url = %source.raw_url,
                platform = %source.platform,
                degraded = source.degraded,
                "resolved"
            );
        }
        write_output(&self.output.format_sources(&sources, format)?)
    }

    pub fn list_platforms(&self, format: &OutputFormat) -> Result<()> {
        write_output(&self.output.format_platforms(platforms(), format)?)
    }

    async fn open_stores(&self, dry_run: bool) -> Result<Stores> {
        if dry_run {
            let store = Arc::new(MemoryStore::new());
            return Ok(Stores {
                progress: store.clone(),
                views: store,
            });
        }
        if let Some(path) = self.config.database_path()
            && let Some(parent) = path.parent()
        {
            std::fs::create_dir_all(parent)?;
        }
        let store = Arc::new(SqliteStore::connect(&self.config.database_url).await?);
        Ok(Stores {
            progress: store.clone(),
            views: store,
        })
    }

    async fn viewer_session(&self, dry_run: bool) -> ViewerSession {
        if dry_run {
            return ViewerSession::ephemeral();
        }
        let Some(path) = ViewerSession::default_path() else {
            warn!("no data directory, using a temporary viewer session");
            return ViewerSession::ephemeral();
        };
        match ViewerSession::load_or_create(&path).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "failed to persist viewer session, using a temporary one");
                ViewerSession::ephemeral()
            }
        }
    }

    fn viewer_id(&self, explicit: Option<String>, session: &ViewerSession) -> String {
        explicit
            .or_else(|| self.config.viewer_id.clone())
            .unwrap_or_else(|| session.id().to_string())
    }

    async fn tracker(&self, stores: &Stores, viewer: Option<String>) -> ProgressTracker {
        let session = self.viewer_session(false).await;
        ProgressTracker::new(
            stores.progress.clone(),
            self.viewer_id(viewer, &session),
            self.config.progress.clone(),
        )
    }

    pub async fn play(&self, options: PlayOptions) -> Result<()> {
        if let Some(rate) = options.rate
            && !(rate.is_finite() && rate > 0.0)
        {
            return Err(Error::invalid_input(format!("invalid playback rate {rate}")));
        }
        let source = resolve(&options.url);
        let video_id = options
            .video_id
            .clone()
            .unwrap_or_else(|| video_id_for(&source));

        let stores = self.open_stores(options.dry_run).await?;
        let session = self.viewer_session(options.dry_run).await;
        let viewer_id = self.viewer_id(options.viewer.clone(), &session);

        let tracker = Arc::new(ProgressTracker::new(
            stores.progress.clone(),
            viewer_id.clone(),
            self.config.progress.clone(),
        ));
        let registrar = ViewRegistrar::new(stores.views.clone(), session.clone())
            .with_viewer(viewer_id.clone());
        let view = registrar.register_view(&video_id).await;

        let resume_percent = if options.resume {
            tracker
                .fetch_one(&video_id)
                .await?
                .filter(|record| !record.completed && record.progress_percent > 0)
                .map(|record| record.progress_percent)
        } else {
            None
        };

        let mut headless = self.config.headless.clone();
        if let Some(rate) = options.rate {
            headless.playback_rate = rate;
        }
        if options.max_bandwidth.is_some() {
            headless.max_bandwidth = options.max_bandwidth;
        }
        let tick = headless.tick_interval();
        let runtime = Arc::new(HeadlessRuntime::new(headless)?);

        let (binding, worker) = WatchBinding::spawn(tracker.clone(), video_id.clone());
        let token = CancellationToken::new();
        let (player, events) = AdaptiveStreamPlayer::new(
            runtime,
            binding,
            self.config.playback.clone(),
            token.clone(),
        );
        let (handle, driver) = PlayerDriver::spawn(player, events, token);
        tracker.attach_control(Arc::new(handle.clone()));

        info!(
            video_id = %video_id,
            viewer_id = %viewer_id,
            platform = %source.platform,
            "starting playback"
        );
        match resume_percent {
            Some(percent) => {
                info!(percent, "resuming from stored progress");
                handle
                    .load_at_fraction(source.clone(), f64::from(percent) / 100.0)
                    .await?;
            }
            None => handle.load(source.clone(), options.start).await?,
        }

        let (final_state, session_state) = watch_until_done(&handle, tick).await?;

        handle.shutdown();
        tracker.detach_control();
        if let Err(e) = driver.await {
            warn!(error = %e, "player task ended abnormally");
        }
        if let Err(e) = worker.await {
            warn!(error = %e, "progress worker ended abnormally");
        }

        let progress = tracker.fetch_one(&video_id).await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to read back progress");
            None
        });
        let error = session_state.as_ref().and_then(|s| s.last_error);
        let summary = PlaySummary {
            video_id,
            viewer_id,
            source,
            final_state,
            error,
            position_seconds: session_state
                .as_ref()
                .map_or(0.0, |s| s.current_time_seconds),
            duration_seconds: session_state.as_ref().map_or(0.0, |s| s.duration_seconds),
            view,
            progress,
            persistence_error: tracker.last_error().map(|f| f.message),
        };
        write_output(&self.output.format_play_summary(&summary, &options.output)?)?;

        match error {
            Some(kind) if final_state == PlayerState::Failed => Err(Error::Playback(kind)),
            _ => Ok(()),
        }
    }

    pub async fn show_progress(
        &self,
        video_ids: &[String],
        viewer: Option<String>,
        format: &OutputFormat,
    ) -> Result<()> {
        let stores = self.open_stores(false).await?;
        let tracker = self.tracker(&stores, viewer).await;
        let mut records: Vec<ProgressRecord> = if video_ids.is_empty() {
            let filter = ProgressFilter::viewer(tracker.viewer_id());
            stores.progress.query(&filter).await?
        } else {
            let mut found = tracker.fetch_many(video_ids).await?;
            video_ids.iter().filter_map(|id| found.remove(id)).collect()
        };
        if video_ids.is_empty() {
            records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
        write_output(&self.output.format_progress(&records, format)?)
    }

    pub async fn reset_progress(&self, video_id: &str, viewer: Option<String>) -> Result<()> {
        let stores = self.open_stores(false).await?;
        let tracker = self.tracker(&stores, viewer).await;
        tracker.reset(video_id).await;
        self.report_write(&tracker, video_id, "reset")
    }

    pub async fn complete_progress(&self, video_id: &str, viewer: Option<String>) -> Result<()> {
        let stores = self.open_stores(false).await?;
        let tracker = self.tracker(&stores, viewer).await;
        tracker.mark_completed(video_id).await;
        self.report_write(&tracker, video_id, "marked completed")
    }

    fn report_write(&self, tracker: &ProgressTracker, video_id: &str, action: &str) -> Result<()> {
        if let Some(failure) = tracker.last_error() {
            return Err(Error::Store(StoreError::Other(failure.message)));
        }
        println!("✓ {video_id} {action} for viewer {}", tracker.viewer_id());
        Ok(())
    }

    pub async fn clear_progress(&self, viewer: Option<String>, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(Error::invalid_input(
                "refusing to clear progress history without --yes",
            ));
        }
        let stores = self.open_stores(false).await?;
        let tracker = self.tracker(&stores, viewer).await;
        let removed = tracker.clear_history().await?;
        println!(
            "✓ Removed {removed} progress record(s) for viewer {}",
            tracker.viewer_id()
        );
        Ok(())
    }

    pub async fn register_view(&self, video_id: &str, viewer: Option<String>) -> Result<()> {
        let stores = self.open_stores(false).await?;
        let session = self.viewer_session(false).await;
        let mut registrar = ViewRegistrar::new(stores.views, session);
        if let Some(viewer) = viewer.or_else(|| self.config.viewer_id.clone()) {
            registrar = registrar.with_viewer(viewer);
        }
        match registrar.register_view(video_id).await {
            ViewRegistration::Recorded => println!("✓ View of {video_id} recorded"),
            ViewRegistration::AlreadyRecorded => {
                println!("✓ View of {video_id} was already recorded for this client")
            }
            ViewRegistration::Failed => println!("View of {video_id} could not be recorded"),
        }
        Ok(())
    }

    pub async fn count_views(&self, video_id: &str, format: &OutputFormat) -> Result<()> {
        let stores = self.open_stores(false).await?;
        let count = stores.views.count_views(video_id).await?;
        let content = if format.is_json() {
            format!(
                "{}\n",
                serde_json::json!({ "videoId": video_id, "views": count })
            )
        } else {
            format!("{video_id}: {count} view(s)\n")
        };
        write_output(&content)
    }
}

/// Identifier progress is stored under when none is given.
pub fn video_id_for(source: &VideoSource) -> String {
    match &source.resolved_id {
        Some(id) => format!("{}:{}", source.platform.as_str().to_lowercase(), id),
        None => source.raw_url.trim().to_string(),
    }
}

/// Polls the player until it ends, fails or the user interrupts.
async fn watch_until_done(
    handle: &PlayerHandle,
    tick: Duration,
) -> Result<(PlayerState, Option<PlaybackSession>)> {
    let mut interval = tokio::time::interval(tick);
    let mut last_state = PlayerState::Idle;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping playback");
                return Ok(handle.snapshot().await?);
            }
            _ = interval.tick() => {}
        }

        let (state, session) = handle.snapshot().await?;
        if state != last_state {
            debug!(%state, "player state");
            last_state = state;
        }

        if matches!(state, PlayerState::Ended | PlayerState::Failed) {
            return Ok((state, session));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_sync::ProgressKey;

    #[test]
    fn test_video_id_for_hosted_and_direct() {
        assert_eq!(
            video_id_for(&resolve("https://youtu.be/dQw4w9WgXcQ")),
            "youtube:dQw4w9WgXcQ"
        );
        assert_eq!(
            video_id_for(&resolve("https://cdn.example.com/clip.mp4")),
            "https://cdn.example.com/clip.mp4"
        );
    }

    #[tokio::test]
    async fn test_dry_run_stores_share_memory() {
        let executor = CommandExecutor::new(AppConfig::default(), false);
        let stores = executor.open_stores(true).await.unwrap();
        stores
            .progress
            .upsert(&ProgressRecord::new(
                &ProgressKey::new("v", "u"),
                50,
                false,
            ))
            .await
            .unwrap();
        assert!(
            stores
                .progress
                .get(&ProgressKey::new("v", "u"))
                .await
                .unwrap()
                .is_some()
        );
    }
}
