use std::sync::Arc;

use player_engine::{ErrorKind, PlayerListener, PlayerState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::tracker::ProgressTracker;

#[derive(Debug, Clone, Copy, PartialEq)]
enum WatchUpdate {
    Tick { current_time: f64, duration: f64 },
    Ended,
}

/// Player listener that feeds one video's playback into a
/// [`ProgressTracker`]. Updates are queued and written in arrival order by a
/// worker task, so the player never waits on persistence.
pub struct WatchBinding {
    video_id: String,
    tx: mpsc::UnboundedSender<WatchUpdate>,
}

impl WatchBinding {
    /// Starts the worker. It stops once the binding is dropped and every
    /// queued update has been written.
    pub fn spawn(
        tracker: Arc<ProgressTracker>,
        video_id: impl Into<String>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let video_id = video_id.into();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker_video = video_id.clone();
        let worker = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                match update {
                    WatchUpdate::Tick {
                        current_time,
                        duration,
                    } => tracker.observe(&worker_video, current_time, duration).await,
                    WatchUpdate::Ended => tracker.mark_completed(&worker_video).await,
                }
            }
            debug!(video_id = %worker_video, "watch binding closed");
        });

        (Arc::new(Self { video_id, tx }), worker)
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    fn push(&self, update: WatchUpdate) {
        if self.tx.send(update).is_err() {
            debug!(video_id = %self.video_id, ?update, "watch worker gone, update dropped");
        }
    }
}

impl PlayerListener for WatchBinding {
    fn on_time_update(&self, current_time: f64, duration: f64) {
        self.push(WatchUpdate::Tick {
            current_time,
            duration,
        });
    }

    fn on_ended(&self) {
        self.push(WatchUpdate::Ended);
    }

    fn on_error(&self, kind: ErrorKind) {
        error!(video_id = %self.video_id, %kind, "playback failed");
    }

    fn on_state_change(&self, state: PlayerState) {
        debug!(video_id = %self.video_id, %state, "playback state");
    }
}
