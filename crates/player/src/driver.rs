//! Task that owns an [`AdaptiveStreamPlayer`] and serializes commands with
//! media events.

use platforms_resolver::VideoSource;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PlayerError;
use crate::events::TaggedEvent;
use crate::player::{AdaptiveStreamPlayer, PlaybackSession};
use crate::state::PlayerState;

const COMMAND_BUFFER: usize = 32;

/// Seek access the progress layer needs to restart a video.
pub trait PlaybackControl: Send + Sync {
    fn seek_to(&self, position: f64);
}

#[derive(Debug)]
pub enum PlayerCommand {
    Load {
        source: Box<VideoSource>,
        initial_time: Option<f64>,
    },
    LoadUrl {
        url: String,
        initial_time: Option<f64>,
    },
    /// Load and start at a share of the duration once it is known.
    LoadAtFraction {
        source: Box<VideoSource>,
        fraction: f64,
    },
    Seek(f64),
    Teardown,
    Snapshot(oneshot::Sender<(PlayerState, Option<PlaybackSession>)>),
}

/// Cloneable handle to a running [`PlayerDriver`].
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerCommand>,
    token: CancellationToken,
}

impl PlayerHandle {
    async fn send(&self, command: PlayerCommand) -> Result<(), PlayerError> {
        self.tx.send(command).await.map_err(|_| PlayerError::Closed)
    }

    pub async fn load(
        &self,
        source: VideoSource,
        initial_time: Option<f64>,
    ) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Load {
            source: Box::new(source),
            initial_time,
        })
        .await
    }

    pub async fn load_url(
        &self,
        url: impl Into<String>,
        initial_time: Option<f64>,
    ) -> Result<(), PlayerError> {
        self.send(PlayerCommand::LoadUrl {
            url: url.into(),
            initial_time,
        })
        .await
    }

    pub async fn load_at_fraction(
        &self,
        source: VideoSource,
        fraction: f64,
    ) -> Result<(), PlayerError> {
        self.send(PlayerCommand::LoadAtFraction {
            source: Box::new(source),
            fraction,
        })
        .await
    }

    pub async fn seek(&self, position: f64) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Seek(position)).await
    }

    pub async fn teardown(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Teardown).await
    }

    pub async fn state(&self) -> Result<PlayerState, PlayerError> {
        self.snapshot().await.map(|(state, _)| state)
    }

    pub async fn snapshot(
        &self,
    ) -> Result<(PlayerState, Option<PlaybackSession>), PlayerError> {
        let (tx, rx) = oneshot::channel();
        self.send(PlayerCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| PlayerError::Closed)
    }

    /// Stops the driver. The live attachment is released on the way out.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PlaybackControl for PlayerHandle {
    fn seek_to(&self, position: f64) {
        if let Err(e) = self.tx.try_send(PlayerCommand::Seek(position)) {
            warn!(position, error = %e, "failed to queue seek");
        }
    }
}

pub struct PlayerDriver {
    player: AdaptiveStreamPlayer,
    events: mpsc::UnboundedReceiver<TaggedEvent>,
    commands: mpsc::Receiver<PlayerCommand>,
    token: CancellationToken,
}

impl PlayerDriver {
    /// Moves `player` onto a task. `token` should be the one the player was
    /// built with so shutdown also cancels its attachments.
    pub fn spawn(
        player: AdaptiveStreamPlayer,
        events: mpsc::UnboundedReceiver<TaggedEvent>,
        token: CancellationToken,
    ) -> (PlayerHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let handle = PlayerHandle {
            tx,
            token: token.clone(),
        };
        let driver = Self {
            player,
            events,
            commands,
            token,
        };
        (handle, tokio::spawn(driver.run()))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!("player driver cancelled");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all player handles dropped");
                        break;
                    };
                    self.apply(command);
                }
                Some(event) = self.events.recv() => {
                    self.player.handle_event(event);
                }
            }
        }
        self.player.teardown();
    }

    fn apply(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Load {
                source,
                initial_time,
            } => self.player.load(&source, initial_time),
            PlayerCommand::LoadUrl { url, initial_time } => self.player.load_url(&url, initial_time),
            PlayerCommand::LoadAtFraction { source, fraction } => {
                self.player.load_at_fraction(&source, fraction)
            }
            PlayerCommand::Seek(position) => self.player.seek(position),
            PlayerCommand::Teardown => self.player.teardown(),
            PlayerCommand::Snapshot(reply) => {
                let _ = reply.send((self.player.state(), self.player.session().cloned()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::PlaybackConfig;
    use crate::events::MediaEvent;
    use crate::player::tests::{Call, FakeRuntime, RecordingListener};
    use platforms_resolver::resolve;

    fn spawn_driver(
        runtime: Arc<FakeRuntime>,
        listener: Arc<RecordingListener>,
    ) -> (PlayerHandle, JoinHandle<()>) {
        let token = CancellationToken::new();
        let (player, events) = AdaptiveStreamPlayer::new(
            runtime,
            listener,
            PlaybackConfig::default(),
            token.clone(),
        );
        PlayerDriver::spawn(player, events, token)
    }

    #[tokio::test]
    async fn test_commands_and_events_are_serialized() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (handle, _task) = spawn_driver(runtime.clone(), listener.clone());

        handle
            .load(resolve("https://cdn.example.com/a/master.m3u8"), Some(30.0))
            .await
            .unwrap();
        assert_eq!(handle.state().await.unwrap(), PlayerState::Attaching);

        runtime
            .sink()
            .emit(MediaEvent::MetadataLoaded { duration: 90.0 });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (state, session) = handle.snapshot().await.unwrap();
        assert_eq!(state, PlayerState::Playing);
        assert_eq!(session.unwrap().current_time_seconds, 30.0);
        assert!(runtime.calls().contains(&Call::Seek(30.0)));
    }

    #[tokio::test]
    async fn test_load_at_fraction_seeks_after_duration() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (handle, _task) = spawn_driver(runtime.clone(), listener);

        handle
            .load_at_fraction(resolve("https://cdn.example.com/a/master.m3u8"), 0.25)
            .await
            .unwrap();
        handle.state().await.unwrap();
        runtime
            .sink()
            .emit(MediaEvent::MetadataLoaded { duration: 120.0 });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (state, session) = handle.snapshot().await.unwrap();
        assert_eq!(state, PlayerState::Playing);
        assert_eq!(session.unwrap().current_time_seconds, 30.0);
        assert_eq!(runtime.calls().last(), Some(&Call::Seek(30.0)));
    }

    #[tokio::test]
    async fn test_shutdown_releases_attachment() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (handle, task) = spawn_driver(runtime.clone(), listener);

        handle
            .load_url("https://cdn.example.com/clip.mp4", None)
            .await
            .unwrap();
        assert_eq!(handle.state().await.unwrap(), PlayerState::Attaching);
        handle.shutdown();
        task.await.unwrap();

        assert_eq!(runtime.calls().last(), Some(&Call::Release));
        assert!(matches!(handle.state().await, Err(PlayerError::Closed)));
    }

    #[tokio::test]
    async fn test_seek_to_queues_seek() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (handle, _task) = spawn_driver(runtime.clone(), listener);

        handle
            .load_url("https://cdn.example.com/clip.mp4", None)
            .await
            .unwrap();
        handle.state().await.unwrap();
        runtime
            .sink()
            .emit(MediaEvent::MetadataLoaded { duration: 10.0 });
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.seek_to(0.0);
        handle.state().await.unwrap();
        assert_eq!(runtime.calls().last(), Some(&Call::Seek(0.0)));
    }
}
