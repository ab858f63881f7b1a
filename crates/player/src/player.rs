//! Adaptive stream player.
//!
//! [`AdaptiveStreamPlayer`] is a synchronous state machine: commands
//! (`load`, `seek`, `teardown`) and media events are applied one at a time
//! through `&mut self`, so transitions for one instance can never interleave.
//! [`crate::driver::PlayerDriver`] runs it on a task.

use std::sync::Arc;

use platforms_resolver::{StreamKind, VideoSource, classify_stream};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PlaybackConfig;
use crate::error::{ErrorKind, FaultClass};
use crate::events::{EventSink, Generation, MediaEvent, MediaFault, PlayerListener, TaggedEvent};
use crate::runtime::{AttachRequest, MediaAttachment, MediaRuntime};
use crate::state::PlayerState;
use crate::strategy::{PlaybackStrategy, select_strategy};

/// Ephemeral per-mount playback state. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSession {
    pub source_url: String,
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub state: PlayerState,
    pub last_error: Option<ErrorKind>,
    pub strategy: Option<PlaybackStrategy>,
}

impl PlaybackSession {
    fn new(source_url: String) -> Self {
        Self {
            source_url,
            current_time_seconds: 0.0,
            duration_seconds: 0.0,
            state: PlayerState::Idle,
            last_error: None,
            strategy: None,
        }
    }
}

struct LiveAttachment {
    generation: Generation,
    attachment: Box<dyn MediaAttachment>,
    token: CancellationToken,
}

impl LiveAttachment {
    fn release(mut self) {
        self.token.cancel();
        self.attachment.release();
    }
}

/// Seek deferred until the stream is ready.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingSeek {
    Seconds(f64),
    /// Share of the duration, resolved once the duration is known.
    Fraction(f64),
}

/// Recovery attempts spent in the current session, per error class.
#[derive(Debug, Default, Clone, Copy)]
struct RecoveryBudget {
    network_used: u32,
    media_used: u32,
}

pub struct AdaptiveStreamPlayer {
    runtime: Arc<dyn MediaRuntime>,
    listener: Arc<dyn PlayerListener>,
    config: PlaybackConfig,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    token: CancellationToken,
    next_generation: u64,
    live: Option<LiveAttachment>,
    session: Option<PlaybackSession>,
    state: PlayerState,
    pending_seek: Option<PendingSeek>,
    budget: RecoveryBudget,
    ended_emitted: bool,
}

impl AdaptiveStreamPlayer {
    /// Creates a player and the receiver its attachments report into.
    /// Every event read from the receiver goes back through
    /// [`AdaptiveStreamPlayer::handle_event`].
    pub fn new(
        runtime: Arc<dyn MediaRuntime>,
        listener: Arc<dyn PlayerListener>,
        config: PlaybackConfig,
        token: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let player = Self {
            runtime,
            listener,
            config,
            events_tx,
            token,
            next_generation: 0,
            live: None,
            session: None,
            state: PlayerState::Idle,
            pending_seek: None,
            budget: RecoveryBudget::default(),
            ended_emitted: false,
        };
        (player, events_rx)
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Generation of the live attachment, if any.
    pub fn generation(&self) -> Option<Generation> {
        self.live.as_ref().map(|live| live.generation)
    }

    /// Assigns a resolved source. Any previous attachment is released first.
    pub fn load(&mut self, source: &VideoSource, initial_time: Option<f64>) {
        if source.degraded {
            warn!(
                platform = %source.platform,
                url = %source.raw_url,
                "source id could not be resolved, playing raw URL"
            );
        }
        self.load_url(&source.embed_url, initial_time);
    }

    /// Like [`AdaptiveStreamPlayer::load`], but starts at `fraction` of the
    /// duration. The seek waits until the stream has reported its duration.
    pub fn load_at_fraction(&mut self, source: &VideoSource, fraction: f64) {
        self.load(source, None);
        if self.state == PlayerState::Attaching && fraction.is_finite() && fraction > 0.0 {
            self.pending_seek = Some(PendingSeek::Fraction(fraction.min(1.0)));
        }
    }

    /// Assigns a stream URL directly.
    pub fn load_url(&mut self, url: &str, initial_time: Option<f64>) {
        self.teardown();

        self.session = Some(PlaybackSession::new(url.to_string()));
        self.pending_seek = initial_time
            .filter(|t| t.is_finite() && *t > 0.0)
            .map(PendingSeek::Seconds);
        self.transition(PlayerState::Attaching);

        let kind = classify_stream(url);
        match select_strategy(&kind, self.runtime.as_ref()) {
            Ok(strategy) => self.attach(url, kind, strategy),
            Err(kind) => {
                info!(url, "no playback path for stream");
                self.fail(kind);
            }
        }
    }

    fn attach(&mut self, url: &str, kind: StreamKind, strategy: PlaybackStrategy) {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        let token = self.token.child_token();

        info!(url, %strategy, kind = kind.as_str(), %generation, "attaching stream");

        let mut attachment = self.runtime.attach(AttachRequest {
            url: url.to_string(),
            kind,
            strategy,
            sink: EventSink::new(generation, self.events_tx.clone()),
            token: token.clone(),
        });
        attachment.load(None);

        if let Some(session) = self.session.as_mut() {
            session.strategy = Some(strategy);
        }
        self.live = Some(LiveAttachment {
            generation,
            attachment,
            token,
        });
    }

    /// Seeks now if playing, otherwise once the stream is ready.
    pub fn seek(&mut self, position: f64) {
        if !position.is_finite() || position < 0.0 {
            return;
        }
        match self.state {
            PlayerState::Attaching | PlayerState::Recovering => {
                self.pending_seek = Some(PendingSeek::Seconds(position));
            }
            PlayerState::Playing | PlayerState::Buffering | PlayerState::Ended => {
                self.pending_seek = None;
                if let Some(live) = self.live.as_mut() {
                    live.attachment.seek(position);
                }
                if let Some(session) = self.session.as_mut() {
                    session.current_time_seconds = position;
                }
            }
            PlayerState::Idle | PlayerState::Failed => {
                debug!(position, state = %self.state, "seek ignored");
            }
        }
    }

    /// Releases the attachment and returns to `Idle`. Anything the previous
    /// attachment still reports afterwards is dropped as stale.
    pub fn teardown(&mut self) {
        if let Some(live) = self.live.take() {
            debug!(generation = %live.generation, "releasing attachment");
            live.release();
        }
        self.session = None;
        self.pending_seek = None;
        self.budget = RecoveryBudget::default();
        self.ended_emitted = false;
        self.transition(PlayerState::Idle);
    }

    /// Applies one event reported by an attachment.
    pub fn handle_event(&mut self, tagged: TaggedEvent) {
        let live_generation = self.generation();
        if live_generation != Some(tagged.generation) {
            debug!(
                generation = %tagged.generation,
                event = ?tagged.event,
                "dropping stale media event"
            );
            return;
        }

        match tagged.event {
            MediaEvent::MetadataLoaded { duration } => {
                self.set_duration(duration);
                if self.state == PlayerState::Attaching {
                    self.become_ready();
                }
            }
            MediaEvent::Playing => match self.state {
                PlayerState::Attaching => self.become_ready(),
                PlayerState::Buffering => {
                    self.transition(PlayerState::Playing);
                }
                PlayerState::Ended => {
                    self.ended_emitted = false;
                    self.transition(PlayerState::Playing);
                }
                _ => {}
            },
            MediaEvent::Waiting => {
                if self.state == PlayerState::Playing {
                    self.transition(PlayerState::Buffering);
                }
            }
            MediaEvent::TimeUpdate {
                current_time,
                duration,
            } => {
                if matches!(self.state, PlayerState::Playing | PlayerState::Buffering) {
                    self.set_duration(duration);
                    // This sample was taken before the deferred seek landed.
                    if self.pending_seek.is_some() && self.apply_pending_seek() {
                        return;
                    }
                    if let Some(session) = self.session.as_mut() {
                        session.current_time_seconds = current_time;
                    }
                    self.listener.on_time_update(current_time, duration);
                }
            }
            MediaEvent::Ended => {
                if matches!(self.state, PlayerState::Playing | PlayerState::Buffering)
                    && !self.ended_emitted
                {
                    self.ended_emitted = true;
                    if let Some(session) = self.session.as_mut()
                        && session.duration_seconds > 0.0
                    {
                        session.current_time_seconds = session.duration_seconds;
                    }
                    self.transition(PlayerState::Ended);
                    self.listener.on_ended();
                }
            }
            MediaEvent::Error(fault) => {
                if self.state.accepts_faults() {
                    self.recover(fault);
                } else {
                    debug!(state = %self.state, detail = %fault.detail, "fault ignored");
                }
            }
        }
    }

    fn set_duration(&mut self, duration: f64) {
        if let Some(session) = self.session.as_mut()
            && duration.is_finite()
            && duration > 0.0
        {
            session.duration_seconds = duration;
        }
    }

    fn become_ready(&mut self) {
        self.apply_pending_seek();
        self.transition(PlayerState::Playing);
    }

    /// Returns whether a seek was issued. A fraction stays pending while
    /// the duration is unknown.
    fn apply_pending_seek(&mut self) -> bool {
        let duration = self.session.as_ref().map_or(0.0, |s| s.duration_seconds);
        let position = match self.pending_seek {
            None => return false,
            Some(PendingSeek::Seconds(position)) => position,
            Some(PendingSeek::Fraction(fraction)) if duration > 0.0 => fraction * duration,
            Some(PendingSeek::Fraction(fraction)) => {
                debug!(fraction, "duration unknown, resume deferred");
                return false;
            }
        };
        self.pending_seek = None;

        debug!(position, "seeking to resume position");
        if let Some(live) = self.live.as_mut() {
            live.attachment.seek(position);
        }
        if let Some(session) = self.session.as_mut() {
            session.current_time_seconds = position;
        }
        true
    }

    fn recover(&mut self, fault: MediaFault) {
        let (used, allowed) = match fault.class {
            FaultClass::Network => (&mut self.budget.network_used, self.config.network_retries),
            FaultClass::Media => (&mut self.budget.media_used, self.config.media_recoveries),
        };

        if *used >= allowed {
            error!(
                class = ?fault.class,
                detail = %fault.detail,
                attempts = *used,
                "recovery exhausted"
            );
            self.fail(fault.class.error_kind());
            return;
        }
        *used += 1;
        let attempt = *used;

        warn!(
            class = ?fault.class,
            detail = %fault.detail,
            attempt,
            max = allowed,
            "recovering from playback fault"
        );
        self.transition(PlayerState::Recovering);

        let position = self
            .session
            .as_ref()
            .map(|s| s.current_time_seconds)
            .filter(|t| *t > 0.0);
        if let Some(live) = self.live.as_mut() {
            match fault.class {
                FaultClass::Network => live.attachment.load(position),
                FaultClass::Media => live.attachment.recover_media(),
            }
        }
        self.transition(PlayerState::Attaching);
    }

    fn fail(&mut self, kind: ErrorKind) {
        if let Some(live) = self.live.take() {
            live.release();
        }
        self.pending_seek = None;
        if let Some(session) = self.session.as_mut() {
            session.last_error = Some(kind);
        }
        if self.transition(PlayerState::Failed) {
            self.listener.on_error(kind);
        }
    }

    fn transition(&mut self, to: PlayerState) -> bool {
        if self.state == to {
            return false;
        }
        match self.state.transition_to(to) {
            Ok(next) => {
                debug!(from = %self.state, to = %next, "player state change");
                self.state = next;
                if let Some(session) = self.session.as_mut() {
                    session.state = next;
                }
                self.listener.on_state_change(next);
                true
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }
}

impl Drop for AdaptiveStreamPlayer {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.release();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use platforms_resolver::{ManifestKind, resolve};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Attach(String, PlaybackStrategy),
        Load(Option<f64>),
        RecoverMedia,
        Seek(f64),
        Release,
    }

    /// Runtime that records every call and keeps the sinks it handed out.
    #[derive(Default)]
    pub(crate) struct FakeRuntime {
        pub adaptive: bool,
        pub native: Vec<&'static str>,
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub sinks: Mutex<Vec<EventSink>>,
    }

    impl FakeRuntime {
        pub(crate) fn hls_capable() -> Self {
            Self {
                adaptive: true,
                ..Default::default()
            }
        }

        pub(crate) fn sink(&self) -> EventSink {
            self.sinks.lock().last().cloned().expect("an attachment was created")
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    struct FakeAttachment {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl MediaAttachment for FakeAttachment {
        fn load(&mut self, start_position: Option<f64>) {
            self.calls.lock().push(Call::Load(start_position));
        }

        fn recover_media(&mut self) {
            self.calls.lock().push(Call::RecoverMedia);
        }

        fn seek(&mut self, position: f64) {
            self.calls.lock().push(Call::Seek(position));
        }

        fn release(&mut self) {
            self.calls.lock().push(Call::Release);
        }
    }

    impl MediaRuntime for FakeRuntime {
        fn supports_adaptive_client(&self, format: ManifestKind) -> bool {
            self.adaptive && format == ManifestKind::Hls
        }

        fn native_supports(&self, mime: &str) -> bool {
            self.native.contains(&mime)
        }

        fn attach(&self, request: AttachRequest) -> Box<dyn MediaAttachment> {
            self.calls
                .lock()
                .push(Call::Attach(request.url.clone(), request.strategy));
            self.sinks.lock().push(request.sink);
            Box::new(FakeAttachment {
                calls: Arc::clone(&self.calls),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Observed {
        TimeUpdate(f64, f64),
        Ended,
        Error(ErrorKind),
        State(PlayerState),
    }

    #[derive(Default)]
    pub(crate) struct RecordingListener {
        pub observed: Mutex<Vec<Observed>>,
    }

    impl RecordingListener {
        pub(crate) fn errors(&self) -> Vec<ErrorKind> {
            self.observed
                .lock()
                .iter()
                .filter_map(|o| match o {
                    Observed::Error(kind) => Some(*kind),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn states(&self) -> Vec<PlayerState> {
            self.observed
                .lock()
                .iter()
                .filter_map(|o| match o {
                    Observed::State(state) => Some(*state),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn time_updates(&self) -> usize {
            self.observed
                .lock()
                .iter()
                .filter(|o| matches!(o, Observed::TimeUpdate(..)))
                .count()
        }
    }

    impl PlayerListener for RecordingListener {
        fn on_time_update(&self, current_time: f64, duration: f64) {
            self.observed
                .lock()
                .push(Observed::TimeUpdate(current_time, duration));
        }

        fn on_ended(&self) {
            self.observed.lock().push(Observed::Ended);
        }

        fn on_error(&self, kind: ErrorKind) {
            self.observed.lock().push(Observed::Error(kind));
        }

        fn on_state_change(&self, state: PlayerState) {
            self.observed.lock().push(Observed::State(state));
        }
    }

    fn player_with(
        runtime: Arc<FakeRuntime>,
        listener: Arc<RecordingListener>,
    ) -> (AdaptiveStreamPlayer, mpsc::UnboundedReceiver<TaggedEvent>) {
        AdaptiveStreamPlayer::new(
            runtime,
            listener,
            PlaybackConfig::default(),
            CancellationToken::new(),
        )
    }

    /// Feeds everything currently queued back into the player.
    fn pump(player: &mut AdaptiveStreamPlayer, rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) {
        while let Ok(event) = rx.try_recv() {
            player.handle_event(event);
        }
    }

    const HLS_URL: &str = "https://cdn.example.com/course/lesson1/master.m3u8";

    #[test]
    fn test_adaptive_playback_to_end() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load(&resolve(HLS_URL), None);
        assert_eq!(player.state(), PlayerState::Attaching);
        assert_eq!(
            runtime.calls(),
            vec![
                Call::Attach(HLS_URL.to_string(), PlaybackStrategy::Adaptive),
                Call::Load(None)
            ]
        );

        let sink = runtime.sink();
        sink.emit(MediaEvent::MetadataLoaded { duration: 100.0 });
        sink.emit(MediaEvent::TimeUpdate {
            current_time: 10.0,
            duration: 100.0,
        });
        sink.emit(MediaEvent::Waiting);
        sink.emit(MediaEvent::Playing);
        sink.emit(MediaEvent::Ended);
        sink.emit(MediaEvent::Ended);
        pump(&mut player, &mut rx);

        assert_eq!(player.state(), PlayerState::Ended);
        assert_eq!(
            listener.states(),
            vec![
                PlayerState::Attaching,
                PlayerState::Playing,
                PlayerState::Buffering,
                PlayerState::Playing,
                PlayerState::Ended
            ]
        );
        let ended = listener
            .observed
            .lock()
            .iter()
            .filter(|o| **o == Observed::Ended)
            .count();
        assert_eq!(ended, 1);
        assert_eq!(listener.time_updates(), 1);
        let session = player.session().unwrap();
        assert_eq!(session.duration_seconds, 100.0);
        assert_eq!(session.current_time_seconds, 100.0);
    }

    #[test]
    fn test_resume_position_applied_before_ready() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener);

        player.load(&resolve(HLS_URL), Some(42.5));
        runtime
            .sink()
            .emit(MediaEvent::MetadataLoaded { duration: 300.0 });
        pump(&mut player, &mut rx);

        let calls = runtime.calls();
        assert_eq!(calls.last(), Some(&Call::Seek(42.5)));
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(player.session().unwrap().current_time_seconds, 42.5);
    }

    #[test]
    fn test_fractional_resume_waits_for_duration() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load_at_fraction(&resolve(HLS_URL), 0.4);
        let sink = runtime.sink();
        sink.emit(MediaEvent::Playing);
        pump(&mut player, &mut rx);
        assert_eq!(player.state(), PlayerState::Playing);
        assert!(!runtime.calls().iter().any(|c| matches!(c, Call::Seek(_))));

        sink.emit(MediaEvent::TimeUpdate {
            current_time: 0.25,
            duration: 200.0,
        });
        pump(&mut player, &mut rx);
        assert_eq!(runtime.calls().last(), Some(&Call::Seek(80.0)));
        assert_eq!(listener.time_updates(), 0);
        assert_eq!(player.session().unwrap().current_time_seconds, 80.0);

        sink.emit(MediaEvent::TimeUpdate {
            current_time: 80.5,
            duration: 200.0,
        });
        pump(&mut player, &mut rx);
        assert_eq!(listener.time_updates(), 1);
        assert_eq!(
            runtime
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::Seek(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_fractional_resume_uses_metadata_duration() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener);

        player.load_at_fraction(&resolve(HLS_URL), 0.5);
        runtime
            .sink()
            .emit(MediaEvent::MetadataLoaded { duration: 300.0 });
        pump(&mut player, &mut rx);
        assert_eq!(runtime.calls().last(), Some(&Call::Seek(150.0)));
        assert_eq!(player.state(), PlayerState::Playing);
    }

    #[test]
    fn test_unsupported_format_fails_immediately() {
        let runtime = Arc::new(FakeRuntime::default());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, _rx) = player_with(runtime.clone(), listener.clone());

        player.load_url(HLS_URL, None);

        assert_eq!(player.state(), PlayerState::Failed);
        assert_eq!(listener.errors(), vec![ErrorKind::UnsupportedFormat]);
        assert!(runtime.calls().is_empty());
        assert_eq!(
            player.session().unwrap().last_error,
            Some(ErrorKind::UnsupportedFormat)
        );
    }

    #[test]
    fn test_native_manifest_support_used_without_adaptive_client() {
        let runtime = Arc::new(FakeRuntime {
            adaptive: false,
            native: vec!["application/vnd.apple.mpegurl"],
            ..Default::default()
        });
        let listener = Arc::new(RecordingListener::default());
        let (mut player, _rx) = player_with(runtime.clone(), listener);

        player.load_url(HLS_URL, None);
        assert_eq!(
            runtime.calls()[0],
            Call::Attach(HLS_URL.to_string(), PlaybackStrategy::Native)
        );
    }

    #[test]
    fn test_network_error_retried_once_then_fails() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load_url(HLS_URL, None);
        let sink = runtime.sink();
        sink.emit(MediaEvent::Error(MediaFault::network("manifest 503")));
        pump(&mut player, &mut rx);

        assert_eq!(player.state(), PlayerState::Attaching);
        assert!(listener.errors().is_empty());
        assert_eq!(
            runtime.calls(),
            vec![
                Call::Attach(HLS_URL.to_string(), PlaybackStrategy::Adaptive),
                Call::Load(None),
                Call::Load(None),
            ]
        );

        sink.emit(MediaEvent::Error(MediaFault::network("manifest 503")));
        sink.emit(MediaEvent::Error(MediaFault::network("late duplicate")));
        pump(&mut player, &mut rx);

        assert_eq!(player.state(), PlayerState::Failed);
        assert_eq!(listener.errors(), vec![ErrorKind::NetworkError]);
        assert_eq!(runtime.calls().last(), Some(&Call::Release));
        assert_eq!(
            listener.states(),
            vec![
                PlayerState::Attaching,
                PlayerState::Recovering,
                PlayerState::Attaching,
                PlayerState::Failed
            ]
        );
    }

    #[test]
    fn test_network_retry_resumes_from_last_position() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load_url(HLS_URL, None);
        let sink = runtime.sink();
        sink.emit(MediaEvent::MetadataLoaded { duration: 120.0 });
        sink.emit(MediaEvent::TimeUpdate {
            current_time: 61.0,
            duration: 120.0,
        });
        sink.emit(MediaEvent::Error(MediaFault::network("segment timeout")));
        sink.emit(MediaEvent::Playing);
        pump(&mut player, &mut rx);

        assert!(runtime.calls().contains(&Call::Load(Some(61.0))));
        assert_eq!(player.state(), PlayerState::Playing);
        assert!(listener.errors().is_empty());
    }

    #[test]
    fn test_media_error_recovered_in_place_once() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load_url(HLS_URL, None);
        let sink = runtime.sink();
        sink.emit(MediaEvent::MetadataLoaded { duration: 120.0 });
        sink.emit(MediaEvent::Error(MediaFault::media("bufferAppendError")));
        sink.emit(MediaEvent::Playing);
        pump(&mut player, &mut rx);

        assert!(runtime.calls().contains(&Call::RecoverMedia));
        assert_eq!(player.state(), PlayerState::Playing);

        // A transport fault has its own budget.
        sink.emit(MediaEvent::Error(MediaFault::network("segment 404")));
        sink.emit(MediaEvent::Playing);
        pump(&mut player, &mut rx);
        assert_eq!(player.state(), PlayerState::Playing);

        sink.emit(MediaEvent::Error(MediaFault::media("decode")));
        pump(&mut player, &mut rx);
        assert_eq!(player.state(), PlayerState::Failed);
        assert_eq!(listener.errors(), vec![ErrorKind::MediaError]);
    }

    #[test]
    fn test_stale_events_after_teardown_are_ignored() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load_url(HLS_URL, None);
        let sink = runtime.sink();
        sink.emit(MediaEvent::MetadataLoaded { duration: 50.0 });
        sink.emit(MediaEvent::Waiting);
        pump(&mut player, &mut rx);
        assert_eq!(player.state(), PlayerState::Buffering);

        player.teardown();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(runtime.calls().last(), Some(&Call::Release));

        let observed_before = listener.observed.lock().len();
        sink.emit(MediaEvent::TimeUpdate {
            current_time: 12.0,
            duration: 50.0,
        });
        sink.emit(MediaEvent::Playing);
        sink.emit(MediaEvent::Error(MediaFault::network("late")));
        pump(&mut player, &mut rx);

        assert_eq!(listener.observed.lock().len(), observed_before);
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(player.session().is_none());
    }

    #[test]
    fn test_source_change_releases_previous_attachment_first() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load_url(HLS_URL, None);
        let first = runtime.sink();
        player.load_url("https://cdn.example.com/other.mp4", None);
        let second = runtime.sink();
        assert_ne!(first.generation(), second.generation());

        let calls = runtime.calls();
        let release_at = calls.iter().position(|c| *c == Call::Release).unwrap();
        let second_attach_at = calls
            .iter()
            .rposition(|c| matches!(c, Call::Attach(..)))
            .unwrap();
        assert!(release_at < second_attach_at);

        first.emit(MediaEvent::MetadataLoaded { duration: 10.0 });
        pump(&mut player, &mut rx);
        assert_eq!(player.state(), PlayerState::Attaching);

        second.emit(MediaEvent::MetadataLoaded { duration: 20.0 });
        pump(&mut player, &mut rx);
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(player.session().unwrap().duration_seconds, 20.0);
    }

    #[test]
    fn test_seek_while_attaching_is_deferred() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener);

        player.load_url(HLS_URL, None);
        player.seek(0.0);
        assert!(!runtime.calls().contains(&Call::Seek(0.0)));

        runtime
            .sink()
            .emit(MediaEvent::MetadataLoaded { duration: 30.0 });
        pump(&mut player, &mut rx);
        assert_eq!(runtime.calls().last(), Some(&Call::Seek(0.0)));
    }

    #[test]
    fn test_replay_after_end_allows_new_ended() {
        let runtime = Arc::new(FakeRuntime::hls_capable());
        let listener = Arc::new(RecordingListener::default());
        let (mut player, mut rx) = player_with(runtime.clone(), listener.clone());

        player.load_url(HLS_URL, None);
        let sink = runtime.sink();
        sink.emit(MediaEvent::MetadataLoaded { duration: 5.0 });
        sink.emit(MediaEvent::Ended);
        pump(&mut player, &mut rx);
        player.seek(0.0);
        sink.emit(MediaEvent::Playing);
        sink.emit(MediaEvent::Ended);
        pump(&mut player, &mut rx);

        let ended = listener
            .observed
            .lock()
            .iter()
            .filter(|o| **o == Observed::Ended)
            .count();
        assert_eq!(ended, 2);
    }
}
