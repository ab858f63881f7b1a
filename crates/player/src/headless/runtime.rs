use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use platforms_resolver::{ManifestKind, StreamKind};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::config::HeadlessConfig;
use super::manifest::resolve_media;
use crate::events::{EventSink, MediaEvent, MediaFault};
use crate::runtime::{AttachRequest, MediaAttachment, MediaRuntime};

/// reqwest is built without a bundled crypto provider. Anything that
/// builds a [`Client`] in this crate calls this first.
pub(crate) fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Runtime without a display. It fetches and measures HLS manifests over
/// HTTP, then advances a clock in real time and reports position ticks.
#[derive(Debug, Clone)]
pub struct HeadlessRuntime {
    client: Client,
    config: Arc<HeadlessConfig>,
}

impl HeadlessRuntime {
    pub fn new(config: HeadlessConfig) -> Result<Self, reqwest::Error> {
        install_rustls_provider();
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Uses a caller-built client. The process-wide rustls `CryptoProvider`
    /// must already be installed when `client` was built, otherwise
    /// reqwest panics. [`HeadlessRuntime::new`] takes care of that.
    pub fn with_client(client: Client, config: HeadlessConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl MediaRuntime for HeadlessRuntime {
    fn supports_adaptive_client(&self, format: ManifestKind) -> bool {
        format == ManifestKind::Hls
    }

    fn native_supports(&self, mime: &str) -> bool {
        mime.starts_with("video/") || mime.starts_with("audio/")
    }

    fn attach(&self, request: AttachRequest) -> Box<dyn MediaAttachment> {
        debug!(
            url = %request.url,
            generation = %request.sink.generation(),
            strategy = %request.strategy,
            "headless attach"
        );
        Box::new(HeadlessAttachment {
            context: Arc::new(SessionContext {
                client: self.client.clone(),
                config: Arc::clone(&self.config),
                url: request.url,
                kind: request.kind,
                sink: request.sink,
                clock: Mutex::new(Clock::default()),
            }),
            token: request.token,
            run_token: None,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Clock {
    position: f64,
    duration: Option<f64>,
    running: bool,
}

#[derive(Debug)]
struct SessionContext {
    client: Client,
    config: Arc<HeadlessConfig>,
    url: String,
    kind: StreamKind,
    sink: EventSink,
    clock: Mutex<Clock>,
}

impl SessionContext {
    async fn measure(&self) -> Result<f64, MediaFault> {
        match &self.kind {
            StreamKind::Manifest {
                format: ManifestKind::Hls,
            } => {
                let media = resolve_media(
                    &self.client,
                    &self.url,
                    self.config.max_bandwidth,
                    self.config.request_timeout(),
                )
                .await
                .map_err(|e| MediaFault {
                    class: e.fault_class(),
                    detail: e.to_string(),
                })?;
                if !media.end_list {
                    debug!(url = %media.playlist_url, "live playlist, using current window");
                }
                Ok(media.duration)
            }
            StreamKind::Manifest { format } => Err(MediaFault::media(format!(
                "{} manifests cannot be decoded headlessly",
                format.as_str()
            ))),
            StreamKind::Progressive { .. } | StreamKind::Unknown => {
                Ok(self.config.default_duration_secs)
            }
        }
    }

    async fn run(self: Arc<Self>, token: CancellationToken, start: Option<f64>, remeasure: bool) {
        let known = self.clock.lock().duration;
        let duration = match known {
            Some(duration) if !remeasure => duration,
            _ => {
                let measured = tokio::select! {
                    _ = token.cancelled() => return,
                    measured = self.measure() => measured,
                };
                match measured {
                    Ok(duration) => duration,
                    Err(fault) => {
                        warn!(url = %self.url, detail = %fault.detail, "headless load failed");
                        self.sink.emit(MediaEvent::Error(fault));
                        return;
                    }
                }
            }
        };

        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        {
            let mut clock = self.clock.lock();
            clock.duration = Some(duration);
            if let Some(start) = start {
                clock.position = start;
            }
            clock.position = clock.position.max(0.0).min(duration);
            clock.running = true;
        }

        if !self.sink.emit(MediaEvent::MetadataLoaded { duration }) {
            return;
        }
        self.sink.emit(MediaEvent::Playing);
        self.tick(token, duration).await;
    }

    async fn tick(&self, token: CancellationToken, duration: f64) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.tick().await;
        let advance = self.config.tick_advance();

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = interval.tick() => {}
            }

            let position = {
                let mut clock = self.clock.lock();
                clock.position = (clock.position + advance).min(duration);
                clock.position
            };
            trace!(position, duration, "tick");

            if !self.sink.emit(MediaEvent::TimeUpdate {
                current_time: position,
                duration,
            }) {
                return;
            }
            if position >= duration {
                self.clock.lock().running = false;
                self.sink.emit(MediaEvent::Ended);
                return;
            }
        }
    }
}

struct HeadlessAttachment {
    context: Arc<SessionContext>,
    token: CancellationToken,
    /// Token of the running clock task, replaced on every restart.
    run_token: Option<CancellationToken>,
}

impl HeadlessAttachment {
    fn restart(&mut self, start: Option<f64>, remeasure: bool) {
        if let Some(previous) = self.run_token.take() {
            previous.cancel();
        }
        if self.token.is_cancelled() {
            return;
        }
        let run_token = self.token.child_token();
        self.run_token = Some(run_token.clone());
        tokio::spawn(Arc::clone(&self.context).run(run_token, start, remeasure));
    }
}

impl MediaAttachment for HeadlessAttachment {
    fn load(&mut self, start_position: Option<f64>) {
        self.restart(start_position, true);
    }

    fn recover_media(&mut self) {
        self.restart(None, false);
    }

    fn seek(&mut self, position: f64) {
        let resume = {
            let mut clock = self.context.clock.lock();
            clock.position = match clock.duration {
                Some(duration) => position.max(0.0).min(duration),
                None => position.max(0.0),
            };
            clock.duration.is_some() && !clock.running
        };
        // A finished clock restarts on seek, which replays the stream.
        if resume {
            self.restart(Some(position), false);
        }
    }

    fn release(&mut self) {
        self.token.cancel();
        self.run_token = None;
    }
}
