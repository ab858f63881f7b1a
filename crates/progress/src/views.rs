//! Deduplicated view registration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::model::ViewEvent;
use crate::store::ViewStore;

const SESSION_FILE: &str = "viewer-session";

/// Stable per-client identifier used to dedupe anonymous views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerSession {
    id: String,
    path: Option<PathBuf>,
}

impl ViewerSession {
    /// Default location of the persisted session id.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("coursecast").join(SESSION_FILE))
    }

    /// Reads the session id stored at `path`, creating and persisting a new
    /// one on first use or when the stored value is not a UUID.
    pub async fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                if let Ok(id) = Uuid::parse_str(contents.trim()) {
                    return Ok(Self {
                        id: id.to_string(),
                        path: Some(path.to_path_buf()),
                    });
                }
                warn!(path = %path.display(), "viewer session file is corrupt, replacing it");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let id = Uuid::new_v4().to_string();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &id).await?;
        info!(path = %path.display(), "created viewer session");
        Ok(Self {
            id,
            path: Some(path.to_path_buf()),
        })
    }

    /// Session that lives only as long as the process.
    pub fn ephemeral() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: None,
        }
    }

    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Outcome of [`ViewRegistrar::register_view`], for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRegistration {
    Recorded,
    AlreadyRecorded,
    Failed,
}

pub struct ViewRegistrar {
    store: Arc<dyn ViewStore>,
    session: ViewerSession,
    viewer_id: Option<String>,
}

impl ViewRegistrar {
    pub fn new(store: Arc<dyn ViewStore>, session: ViewerSession) -> Self {
        Self {
            store,
            session,
            viewer_id: None,
        }
    }

    /// Attaches the signed-in viewer to recorded events.
    pub fn with_viewer(mut self, viewer_id: impl Into<String>) -> Self {
        self.viewer_id = Some(viewer_id.into());
        self
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    /// Records that this client opened `video_id`. Duplicates count as
    /// success and failures are only logged.
    pub async fn register_view(&self, video_id: &str) -> ViewRegistration {
        let event = ViewEvent::new(video_id, self.session.id(), self.viewer_id.clone());
        match self.store.insert(&event).await {
            Ok(()) => {
                debug!(video_id, session = %self.session.id(), "view recorded");
                ViewRegistration::Recorded
            }
            Err(e) if e.is_conflict() => {
                debug!(video_id, session = %self.session.id(), "view already recorded");
                ViewRegistration::AlreadyRecorded
            }
            Err(e) => {
                warn!(video_id, error = %e, "view registration failed");
                ViewRegistration::Failed
            }
        }
    }
}
