//! Watch-progress persistence and view registration.
//!
//! [`ProgressTracker`] throttles playback samples into per-viewer progress
//! records, [`ViewRegistrar`] records one view per client session, and
//! [`WatchBinding`] connects a player's events to a tracker.

pub mod binding;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod tracker;
pub mod views;

pub use binding::WatchBinding;
pub use config::{ProgressConfig, sample_percent};
pub use error::{Result, StoreError};
pub use model::{ProgressFilter, ProgressKey, ProgressRecord, ViewEvent};
pub use store::{MemoryStore, ProgressStore, SqliteStore, ViewStore};
pub use tracker::{PersistenceFailure, ProgressTracker};
pub use views::{ViewRegistrar, ViewRegistration, ViewerSession};
