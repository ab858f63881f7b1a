//! A [`crate::runtime::MediaRuntime`] for terminals and tests.

pub mod config;
pub mod manifest;
mod runtime;
#[cfg(test)]
mod test_server;

pub use config::HeadlessConfig;
pub use manifest::{ManifestError, ResolvedMedia};
pub use runtime::HeadlessRuntime;
