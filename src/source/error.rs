//! Configuration source errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`ConfigSource`](super::ConfigSource)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source cannot serve the key at all
    #[error("Configuration source unavailable for '{key}': {reason}")]
    Unavailable { key: String, reason: String },
}
