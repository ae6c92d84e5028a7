use thiserror::Error;

use crate::landmarks::Delegate;

/// Failures of the landmark source, both at creation and per frame.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("failed to load landmark model with {delegate} delegate: {reason}")]
    ModelLoad { delegate: Delegate, reason: String },

    #[error("no landmark delegate could be initialized (tried: {tried})")]
    NoDelegate { tried: String },

    #[error("recognition failed: {0}")]
    Recognition(String),

    #[error("malformed frame record at line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
