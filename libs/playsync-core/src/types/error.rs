use thiserror::Error;

use crate::{MediaCategory, Phase};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} requires the update capability")]
    PermissionDenied(&'static str),
    #[error("{event} is not accepted while {phase}")]
    InvalidTransition { phase: Phase, event: &'static str },
    #[error("session {0} has ended")]
    SessionEnded(String),
    #[error("{0} sources do not accept playback controls")]
    Unsupported(MediaCategory),
    #[error("source {actual} does not belong to session {expected}")]
    MediaMismatch { expected: String, actual: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to encode or decode room message")]
    Codec(#[from] serde_json::Error),
}

pub type SyncResult<T, E = SyncError> = Result<T, E>;
