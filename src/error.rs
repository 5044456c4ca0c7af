use std::fmt;

use thiserror::Error;

/// Which sensor a permission failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Microphone,
    Motion,
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionKind::Microphone => write!(f, "microphone"),
            PermissionKind::Motion => write!(f, "motion"),
        }
    }
}

/// Raised by the platform when a sensor stream cannot be acquired.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("{0} access denied")]
    Denied(PermissionKind),
    #[error("{0} capture is unsupported on this device")]
    Unsupported(PermissionKind),
}

impl PermissionError {
    pub fn kind(&self) -> PermissionKind {
        match self {
            PermissionError::Denied(kind) | PermissionError::Unsupported(kind) => *kind,
        }
    }
}

/// Errors surfaced by the engine's lifecycle contract.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `start()` was called while a session is already being tracked.
    #[error("a sleep session is already active")]
    AlreadyActive,

    /// `stop()` was called with no session being tracked.
    #[error("no active sleep session")]
    NoActiveSession,

    /// A sensor stream could not be acquired; no session state was created.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// The audio engine rejected a playback command.
    #[error("audio engine failure: {0}")]
    Audio(String),

    /// Storage or task plumbing failed beneath the lifecycle layer.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
