//! Media session management
//!
//! [`SessionManager`] owns the single audio resource and serializes every
//! transition of its lifecycle. Failures inside the lifecycle are never
//! propagated to callers; they are logged and published as
//! [`SessionEvent::Error`](lumia_common::events::SessionEvent::Error).

mod manager;

pub use manager::{Epoch, SessionManager};

use lumia_common::events::{SessionErrorKind, SessionEvent};
use lumia_common::TrackId;
use thiserror::Error;

use crate::audio::AudioError;

/// Recoverable session failures
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("Failed to create resource for track {track}: {source}")]
    ResourceCreateFailed { track: TrackId, source: AudioError },

    #[error("Failed to start playback of track {track}: {source}")]
    ResourcePlayFailed { track: TrackId, source: AudioError },

    #[error("Failed to release resource for track {track}: {source}")]
    ResourceReleaseFailed { track: TrackId, source: AudioError },

    #[error("Failed to load preferences: {0}")]
    PreferenceLoadFailed(String),

    #[error("Failed to save preferences: {0}")]
    PreferenceSaveFailed(String),
}

impl SessionError {
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::ResourceCreateFailed { .. } => SessionErrorKind::ResourceCreateFailed,
            SessionError::ResourcePlayFailed { .. } => SessionErrorKind::ResourcePlayFailed,
            SessionError::ResourceReleaseFailed { .. } => SessionErrorKind::ResourceReleaseFailed,
            SessionError::PreferenceLoadFailed(_) => SessionErrorKind::PreferenceLoadFailed,
            SessionError::PreferenceSaveFailed(_) => SessionErrorKind::PreferenceSaveFailed,
        }
    }

    pub fn track(&self) -> Option<TrackId> {
        match self {
            SessionError::ResourceCreateFailed { track, .. }
            | SessionError::ResourcePlayFailed { track, .. }
            | SessionError::ResourceReleaseFailed { track, .. } => Some(*track),
            SessionError::PreferenceLoadFailed(_) | SessionError::PreferenceSaveFailed(_) => None,
        }
    }

    /// Event published for this failure
    pub fn to_event(&self) -> SessionEvent {
        SessionEvent::Error {
            kind: self.kind(),
            track_id: self.track(),
            message: self.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}
