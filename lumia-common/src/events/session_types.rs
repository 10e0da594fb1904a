//! Session-related type definitions
//!
//! Supporting types for the media session lifecycle.

use serde::{Deserialize, Serialize};

use crate::TrackId;

/// Media session lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No resource alive, nothing in flight
    Idle,
    /// A resource is being created or started
    Loading,
    /// A resource is playing
    Playing,
    /// The live resource is being released
    Stopping,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Loading => write!(f, "loading"),
            SessionPhase::Playing => write!(f, "playing"),
            SessionPhase::Stopping => write!(f, "stopping"),
        }
    }
}

/// Observable snapshot of the media session
///
/// Carries no reference to the underlying audio resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current lifecycle phase
    pub phase: SessionPhase,
    /// Track the phase refers to (None when idle)
    pub track_id: Option<TrackId>,
    /// Epoch of the request that produced this phase
    pub epoch: u64,
}

impl SessionStatus {
    /// Initial status of a freshly constructed session
    pub const fn idle(epoch: u64) -> Self {
        Self {
            phase: SessionPhase::Idle,
            track_id: None,
            epoch,
        }
    }

    /// True when `track` is audibly playing
    pub fn is_playing(&self, track: TrackId) -> bool {
        self.phase == SessionPhase::Playing && self.track_id == Some(track)
    }
}

/// Recoverable failure categories reported by the session subsystem
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionErrorKind {
    ResourceCreateFailed,
    ResourcePlayFailed,
    ResourceReleaseFailed,
    PreferenceLoadFailed,
    PreferenceSaveFailed,
}

impl std::fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionErrorKind::ResourceCreateFailed => "resource_create_failed",
            SessionErrorKind::ResourcePlayFailed => "resource_play_failed",
            SessionErrorKind::ResourceReleaseFailed => "resource_release_failed",
            SessionErrorKind::PreferenceLoadFailed => "preference_load_failed",
            SessionErrorKind::PreferenceSaveFailed => "preference_save_failed",
        };
        write!(f, "{}", name)
    }
}
