//! Platform audio abstraction
//!
//! The platform creates one playable resource per track; the resource is
//! driven through an [`AudioHandle`]. Only the session manager holds handles.
//!
//! Implementations:
//! - [`simulated::SimulatedAudio`]: headless platform with configurable
//!   latency and failure injection
//! - `device::DeviceAudio`: the default output device via rodio (requires
//!   the `device-audio` feature)

#[cfg(feature = "device-audio")]
pub mod device;
pub mod simulated;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::SourceRef;

#[cfg(feature = "device-audio")]
pub use device::DeviceAudio;
pub use simulated::SimulatedAudio;

/// Options applied when a resource is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub looping: bool,
    /// Volume (0.0-1.0)
    pub volume: f32,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            looping: true,
            volume: 1.0,
        }
    }
}

/// Platform audio failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The source could not be loaded
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The platform refused the operation
    #[error("Operation rejected: {0}")]
    Rejected(String),

    /// Operation not valid in the handle's current state
    #[error("Invalid handle state: {0}")]
    InvalidState(String),
}

/// Creates playable resources
#[async_trait]
pub trait PlatformAudio: Send + Sync {
    /// Load `source` into a new, not yet playing resource
    async fn create(
        &self,
        source: &SourceRef,
        options: PlaybackOptions,
    ) -> Result<Box<dyn AudioHandle>, AudioError>;
}

/// One live platform resource
///
/// `unload` releases the resource; a handle must not be used afterwards.
#[async_trait]
pub trait AudioHandle: Send {
    /// Platform-assigned identifier, for logging
    fn id(&self) -> u64;

    async fn play(&mut self) -> Result<(), AudioError>;

    async fn stop(&mut self) -> Result<(), AudioError>;

    async fn unload(&mut self) -> Result<(), AudioError>;
}
