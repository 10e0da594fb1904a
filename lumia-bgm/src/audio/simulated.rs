//! Simulated platform audio
//!
//! Headless stand-in for a device-backed audio subsystem. Every operation
//! takes a configurable latency (via `tokio::time::sleep`, so paused-clock
//! tests control it) and can be made to fail. The platform keeps counters
//! that make resource ownership observable:
//!
//! - live handles (created and not yet unloaded) and their peak
//! - concurrently playing handles and their peak (audible overlap)
//! - leaked handles (dropped without `unload`)
//! - an ordered log of completed operations
//!
//! Injected release failures are reported after the resource has been torn
//! down, modelling a platform that errors on cleanup it partially performed.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use super::{AudioError, AudioHandle, PlatformAudio, PlaybackOptions};
use crate::catalog::SourceRef;
use crate::config::SimulationConfig;

/// Per-operation latencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedLatency {
    pub create: Duration,
    pub play: Duration,
    pub stop: Duration,
    pub unload: Duration,
}

impl From<&SimulationConfig> for SimulatedLatency {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            create: config.create_latency(),
            play: config.play_latency(),
            stop: config.stop_latency(),
            unload: config.unload_latency(),
        }
    }
}

/// Kind of a completed platform operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOpKind {
    Create,
    Play,
    Stop,
    Unload,
}

/// One completed platform operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioOp {
    pub handle: u64,
    pub source: String,
    pub kind: AudioOpKind,
}

#[derive(Debug, Default)]
struct FaultPlan {
    fail_create: HashSet<String>,
    fail_play: HashSet<String>,
    fail_release: bool,
}

#[derive(Debug, Default)]
struct Inner {
    latency: SimulatedLatency,
    faults: Mutex<FaultPlan>,
    next_id: AtomicU64,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    playing: AtomicUsize,
    peak_playing: AtomicUsize,
    leaked: AtomicUsize,
    log: Mutex<Vec<AudioOp>>,
}

impl Inner {
    fn faults(&self) -> MutexGuard<'_, FaultPlan> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, handle: u64, source: &str, kind: AudioOpKind) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AudioOp {
                handle,
                source: source.to_string(),
                kind,
            });
    }

    fn started_playing(&self) {
        let now = self.playing.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_playing.fetch_max(now, Ordering::SeqCst);
    }

    fn stopped_playing(&self) {
        self.playing.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Headless platform audio with latency and failure injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedAudio {
    inner: Arc<Inner>,
}

impl SimulatedAudio {
    pub fn new(latency: SimulatedLatency) -> Self {
        Self {
            inner: Arc::new(Inner {
                latency,
                ..Inner::default()
            }),
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        let audio = Self::new(SimulatedLatency::from(config));
        for source in &config.fail_sources {
            audio.fail_create(source);
        }
        audio
    }

    /// Make every future `create` of `source` fail
    pub fn fail_create(&self, source: &str) {
        self.inner.faults().fail_create.insert(source.to_string());
    }

    /// Make every future `play` of a resource loaded from `source` fail
    pub fn fail_play(&self, source: &str) {
        self.inner.faults().fail_play.insert(source.to_string());
    }

    /// Make `stop` and `unload` report failure (after tearing down)
    pub fn fail_release(&self, fail: bool) {
        self.inner.faults().fail_release = fail;
    }

    /// Drop every injected fault
    pub fn clear_faults(&self) {
        *self.inner.faults() = FaultPlan::default();
    }

    pub fn live_handles(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn peak_live_handles(&self) -> usize {
        self.inner.peak_live.load(Ordering::SeqCst)
    }

    pub fn playing_handles(&self) -> usize {
        self.inner.playing.load(Ordering::SeqCst)
    }

    pub fn peak_playing_handles(&self) -> usize {
        self.inner.peak_playing.load(Ordering::SeqCst)
    }

    pub fn leaked_handles(&self) -> usize {
        self.inner.leaked.load(Ordering::SeqCst)
    }

    /// Completed operations, in completion order
    pub fn operations(&self) -> Vec<AudioOp> {
        self.inner
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of completed operations of `kind` on resources from `source`
    pub fn count(&self, kind: AudioOpKind, source: &str) -> usize {
        self.operations()
            .iter()
            .filter(|op| op.kind == kind && op.source == source)
            .count()
    }
}

#[async_trait]
impl PlatformAudio for SimulatedAudio {
    async fn create(
        &self,
        source: &SourceRef,
        options: PlaybackOptions,
    ) -> Result<Box<dyn AudioHandle>, AudioError> {
        tokio::time::sleep(self.inner.latency.create).await;

        if self.inner.faults().fail_create.contains(source.as_str()) {
            return Err(AudioError::SourceUnavailable(source.to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_live.fetch_max(live, Ordering::SeqCst);
        self.inner.record(id, source.as_str(), AudioOpKind::Create);

        debug!(
            "Simulated resource {} created for {} (looping={}, volume={:.2}, live={})",
            id, source, options.looping, options.volume, live
        );

        Ok(Box::new(SimulatedHandle {
            id,
            source: source.to_string(),
            inner: Arc::clone(&self.inner),
            playing: false,
            unloaded: false,
        }))
    }
}

struct SimulatedHandle {
    id: u64,
    source: String,
    inner: Arc<Inner>,
    playing: bool,
    unloaded: bool,
}

impl SimulatedHandle {
    fn halt(&mut self) {
        if self.playing {
            self.playing = false;
            self.inner.stopped_playing();
        }
    }

    fn release_fault(&self, op: &str) -> Result<(), AudioError> {
        if self.inner.faults().fail_release {
            Err(AudioError::Rejected(format!("{} of resource {} failed", op, self.id)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AudioHandle for SimulatedHandle {
    fn id(&self) -> u64 {
        self.id
    }

    async fn play(&mut self) -> Result<(), AudioError> {
        tokio::time::sleep(self.inner.latency.play).await;

        if self.unloaded {
            return Err(AudioError::InvalidState(format!("resource {} already unloaded", self.id)));
        }
        if self.inner.faults().fail_play.contains(&self.source) {
            return Err(AudioError::Rejected(format!("play of {} refused", self.source)));
        }

        if !self.playing {
            self.playing = true;
            self.inner.started_playing();
        }
        self.inner.record(self.id, &self.source, AudioOpKind::Play);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        tokio::time::sleep(self.inner.latency.stop).await;

        if self.unloaded {
            return Err(AudioError::InvalidState(format!("resource {} already unloaded", self.id)));
        }

        self.halt();
        self.inner.record(self.id, &self.source, AudioOpKind::Stop);
        self.release_fault("stop")
    }

    async fn unload(&mut self) -> Result<(), AudioError> {
        tokio::time::sleep(self.inner.latency.unload).await;

        if self.unloaded {
            return Err(AudioError::InvalidState(format!("resource {} already unloaded", self.id)));
        }

        self.halt();
        self.unloaded = true;
        self.inner.live.fetch_sub(1, Ordering::SeqCst);
        self.inner.record(self.id, &self.source, AudioOpKind::Unload);
        self.release_fault("unload")
    }
}

impl Drop for SimulatedHandle {
    fn drop(&mut self) {
        if !self.unloaded {
            warn!("Simulated resource {} ({}) dropped without unload", self.id, self.source);
            self.halt();
            self.inner.live.fetch_sub(1, Ordering::SeqCst);
            self.inner.leaked.fetch_add(1, Ordering::SeqCst);
        }
    }
}
