//! Test helpers for lumia-bgm integration tests
//!
//! - Simulated platform with latencies large enough to interleave requests
//! - Service harness wired to an in-memory or instrumented preference store
//! - Event collection from the session event bus

#![allow(dead_code)]

use async_trait::async_trait;
use lumia_bgm::audio::simulated::{SimulatedAudio, SimulatedLatency};
use lumia_bgm::catalog::{Catalog, Track};
use lumia_bgm::config::{MusicConfig, PagedRouteConfig, TrackConfig};
use lumia_bgm::preferences::{
    MemoryPreferenceStore, PreferenceStore, PreferenceUpdate, StoredPreference,
};
use lumia_bgm::session::SessionManager;
use lumia_bgm::{BackgroundMusic, Error, Result};
use lumia_common::events::{EventBus, SessionErrorKind, SessionEvent};
use lumia_common::TrackId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

pub const MUSIC1: &str = "sounds/music1.mp3";
pub const MUSIC2: &str = "sounds/music2.mp3";
pub const FIRE: &str = "sounds/fire_sound.mp3";
pub const RAIN: &str = "sounds/rain_sound.mp3";
pub const WIND: &str = "sounds/wind_sound.mp3";

/// Creation is the slow step, as on a real device
pub fn latency() -> SimulatedLatency {
    SimulatedLatency {
        create: Duration::from_millis(200),
        play: Duration::from_millis(10),
        stop: Duration::from_millis(20),
        unload: Duration::from_millis(10),
    }
}

/// Default music configuration plus a third healing page (track 13)
pub fn music_config() -> MusicConfig {
    let mut music = MusicConfig::default();
    music.tracks.push(TrackConfig {
        id: TrackId(13),
        source: WIND.to_string(),
        looping: true,
        volume: 1.0,
    });
    music.paged_routes = vec![PagedRouteConfig {
        route: "/healing".to_string(),
        tracks: vec![TrackId(11), TrackId(12), TrackId(13)],
    }];
    music
}

pub fn catalog() -> Catalog {
    Catalog::from_config(&music_config()).unwrap()
}

pub fn track(id: u32) -> Track {
    catalog().track(TrackId(id)).cloned().unwrap()
}

pub fn manager() -> (SessionManager, SimulatedAudio, broadcast::Receiver<SessionEvent>) {
    let audio = SimulatedAudio::new(latency());
    let events = EventBus::new(256);
    let rx = events.subscribe();
    (SessionManager::new(Arc::new(audio.clone()), events), audio, rx)
}

pub struct Harness {
    pub service: BackgroundMusic,
    pub audio: SimulatedAudio,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub fn start(store: Arc<dyn PreferenceStore>) -> Harness {
    let audio = SimulatedAudio::new(latency());
    let events = EventBus::new(256);
    let rx = events.subscribe();
    let service = BackgroundMusic::start(
        catalog(),
        &music_config(),
        store,
        Arc::new(audio.clone()),
        events,
    );
    Harness {
        service,
        audio,
        events: rx,
    }
}

pub fn memory_store(enabled: Option<bool>, track: Option<u32>) -> Arc<MemoryPreferenceStore> {
    Arc::new(MemoryPreferenceStore::new(StoredPreference {
        enabled,
        selected_track: track.map(TrackId),
    }))
}

/// Store whose reads and writes always fail
pub struct FailingStore;

#[async_trait]
impl PreferenceStore for FailingStore {
    async fn load(&self) -> Result<StoredPreference> {
        Err(Error::Config("storage unavailable".to_string()))
    }

    async fn save(&self, _update: PreferenceUpdate) -> Result<()> {
        Err(Error::Config("storage unavailable".to_string()))
    }
}

/// Store whose `load` blocks until [`GatedStore::release`] is called
///
/// Writes land in `saved`, so `load` always returns the initial values.
#[derive(Default)]
pub struct GatedStore {
    initial: MemoryPreferenceStore,
    pub saved: MemoryPreferenceStore,
    gate: Notify,
}

impl GatedStore {
    pub fn new(initial: StoredPreference) -> Self {
        Self {
            initial: MemoryPreferenceStore::new(initial),
            saved: MemoryPreferenceStore::default(),
            gate: Notify::new(),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl PreferenceStore for GatedStore {
    async fn load(&self) -> Result<StoredPreference> {
        self.gate.notified().await;
        self.initial.load().await
    }

    async fn save(&self, update: PreferenceUpdate) -> Result<()> {
        self.saved.save(update).await
    }
}

/// Everything published so far, without waiting
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn error_kinds(events: &[SessionEvent]) -> Vec<SessionErrorKind> {
    events.iter().filter_map(SessionEvent::error_kind).collect()
}

pub fn stale_tracks(events: &[SessionEvent]) -> Vec<TrackId> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StaleDiscarded { track_id, .. } => Some(*track_id),
            _ => None,
        })
        .collect()
}

pub fn started_tracks(events: &[SessionEvent]) -> Vec<TrackId> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::TrackStarted { track_id, .. } => Some(*track_id),
            _ => None,
        })
        .collect()
}
