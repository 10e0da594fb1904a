//! Background music service
//!
//! Facade the host application talks to. Wires the preference store, the
//! focus gate and the session manager together, owns the background tasks
//! (initial preference load, ordered preference writer, attached signal
//! pumps), and tears all of them down in [`BackgroundMusic::teardown`].

use lumia_common::events::{EventBus, SessionEvent, SessionStatus};
use lumia_common::TrackId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::PlatformAudio;
use crate::catalog::Catalog;
use crate::config::MusicConfig;
use crate::error::{Error, Result};
use crate::gate::{ActiveContext, FocusGate, RouteMutePolicy};
use crate::preferences::{Preference, PreferenceStore, PreferenceUpdate};
use crate::session::{SessionError, SessionManager};

/// Navigation signal: `route` gained (`focused = true`) or lost focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFocus {
    pub route: String,
    pub focused: bool,
}

impl RouteFocus {
    pub fn focus(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            focused: true,
        }
    }

    pub fn blur(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            focused: false,
        }
    }
}

pub struct BackgroundMusic {
    gate: Arc<Mutex<FocusGate>>,
    manager: SessionManager,
    catalog: Arc<Catalog>,
    events: EventBus,
    ready_rx: watch::Receiver<bool>,
    writer_tx: mpsc::UnboundedSender<PreferenceUpdate>,
    writer: JoinHandle<()>,
    loader: JoinHandle<()>,
    registrations: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundMusic {
    /// Start the service and begin loading preferences
    ///
    /// Must be called within a tokio runtime. Until the load resolves the
    /// selected track is never activated; viewport-driven tracks are.
    pub fn start(
        catalog: Catalog,
        music: &MusicConfig,
        store: Arc<dyn PreferenceStore>,
        platform: Arc<dyn PlatformAudio>,
        events: EventBus,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let manager = SessionManager::new(platform, events.clone());
        let gate = Arc::new(Mutex::new(FocusGate::new(
            manager.clone(),
            Arc::clone(&catalog),
            RouteMutePolicy::from_routes(music.muted_routes.iter().cloned()),
        )));

        let (ready_tx, ready_rx) = watch::channel(false);
        let loader = tokio::spawn(load_preferences(
            Arc::clone(&store),
            music.clone(),
            Arc::clone(&gate),
            events.clone(),
            ready_tx,
        ));

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_preferences(store, writer_rx, events.clone()));

        info!("Background music service started ({} tracks)", catalog.tracks().count());

        Self {
            gate,
            manager,
            catalog,
            events,
            ready_rx,
            writer_tx,
            writer,
            loader,
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Turn background music on or off and persist the choice
    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.gate).set_enabled(enabled);
        self.persist(PreferenceUpdate::enabled(enabled));
    }

    /// Pick the background track and persist the choice
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrack`] if `track` is not in the catalog.
    pub fn select_track(&self, track: TrackId) -> Result<()> {
        if !self.catalog.contains(track) {
            return Err(Error::UnknownTrack(track));
        }
        lock(&self.gate).select_track(track);
        self.persist(PreferenceUpdate::selected_track(track));
        Ok(())
    }

    pub fn notify_route_change(&self, route: &str, focused: bool) {
        lock(&self.gate).on_route_change(route, focused);
    }

    pub fn notify_visible_index(&self, index: usize) {
        lock(&self.gate).on_visible_index(index);
    }

    /// Forward navigation events from `rx` until it closes or teardown
    pub fn attach_route_events(&self, mut rx: mpsc::UnboundedReceiver<RouteFocus>) {
        let gate = Arc::clone(&self.gate);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                lock(&gate).on_route_change(&event.route, event.focused);
            }
            debug!("Route event source closed");
        });
        self.register(pump);
    }

    /// Forward visible page indices from `rx` until it closes or teardown
    pub fn attach_viewport_events(&self, mut rx: mpsc::UnboundedReceiver<usize>) {
        let gate = Arc::clone(&self.gate);
        let pump = tokio::spawn(async move {
            while let Some(index) = rx.recv().await {
                lock(&gate).on_visible_index(index);
            }
            debug!("Viewport event source closed");
        });
        self.register(pump);
    }

    /// Wait for the initial preference load to resolve (success or failure)
    pub async fn wait_ready(&self) {
        let mut ready_rx = self.ready_rx.clone();
        if ready_rx.wait_for(|ready| *ready).await.is_err() {
            warn!("Preference loader exited without signalling readiness");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Wait until every session transition requested so far has finished
    pub async fn settled(&self) -> SessionStatus {
        self.manager.settled().await
    }

    pub fn status(&self) -> SessionStatus {
        self.manager.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.manager.watch()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn active_context(&self) -> ActiveContext {
        lock(&self.gate).active_context()
    }

    /// Effective music switch and selected track
    pub fn preference(&self) -> Preference {
        lock(&self.gate).preference()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Stop everything: signal pumps, the pending load, the session, and
    /// finally the preference writer once it has drained
    pub async fn teardown(self) -> SessionStatus {
        let registrations = std::mem::take(
            &mut *self
                .registrations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for pump in registrations {
            pump.abort();
        }

        self.loader.abort();
        if let Err(e) = self.loader.await {
            if !e.is_cancelled() {
                warn!("Preference loader failed: {}", e);
            }
        }

        let status = self.manager.shutdown().await;

        drop(self.writer_tx);
        if let Err(e) = self.writer.await {
            warn!("Preference writer failed: {}", e);
        }

        info!("Background music service stopped ({})", status.phase);
        status
    }

    fn persist(&self, update: PreferenceUpdate) {
        if self.writer_tx.send(update).is_err() {
            warn!("Preference writer closed, dropping {:?}", update);
        }
    }

    fn register(&self, pump: JoinHandle<()>) {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pump);
    }
}

fn lock(gate: &Mutex<FocusGate>) -> MutexGuard<'_, FocusGate> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

fn report(events: &EventBus, error: SessionError) {
    warn!("{}", error);
    events.emit_lossy(error.to_event());
}

async fn load_preferences(
    store: Arc<dyn PreferenceStore>,
    defaults: MusicConfig,
    gate: Arc<Mutex<FocusGate>>,
    events: EventBus,
    ready_tx: watch::Sender<bool>,
) {
    let loaded = match store.load().await {
        Ok(stored) => stored.resolve(&defaults),
        Err(e) => {
            report(&events, SessionError::PreferenceLoadFailed(e.to_string()));
            Preference::disabled()
        }
    };

    let effective = {
        let mut gate = lock(&gate);
        gate.preferences_loaded(loaded);
        gate.preference()
    };
    info!(
        "Preferences ready: enabled={}, selected_track={:?}",
        effective.enabled, effective.selected_track
    );

    events.emit_lossy(SessionEvent::PreferencesReady {
        enabled: effective.enabled,
        selected_track: effective.selected_track,
        timestamp: chrono::Utc::now(),
    });
    ready_tx.send_replace(true);
}

async fn write_preferences(
    store: Arc<dyn PreferenceStore>,
    mut rx: mpsc::UnboundedReceiver<PreferenceUpdate>,
    events: EventBus,
) {
    while let Some(update) = rx.recv().await {
        match store.save(update).await {
            Ok(()) => debug!("Saved preferences {:?}", update),
            Err(e) => report(&events, SessionError::PreferenceSaveFailed(e.to_string())),
        }
    }
    debug!("Preference writer drained");
}
