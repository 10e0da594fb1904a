//! Media session manager - lifecycle of the single audio resource
//!
//! **Responsibilities:**
//! - Exclusive ownership of the one live [`AudioHandle`]
//! - `Idle → Loading → Playing → Stopping → Idle` state machine, with
//!   `Loading → Loading` (superseded) and `Playing → Loading` (track switch)
//!   as re-entrant edges
//! - Epoch tagging of every request so late completions are discarded
//!
//! Each `activate`/`deactivate` spawns one transition task. A transition task
//! first awaits its predecessor, so a resource is always released before the
//! next one is created and at most one resource exists at any time. Every
//! async step re-checks its epoch against the current one; superseded work
//! tears down whatever it created and leaves the session untouched.
//!
//! Must be used from within a tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lumia_common::events::{EventBus, SessionEvent, SessionPhase, SessionStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SessionError;
use crate::audio::{AudioHandle, PlatformAudio};
use crate::catalog::Track;

/// Request generation counter
pub type Epoch = u64;

enum Session {
    Idle,
    Loading { track: Track, epoch: Epoch },
    Playing { track: Track, handle: Box<dyn AudioHandle>, epoch: Epoch },
    Stopping { track: Track, epoch: Epoch },
}

impl Session {
    fn phase(&self) -> SessionPhase {
        match self {
            Session::Idle => SessionPhase::Idle,
            Session::Loading { .. } => SessionPhase::Loading,
            Session::Playing { .. } => SessionPhase::Playing,
            Session::Stopping { .. } => SessionPhase::Stopping,
        }
    }

    fn track(&self) -> Option<&Track> {
        match self {
            Session::Idle => None,
            Session::Loading { track, .. }
            | Session::Playing { track, .. }
            | Session::Stopping { track, .. } => Some(track),
        }
    }

    /// Live handle and the track it was created for
    fn into_handle(self) -> Option<(Track, Box<dyn AudioHandle>)> {
        match self {
            Session::Playing { track, handle, .. } => Some((track, handle)),
            _ => None,
        }
    }
}

struct Core {
    session: Session,
    epoch: Epoch,
    /// Most recently spawned transition; the next one awaits it
    tail: Option<JoinHandle<()>>,
}

impl Core {
    fn status(&self) -> SessionStatus {
        match &self.session {
            Session::Idle => SessionStatus::idle(self.epoch),
            Session::Loading { track, epoch }
            | Session::Playing { track, epoch, .. }
            | Session::Stopping { track, epoch } => SessionStatus {
                phase: self.session.phase(),
                track_id: Some(track.id),
                epoch: *epoch,
            },
        }
    }

    /// True if `track` is already loading or playing for the current epoch
    fn is_settled_on(&self, track: &Track) -> bool {
        match &self.session {
            Session::Loading { track: current, epoch }
            | Session::Playing { track: current, epoch, .. } => {
                current.id == track.id && *epoch == self.epoch
            }
            _ => false,
        }
    }
}

struct Shared {
    core: Mutex<Core>,
    platform: Arc<dyn PlatformAudio>,
    events: EventBus,
    status_tx: watch::Sender<SessionStatus>,
    /// Highest epoch whose transition task has finished
    settled_tx: watch::Sender<Epoch>,
}

/// Owner of the single audio resource
///
/// Cloning yields another reference to the same session.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub fn new(platform: Arc<dyn PlatformAudio>, events: EventBus) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::idle(0));
        let (settled_tx, _) = watch::channel(0);

        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    session: Session::Idle,
                    epoch: 0,
                    tail: None,
                }),
                platform,
                events,
                status_tx,
                settled_tx,
            }),
        }
    }

    /// Make `track` the audible track
    ///
    /// No-op if `track` is already loading or playing for the current epoch.
    /// Otherwise bumps the epoch, enters `Loading`, and schedules: release of
    /// the live resource (if any), then create and play of `track`.
    pub fn activate(&self, track: Track) {
        let shared = &self.shared;
        let mut core = shared.lock();

        if core.is_settled_on(&track) {
            debug!("Track {} already active (epoch {}), ignoring activate", track.id, core.epoch);
            return;
        }

        core.epoch += 1;
        let epoch = core.epoch;
        debug!("Activating track {} (epoch {})", track.id, epoch);

        let previous = core.tail.take();
        let outgoing = shared
            .replace(&mut core, Session::Loading { track: track.clone(), epoch })
            .into_handle();

        let task_shared = Arc::clone(shared);
        core.tail = Some(tokio::spawn(async move {
            Arc::clone(&task_shared)
                .run_activation(previous, outgoing, track, epoch)
                .await;
            task_shared.mark_settled(epoch);
        }));
    }

    /// Silence the session
    ///
    /// Bumps the epoch, enters `Stopping`, and schedules release of the live
    /// resource; the session reaches `Idle` whether or not release succeeds.
    pub fn deactivate(&self) {
        let shared = &self.shared;
        let mut core = shared.lock();

        core.epoch += 1;
        let epoch = core.epoch;

        let Some(track) = core.session.track().cloned() else {
            debug!("Deactivate while idle (epoch {})", epoch);
            shared.status_tx.send_replace(core.status());
            drop(core);
            shared.mark_settled(epoch);
            return;
        };
        debug!("Deactivating track {} (epoch {})", track.id, epoch);

        let previous = core.tail.take();
        let outgoing = shared
            .replace(&mut core, Session::Stopping { track, epoch })
            .into_handle();

        let task_shared = Arc::clone(shared);
        core.tail = Some(tokio::spawn(async move {
            Arc::clone(&task_shared)
                .run_deactivation(previous, outgoing, epoch)
                .await;
            task_shared.mark_settled(epoch);
        }));
    }

    /// Deactivate and wait for every outstanding transition
    ///
    /// Always returns an `Idle` status unless another request raced in.
    pub async fn shutdown(&self) -> SessionStatus {
        self.deactivate();
        self.settled().await
    }

    /// Wait until every transition requested so far has finished
    pub async fn settled(&self) -> SessionStatus {
        let target = self.shared.lock().epoch;
        let mut settled_rx = self.shared.settled_tx.subscribe();
        // Sender lives in `shared`, so the channel cannot close here
        let _ = settled_rx.wait_for(|done| *done >= target).await;
        self.status()
    }

    /// Current status snapshot
    pub fn status(&self) -> SessionStatus {
        self.shared.lock().status()
    }

    /// Receiver that observes every status change
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn current_epoch(&self) -> Epoch {
        self.shared.lock().epoch
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: Epoch) -> bool {
        self.lock().epoch == epoch
    }

    /// Install `next`, publish the change, and hand back the previous session
    fn replace(&self, core: &mut Core, next: Session) -> Session {
        let old_phase = core.session.phase();
        let previous = std::mem::replace(&mut core.session, next);
        let status = core.status();

        self.status_tx.send_replace(status);
        self.events.emit_lossy(SessionEvent::StateChanged {
            old_phase,
            new_phase: status.phase,
            track_id: status.track_id,
            epoch: status.epoch,
            timestamp: chrono::Utc::now(),
        });

        previous
    }

    fn mark_settled(&self, epoch: Epoch) {
        self.settled_tx.send_if_modified(|done| {
            if epoch > *done {
                *done = epoch;
                true
            } else {
                false
            }
        });
    }

    fn report(&self, error: SessionError) {
        warn!("{}", error);
        self.events.emit_lossy(error.to_event());
    }

    /// Report `error` and fall back to `Idle` if `epoch` is still current
    fn fail(&self, epoch: Epoch, error: SessionError) {
        self.report(error);

        let mut core = self.lock();
        if core.epoch == epoch {
            self.replace(&mut core, Session::Idle);
        }
    }

    /// Stop then unload; failures are reported, never propagated
    async fn release(&self, track: &Track, mut handle: Box<dyn AudioHandle>) {
        let id = handle.id();

        if let Err(source) = handle.stop().await {
            self.report(SessionError::ResourceReleaseFailed { track: track.id, source });
        }
        if let Err(source) = handle.unload().await {
            self.report(SessionError::ResourceReleaseFailed { track: track.id, source });
        }

        debug!("Released resource {} (track {})", id, track.id);
    }

    /// Tear down a resource created for a superseded request
    async fn discard(&self, track: &Track, handle: Box<dyn AudioHandle>, epoch: Epoch) {
        let current_epoch = self.lock().epoch;
        debug!(
            "Discarding stale resource {} for track {} (epoch {}, current {})",
            handle.id(),
            track.id,
            epoch,
            current_epoch
        );

        self.events.emit_lossy(SessionEvent::StaleDiscarded {
            track_id: track.id,
            epoch,
            current_epoch,
            timestamp: chrono::Utc::now(),
        });
        self.release(track, handle).await;
    }

    async fn run_activation(
        self: Arc<Self>,
        previous: Option<JoinHandle<()>>,
        outgoing: Option<(Track, Box<dyn AudioHandle>)>,
        track: Track,
        epoch: Epoch,
    ) {
        settle(previous).await;

        if let Some((old_track, handle)) = outgoing {
            self.release(&old_track, handle).await;
        }

        if !self.is_current(epoch) {
            debug!("Activation of track {} (epoch {}) superseded before create", track.id, epoch);
            return;
        }

        let mut handle = match self.platform.create(&track.source, track.options()).await {
            Ok(handle) => handle,
            Err(source) => {
                self.fail(epoch, SessionError::ResourceCreateFailed { track: track.id, source });
                return;
            }
        };

        if !self.is_current(epoch) {
            self.discard(&track, handle, epoch).await;
            return;
        }

        if let Err(source) = handle.play().await {
            self.release(&track, handle).await;
            self.fail(epoch, SessionError::ResourcePlayFailed { track: track.id, source });
            return;
        }

        let rejected = {
            let mut core = self.lock();
            if core.epoch == epoch {
                self.replace(
                    &mut core,
                    Session::Playing {
                        track: track.clone(),
                        handle,
                        epoch,
                    },
                );
                None
            } else {
                Some(handle)
            }
        };

        match rejected {
            Some(handle) => self.discard(&track, handle, epoch).await,
            None => {
                info!("Track {} playing (epoch {})", track.id, epoch);
                self.events.emit_lossy(SessionEvent::TrackStarted {
                    track_id: track.id,
                    epoch,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    async fn run_deactivation(
        self: Arc<Self>,
        previous: Option<JoinHandle<()>>,
        outgoing: Option<(Track, Box<dyn AudioHandle>)>,
        epoch: Epoch,
    ) {
        settle(previous).await;

        if let Some((track, handle)) = outgoing {
            self.release(&track, handle).await;
        }

        let mut core = self.lock();
        if core.epoch == epoch {
            self.replace(&mut core, Session::Idle);
            info!("Session idle (epoch {})", epoch);
        } else {
            debug!("Deactivation (epoch {}) superseded by epoch {}", epoch, core.epoch);
        }
    }
}

/// Wait for the preceding transition to finish
async fn settle(previous: Option<JoinHandle<()>>) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            warn!("Previous session transition ended abnormally: {}", e);
        }
    }
}
