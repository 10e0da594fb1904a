//! Durable user preferences
//!
//! Two values survive restarts: whether background music is on, and which
//! track was picked. They are read once at startup and written back through a
//! single ordered writer owned by [`crate::service::BackgroundMusic`].

use async_trait::async_trait;
use lumia_common::db::settings::{delete_setting, get_setting, set_setting};
use lumia_common::TrackId;
use sqlx::SqlitePool;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::config::MusicConfig;
use crate::error::Result;

/// Settings key for the music on/off switch
pub const ENABLED_KEY: &str = "music_enabled";

/// Settings key for the selected track id
pub const SELECTED_TRACK_KEY: &str = "music_selected_track";

/// Values as stored; `None` means never written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredPreference {
    pub enabled: Option<bool>,
    pub selected_track: Option<TrackId>,
}

impl StoredPreference {
    /// Fill unset values from configured defaults
    pub fn resolve(self, defaults: &MusicConfig) -> Preference {
        Preference {
            enabled: self.enabled.unwrap_or(defaults.default_enabled),
            selected_track: self.selected_track.or(defaults.default_track),
        }
    }
}

/// Effective preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preference {
    pub enabled: bool,
    pub selected_track: Option<TrackId>,
}

impl Preference {
    /// Used when stored preferences could not be read
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            selected_track: None,
        }
    }
}

/// Partial write; unset fields are left untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferenceUpdate {
    pub enabled: Option<bool>,
    pub selected_track: Option<TrackId>,
}

impl PreferenceUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            selected_track: None,
        }
    }

    pub fn selected_track(track: TrackId) -> Self {
        Self {
            enabled: None,
            selected_track: Some(track),
        }
    }
}

/// Durable storage for [`StoredPreference`]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load(&self) -> Result<StoredPreference>;

    async fn save(&self, update: PreferenceUpdate) -> Result<()>;
}

/// Preferences in the database `settings` table
pub struct SqlitePreferenceStore {
    db: SqlitePool,
}

impl SqlitePreferenceStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Forget both stored values
    pub async fn clear(&self) -> Result<()> {
        delete_setting(&self.db, ENABLED_KEY).await?;
        delete_setting(&self.db, SELECTED_TRACK_KEY).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn load(&self) -> Result<StoredPreference> {
        let enabled = get_setting::<bool>(&self.db, ENABLED_KEY).await?;
        let selected_track = get_setting::<TrackId>(&self.db, SELECTED_TRACK_KEY).await?;

        debug!("Loaded preferences: enabled={:?}, selected_track={:?}", enabled, selected_track);
        Ok(StoredPreference {
            enabled,
            selected_track,
        })
    }

    async fn save(&self, update: PreferenceUpdate) -> Result<()> {
        if let Some(enabled) = update.enabled {
            set_setting(&self.db, ENABLED_KEY, enabled).await?;
        }
        if let Some(track) = update.selected_track {
            set_setting(&self.db, SELECTED_TRACK_KEY, track).await?;
        }
        Ok(())
    }
}

/// In-process store for ephemeral runs and tests
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    stored: Mutex<StoredPreference>,
}

impl MemoryPreferenceStore {
    pub fn new(initial: StoredPreference) -> Self {
        Self {
            stored: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> StoredPreference {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn load(&self) -> Result<StoredPreference> {
        Ok(self.snapshot())
    }

    async fn save(&self, update: PreferenceUpdate) -> Result<()> {
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        if update.enabled.is_some() {
            stored.enabled = update.enabled;
        }
        if update.selected_track.is_some() {
            stored.selected_track = update.selected_track;
        }
        Ok(())
    }
}
