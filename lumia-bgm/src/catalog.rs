//! Track catalog
//!
//! The small fixed set of playable tracks, plus the pages of each paged-media
//! route (a screen that swipes through items, each with its own track).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use lumia_common::TrackId;

use crate::audio::PlaybackOptions;
use crate::config::MusicConfig;
use crate::error::{Error, Result};

/// Opaque locator handed to the platform audio subsystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog entry; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub source: SourceRef,
    pub looping: bool,
    /// Playback volume (0.0-1.0)
    pub volume: f32,
}

impl Track {
    pub fn new(id: TrackId, source: impl Into<String>) -> Self {
        Self {
            id,
            source: SourceRef::new(source),
            looping: true,
            volume: 1.0,
        }
    }

    /// Options passed to `PlatformAudio::create`
    pub fn options(&self) -> PlaybackOptions {
        PlaybackOptions {
            looping: self.looping,
            volume: self.volume,
        }
    }
}

/// Immutable track catalog with paged-media routes
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: BTreeMap<TrackId, Track>,
    pages: HashMap<String, Vec<TrackId>>,
}

impl Catalog {
    /// Build and validate the catalog from configuration
    ///
    /// Rejects duplicate track ids, volumes outside 0.0-1.0, empty sources,
    /// and paged routes referring to unknown tracks.
    pub fn from_config(config: &MusicConfig) -> Result<Self> {
        let mut tracks = BTreeMap::new();
        for entry in &config.tracks {
            if entry.source.trim().is_empty() {
                return Err(Error::Config(format!("Track {} has an empty source", entry.id)));
            }
            if !(0.0..=1.0).contains(&entry.volume) {
                return Err(Error::Config(format!(
                    "Track {} volume {} outside 0.0-1.0",
                    entry.id, entry.volume
                )));
            }
            let track = Track {
                id: entry.id,
                source: SourceRef::new(entry.source.clone()),
                looping: entry.looping,
                volume: entry.volume,
            };
            if tracks.insert(entry.id, track).is_some() {
                return Err(Error::Config(format!("Duplicate track id {}", entry.id)));
            }
        }

        let mut pages = HashMap::new();
        let mut seen_routes = HashSet::new();
        for paged in &config.paged_routes {
            if !seen_routes.insert(paged.route.as_str()) {
                return Err(Error::Config(format!("Duplicate paged route {}", paged.route)));
            }
            if let Some(missing) = paged.tracks.iter().find(|id| !tracks.contains_key(*id)) {
                return Err(Error::Config(format!(
                    "Paged route {} refers to unknown track {}",
                    paged.route, missing
                )));
            }
            pages.insert(paged.route.clone(), paged.tracks.clone());
        }

        Ok(Self { tracks, pages })
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn is_paged_route(&self, route: &str) -> bool {
        self.pages.contains_key(route)
    }

    /// Track shown at `index` on a paged route, if the index is in range
    pub fn page_track(&self, route: &str, index: usize) -> Option<&Track> {
        self.pages
            .get(route)
            .and_then(|ids| ids.get(index))
            .and_then(|id| self.tracks.get(id))
    }

    pub fn page_count(&self, route: &str) -> usize {
        self.pages.get(route).map_or(0, Vec::len)
    }
}
