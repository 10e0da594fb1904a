//! Configuration management for lumia-bgm
//!
//! A TOML bootstrap file describes the catalog, the muted routes, preference
//! defaults, the simulated platform's latencies and the sound folder used
//! by the output device. Every field has a compiled
//! default, so a missing file (or a missing section) still yields a working
//! configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--config, --data-folder, --log-level)
//! 2. Environment variables (LUMIA_CONFIG, LUMIA_DATA_FOLDER)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Runtime user preferences (music on/off, selected track) are not
//! configuration; they live in the database `settings` table.

use lumia_common::config::{load_toml_or_default, resolve_config_file, resolve_data_folder, LoggingConfig};
use lumia_common::TrackId;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::catalog::Catalog;
use crate::error::{Error, Result};

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "lumia.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    ///
    /// If not specified, will use environment → OS default
    pub data_folder: Option<PathBuf>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Catalog, mute policy and preference defaults
    pub music: MusicConfig,

    /// Simulated platform audio behaviour
    pub simulation: SimulationConfig,

    /// Output device settings (used with --device)
    pub device: DeviceConfig,
}

/// Catalog, routing and preference-default configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    /// Music switch value used when nothing has been stored yet
    pub default_enabled: bool,

    /// Selected track used when nothing has been stored yet
    pub default_track: Option<TrackId>,

    /// Routes on which background music is forced off
    pub muted_routes: Vec<String>,

    /// Track catalog
    pub tracks: Vec<TrackConfig>,

    /// Routes that page through catalog items
    pub paged_routes: Vec<PagedRouteConfig>,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            default_enabled: true,
            default_track: Some(TrackId(1)),
            muted_routes: vec!["/settings".to_string()],
            tracks: vec![
                TrackConfig::looping(1, "sounds/music1.mp3"),
                TrackConfig::looping(2, "sounds/music2.mp3"),
                TrackConfig::looping(11, "sounds/fire_sound.mp3"),
                TrackConfig::looping(12, "sounds/rain_sound.mp3"),
            ],
            paged_routes: vec![PagedRouteConfig {
                route: "/healing".to_string(),
                tracks: vec![TrackId(11), TrackId(12)],
            }],
        }
    }
}

/// One catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    pub id: TrackId,
    pub source: String,
    #[serde(default = "default_looping")]
    pub looping: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl TrackConfig {
    fn looping(id: u32, source: &str) -> Self {
        Self {
            id: TrackId(id),
            source: source.to_string(),
            looping: default_looping(),
            volume: default_volume(),
        }
    }
}

fn default_looping() -> bool {
    true
}

fn default_volume() -> f32 {
    1.0
}

/// A paged-media route and the track of each page, in page order
#[derive(Debug, Clone, Deserialize)]
pub struct PagedRouteConfig {
    pub route: String,
    pub tracks: Vec<TrackId>,
}

/// Simulated platform latencies and failure injection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub create_latency_ms: u64,
    pub play_latency_ms: u64,
    pub stop_latency_ms: u64,
    pub unload_latency_ms: u64,
    /// Sources whose creation always fails
    pub fail_sources: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            create_latency_ms: 250,
            play_latency_ms: 20,
            stop_latency_ms: 20,
            unload_latency_ms: 10,
            fail_sources: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn create_latency(&self) -> Duration {
        Duration::from_millis(self.create_latency_ms)
    }

    pub fn play_latency(&self) -> Duration {
        Duration::from_millis(self.play_latency_ms)
    }

    pub fn stop_latency(&self) -> Duration {
        Duration::from_millis(self.stop_latency_ms)
    }

    pub fn unload_latency(&self) -> Duration {
        Duration::from_millis(self.unload_latency_ms)
    }
}

/// Output device settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Folder that relative track sources are resolved against
    pub sound_folder: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sound_folder: PathBuf::from("."),
        }
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub data_folder: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// TOML file the configuration came from (None = compiled defaults)
    pub source: Option<PathBuf>,
    pub database_path: PathBuf,
    pub logging: LoggingConfig,
    pub music: MusicConfig,
    pub simulation: SimulationConfig,
    pub device: DeviceConfig,
    /// Catalog built from `music`, validated once at load
    pub catalog: Catalog,
}

impl Config {
    /// Load configuration from TOML (if any) and apply CLI overrides
    ///
    /// # Errors
    ///
    /// Returns error if the TOML file exists but cannot be read or parsed,
    /// or if the catalog or preference defaults fail validation.
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let source = resolve_config_file(overrides.config_path.as_deref());
        let toml_config: TomlConfig = load_toml_or_default(source.as_deref())?;
        let config = Self::from_toml(toml_config, source, overrides)?;

        info!("Database: {}", config.database_path.display());
        Ok(config)
    }

    /// Build from already-parsed TOML
    pub fn from_toml(
        toml_config: TomlConfig,
        source: Option<PathBuf>,
        overrides: ConfigOverrides,
    ) -> Result<Self> {
        let data_folder = resolve_data_folder(
            overrides.data_folder.as_deref(),
            toml_config.data_folder.as_deref(),
        );

        let mut logging = toml_config.logging;
        if let Some(level) = overrides.log_level {
            logging.level = level;
        }

        let catalog = build_catalog(&toml_config.music)?;

        Ok(Self {
            source,
            database_path: data_folder.join(DATABASE_FILE_NAME),
            logging,
            music: toml_config.music,
            simulation: toml_config.simulation,
            device: toml_config.device,
            catalog,
        })
    }
}

/// Build the catalog and check preference defaults against it
fn build_catalog(music: &MusicConfig) -> Result<Catalog> {
    let catalog = Catalog::from_config(music)?;
    if let Some(default_track) = music.default_track {
        if !catalog.contains(default_track) {
            return Err(Error::Config(format!(
                "default_track {} is not in the catalog",
                default_track
            )));
        }
    }
    Ok(catalog)
}
