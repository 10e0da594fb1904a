//! Lumia background music driver - Main entry point
//!
//! Runs the background music service against the simulated platform audio,
//! or the default output device with `--device` (feature `device-audio`).
//! Navigation, paging and preference changes are read as line commands from
//! stdin (see [`lumia_bgm::console`]); session events are printed to stdout
//! as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lumia_bgm::audio::{PlatformAudio, SimulatedAudio};
use lumia_bgm::config::{Config, ConfigOverrides};
use lumia_bgm::console::{apply_command, parse_command, CommandOutcome};
use lumia_bgm::preferences::{MemoryPreferenceStore, PreferenceStore, SqlitePreferenceStore};
use lumia_bgm::BackgroundMusic;
use lumia_common::db::init::init_database;
use lumia_common::events::EventBus;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lumia-bgm
#[derive(Parser, Debug)]
#[command(name = "lumia-bgm")]
#[command(about = "Background music session driver for Lumia")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "LUMIA_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the preference database
    #[arg(short, long, env = "LUMIA_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LUMIA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Keep preferences in memory instead of the database
    #[arg(long)]
    ephemeral: bool,

    /// Play through the default output device instead of the simulator
    #[arg(long)]
    device: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(ConfigOverrides {
        config_path: args.config,
        data_folder: args.data_folder,
        log_level: args.log_level,
    })
    .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lumia_bgm={0},lumia_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting Lumia background music (git {}, built {}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config.source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let store: Arc<dyn PreferenceStore> = if args.ephemeral {
        info!("Preferences: in memory");
        Arc::new(MemoryPreferenceStore::default())
    } else {
        info!("Preferences: {}", config.database_path.display());
        let db = init_database(&config.database_path)
            .await
            .context("Failed to initialize database")?;
        Arc::new(SqlitePreferenceStore::new(db))
    };

    let events = EventBus::default();
    let printer = tokio::spawn(print_events(events.subscribe()));

    let platform: Arc<dyn PlatformAudio> = if args.device {
        open_device(&config)?
    } else {
        info!("Audio: simulated");
        Arc::new(SimulatedAudio::from_config(&config.simulation))
    };
    let service = BackgroundMusic::start(config.catalog.clone(), &config.music, store, platform, events);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("End of input, shutting down");
                    break;
                };
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                };
                match apply_command(&service, command) {
                    Ok(CommandOutcome::Continue) => {}
                    Ok(CommandOutcome::Status(status)) => {
                        let status = serde_json::to_string(&status)
                            .context("Failed to serialize status")?;
                        println!("{}", status);
                    }
                    Ok(CommandOutcome::Quit) => break,
                    Err(e) => warn!("{}", e),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    let status = service.teardown().await;
    // Bus closes once the service is gone; give the printer a moment to drain
    if tokio::time::timeout(Duration::from_millis(500), printer).await.is_err() {
        warn!("Event printer did not drain");
    }

    info!("Shutdown complete ({})", status.phase);
    Ok(())
}

#[cfg(feature = "device-audio")]
fn open_device(config: &Config) -> Result<Arc<dyn PlatformAudio>> {
    let device = lumia_bgm::audio::DeviceAudio::open(config.device.sound_folder.clone())
        .context("Failed to open audio output")?;
    Ok(Arc::new(device))
}

#[cfg(not(feature = "device-audio"))]
fn open_device(_config: &Config) -> Result<Arc<dyn PlatformAudio>> {
    anyhow::bail!("--device requires a build with the device-audio feature")
}

/// Print every session event as one JSON line
async fn print_events(mut rx: broadcast::Receiver<lumia_common::events::SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize event: {}", e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event printer lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
