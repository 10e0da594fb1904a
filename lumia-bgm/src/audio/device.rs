//! Device-backed platform audio (rodio)
//!
//! The rodio output stream is not `Send`, so it lives on a dedicated thread
//! for as long as the [`DeviceAudio`] exists; resources hold a
//! [`rodio::Sink`] on that stream. Each created resource starts paused with
//! its decoded source queued, so `play` only has to unpause it.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{AudioError, AudioHandle, PlatformAudio, PlaybackOptions};
use crate::catalog::SourceRef;
use crate::error::{Error, Result};

type FileDecoder = Decoder<BufReader<File>>;

/// Platform audio on the default output device
pub struct DeviceAudio {
    handle: OutputStreamHandle,
    sound_folder: PathBuf,
    next_id: AtomicU64,
    /// Dropping this ends the stream thread
    _stream_guard: mpsc::Sender<()>,
}

impl DeviceAudio {
    /// Open the default output device
    ///
    /// Relative sources are resolved against `sound_folder`.
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available.
    pub fn open(sound_folder: impl Into<PathBuf>) -> Result<Self> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (guard_tx, guard_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("lumia-audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if handle_tx.send(Ok(handle)).is_ok() {
                        // Blocks until the DeviceAudio is dropped
                        let _ = guard_rx.recv();
                    }
                    drop(stream);
                    debug!("Audio output stream closed");
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })?;

        let handle = handle_rx
            .recv()
            .map_err(|_| Error::Audio("audio output thread exited".to_string()))?
            .map_err(|e| Error::Audio(format!("No audio output device available: {}", e)))?;

        let sound_folder = sound_folder.into();
        info!("Audio output opened (sounds in {})", sound_folder.display());

        Ok(Self {
            handle,
            sound_folder,
            next_id: AtomicU64::new(0),
            _stream_guard: guard_tx,
        })
    }
}

#[async_trait]
impl PlatformAudio for DeviceAudio {
    async fn create(
        &self,
        source: &SourceRef,
        options: PlaybackOptions,
    ) -> std::result::Result<Box<dyn AudioHandle>, AudioError> {
        let path = resolve_source(&self.sound_folder, source);
        let handle = self.handle.clone();

        let sink = tokio::task::spawn_blocking(move || -> std::result::Result<Sink, AudioError> {
            let decoder = open_decoder(&path)?;
            let sink = Sink::try_new(&handle).map_err(|e| AudioError::Rejected(e.to_string()))?;
            sink.pause();
            sink.set_volume(options.volume.clamp(0.0, 1.0));
            if options.looping {
                sink.append(decoder.repeat_infinite());
            } else {
                sink.append(decoder);
            }
            Ok(sink)
        })
        .await
        .map_err(|e| AudioError::Rejected(format!("decoder task failed: {}", e)))??;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Device resource {} created for {} (looping={}, volume={:.2})",
            id, source, options.looping, options.volume
        );

        Ok(Box::new(DeviceHandle {
            id,
            source: source.to_string(),
            sink: Some(sink),
        }))
    }
}

/// Join a relative source onto the sound folder; absolute sources are kept
pub fn resolve_source(sound_folder: &Path, source: &SourceRef) -> PathBuf {
    let path = Path::new(source.as_str());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        sound_folder.join(path)
    }
}

fn open_decoder(path: &Path) -> std::result::Result<FileDecoder, AudioError> {
    let file = File::open(path)
        .map_err(|e| AudioError::SourceUnavailable(format!("{}: {}", path.display(), e)))?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| AudioError::SourceUnavailable(format!("{}: {}", path.display(), e)))
}

struct DeviceHandle {
    id: u64,
    source: String,
    sink: Option<Sink>,
}

impl DeviceHandle {
    fn sink(&self) -> std::result::Result<&Sink, AudioError> {
        self.sink
            .as_ref()
            .ok_or_else(|| AudioError::InvalidState(format!("resource {} already unloaded", self.id)))
    }
}

#[async_trait]
impl AudioHandle for DeviceHandle {
    fn id(&self) -> u64 {
        self.id
    }

    async fn play(&mut self) -> std::result::Result<(), AudioError> {
        self.sink()?.play();
        Ok(())
    }

    async fn stop(&mut self) -> std::result::Result<(), AudioError> {
        self.sink()?.pause();
        Ok(())
    }

    async fn unload(&mut self) -> std::result::Result<(), AudioError> {
        let sink = self
            .sink
            .take()
            .ok_or_else(|| AudioError::InvalidState(format!("resource {} already unloaded", self.id)))?;
        sink.stop();
        debug!("Device resource {} ({}) unloaded", self.id, self.source);
        Ok(())
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            warn!("Device resource {} ({}) dropped without unload", self.id, self.source);
            sink.stop();
        }
    }
}
