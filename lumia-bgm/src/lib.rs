//! # Lumia Background Music Library (lumia-bgm)
//!
//! Decides which single track (if any) should be audible and drives the
//! asynchronous create → play → stop → release lifecycle of the one audio
//! resource as the user moves between screens, pages through media, or
//! toggles the music preference.
//!
//! **Architecture:** signal sources → [`gate::FocusGate`] →
//! [`session::SessionManager`] → [`audio::AudioHandle`] → platform audio.
//! [`service::BackgroundMusic`] is the facade the rest of the application
//! talks to.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod gate;
pub mod preferences;
pub mod service;
pub mod session;

pub use error::{Error, Result};
pub use service::BackgroundMusic;
