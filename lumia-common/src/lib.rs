//! # Lumia Common Library
//!
//! Shared code for the Lumia client services including:
//! - Identifier types (TrackId)
//! - Session event types and the EventBus
//! - Configuration file discovery and logging configuration
//! - Database initialization and the key/value settings table

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ids;

pub use error::{Error, Result};
pub use ids::TrackId;
