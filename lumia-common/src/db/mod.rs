//! Database access layer
//!
//! SQLite pool initialization and the key/value settings table.

pub mod init;
pub mod settings;
