//! Hushkey: global-hotkey microphone mute with tray, audio and lighting feedback.

pub mod audio;
pub mod config;
pub mod error;
pub mod hook;
pub mod hotkey;
pub mod lighting;
pub mod orchestrator;

pub use error::HushkeyError;
