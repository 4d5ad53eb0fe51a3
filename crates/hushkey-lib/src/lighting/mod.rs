//! Peripheral lighting: connection state machine over a profile-capable link.
//!
//! [`LightingClient`] owns the only connection. Every call returns a
//! `Result`; any link error tears the connection down to `Disconnected`, and
//! nothing reconnects automatically.

mod client;
pub mod openrgb;
pub mod stub;

use std::fmt;
use std::time::Duration;

pub use client::{ConnectionState, LightingClient};

#[derive(Debug)]
pub enum LightingError {
    /// Connect or request exceeded its timeout.
    Timeout,
    /// Server refused or could not be reached.
    Unavailable(String),
    /// Operation requires a connected client.
    NotConnected,
    /// Malformed or unexpected reply.
    Protocol(String),
    Io(std::io::Error),
}

impl fmt::Display for LightingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightingError::Timeout => write!(f, "Lighting server timed out"),
            LightingError::Unavailable(e) => write!(f, "Lighting server unavailable: {e}"),
            LightingError::NotConnected => write!(f, "Lighting server not connected"),
            LightingError::Protocol(e) => write!(f, "Lighting protocol error: {e}"),
            LightingError::Io(e) => write!(f, "Lighting I/O error: {e}"),
        }
    }
}

impl std::error::Error for LightingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LightingError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LightingError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => LightingError::Timeout,
            _ => LightingError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, LightingError>;

/// An established connection to a lighting server.
pub trait LightingLink {
    /// Trivial query used as the liveness poll.
    fn controller_count(&mut self) -> Result<u32>;
    /// Saved profile names, in server order.
    fn profiles(&mut self) -> Result<Vec<String>>;
    fn load_profile(&mut self, name: &str) -> Result<()>;
}

/// Opens links. Implementations must return within `timeout`.
pub trait LinkConnector {
    fn connect(&self, timeout: Duration) -> Result<Box<dyn LightingLink>>;
    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}
