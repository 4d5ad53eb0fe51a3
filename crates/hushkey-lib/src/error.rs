//! Unified error type for the hushkey-lib crate.
//!
//! [`HushkeyError`] wraps the module-specific errors (`AudioError`,
//! `HookError`, `LightingError`, `HotkeyError`) plus I/O and configuration
//! failures. `From` impls allow `?` to propagate across module boundaries.

use std::fmt;

use crate::audio::AudioError;
use crate::hook::HookError;
use crate::hotkey::HotkeyError;
use crate::lighting::LightingError;

/// Unified error type for hushkey-lib operations.
#[derive(Debug)]
pub enum HushkeyError {
    /// Capture device enumeration or mute failure.
    Audio(AudioError),
    /// Keyboard hook install/remove failure.
    Hook(HookError),
    /// Lighting peripheral link failure.
    Lighting(LightingError),
    /// Hotkey string rejected by strict parsing.
    Hotkey(HotkeyError),
    /// Standard I/O error (config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
}

impl fmt::Display for HushkeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HushkeyError::Audio(e) => write!(f, "{e}"),
            HushkeyError::Hook(e) => write!(f, "{e}"),
            HushkeyError::Lighting(e) => write!(f, "{e}"),
            HushkeyError::Hotkey(e) => write!(f, "Hotkey error: {e}"),
            HushkeyError::Io(e) => write!(f, "I/O error: {e}"),
            HushkeyError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for HushkeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HushkeyError::Audio(e) => Some(e),
            HushkeyError::Hook(e) => Some(e),
            HushkeyError::Lighting(e) => Some(e),
            HushkeyError::Hotkey(e) => Some(e),
            HushkeyError::Io(e) => Some(e),
            HushkeyError::Config(_) => None,
        }
    }
}

impl From<AudioError> for HushkeyError {
    fn from(e: AudioError) -> Self {
        HushkeyError::Audio(e)
    }
}

impl From<HookError> for HushkeyError {
    fn from(e: HookError) -> Self {
        HushkeyError::Hook(e)
    }
}

impl From<LightingError> for HushkeyError {
    fn from(e: LightingError) -> Self {
        HushkeyError::Lighting(e)
    }
}

impl From<HotkeyError> for HushkeyError {
    fn from(e: HotkeyError) -> Self {
        HushkeyError::Hotkey(e)
    }
}

impl From<std::io::Error> for HushkeyError {
    fn from(e: std::io::Error) -> Self {
        HushkeyError::Io(e)
    }
}

/// Crate-level Result alias using [`HushkeyError`].
pub type Result<T> = std::result::Result<T, HushkeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_audio_error() {
        let e: HushkeyError = AudioError::InitFailed("com".into()).into();
        assert!(matches!(e, HushkeyError::Audio(AudioError::InitFailed(_))));
    }

    #[test]
    fn from_lighting_error() {
        let e: HushkeyError = LightingError::NotConnected.into();
        assert!(matches!(e, HushkeyError::Lighting(LightingError::NotConnected)));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: HushkeyError = io_err.into();
        assert!(matches!(e, HushkeyError::Io(_)));
    }

    #[test]
    fn display_config_error() {
        let e = HushkeyError::Config("invalid input".into());
        assert_eq!(e.to_string(), "Config error: invalid input");
    }

    #[test]
    fn display_hotkey_error() {
        let e = HushkeyError::Hotkey(HotkeyError::UnknownKey("Banana".into()));
        assert_eq!(e.to_string(), "Hotkey error: unknown key \"Banana\"");
    }

    #[test]
    fn source_chains_hook_error() {
        let e = HushkeyError::Hook(HookError::InstallFailed("denied".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("denied"));
    }

    #[test]
    fn source_none_for_config() {
        let e = HushkeyError::Config("test".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_audio_to_hushkey() {
        fn inner() -> crate::audio::Result<()> {
            Err(AudioError::EnumerationFailed("gone".into()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(err, HushkeyError::Audio(AudioError::EnumerationFailed(_))));
    }
}
