//! Application configuration: TOML-based, platform-aware paths.
//!
//! [`Config`] is the on-disk representation. [`SettingsStore`] is the narrow
//! contract the orchestrator and tray use to read and persist individual
//! settings; [`ConfigStore`] implements it on top of a `Config` file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hotkey::{self, KeyCombination};

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# Hushkey configuration — changes made outside the app may be overwritten.\n\n";

/// Largest custom cue file accepted by [`Config::validate`].
pub const MAX_SOUND_FILE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Global hotkey to toggle mute. Default: "Ctrl+Alt+N". Format: "Modifier+Key" or just "Key".
    #[serde(default = "default_hotkey")]
    pub hotkey: String,

    /// Play an audio cue when mute state changes.
    #[serde(default = "default_true")]
    pub play_audio: bool,

    /// Lighting profile selected while muted.
    #[serde(default = "default_muted_profile")]
    pub muted_profile: String,

    /// Lighting profile selected while unmuted.
    #[serde(default = "default_unmuted_profile")]
    pub unmuted_profile: String,

    /// Mute all capture devices on startup.
    #[serde(default)]
    pub start_muted: bool,

    /// OpenRGB SDK server host.
    #[serde(default = "default_lighting_host")]
    pub lighting_host: String,

    /// OpenRGB SDK server port.
    #[serde(default = "default_lighting_port")]
    pub lighting_port: u16,

    /// Try to connect to the lighting server on startup.
    #[serde(default = "default_true")]
    pub lighting_autoconnect: bool,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Liveness poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ignore hotkey triggers that arrive within this window of the previous
    /// one (key auto-repeat). 0 = every trigger toggles.
    #[serde(default = "default_repeat_guard_ms")]
    pub hotkey_repeat_guard_ms: u64,

    /// Path to custom mute sound WAV file. Empty = use built-in.
    #[serde(default)]
    pub mute_sound_path: String,

    /// Path to custom unmute sound WAV file. Empty = use built-in.
    #[serde(default)]
    pub unmute_sound_path: String,

    /// Show desktop notification on mute state change.
    #[serde(default)]
    pub notifications_enabled: bool,
}

fn default_hotkey() -> String {
    hotkey::DEFAULT_HOTKEY.to_string()
}
fn default_muted_profile() -> String {
    "Muted".into()
}
fn default_unmuted_profile() -> String {
    "Default".into()
}
fn default_lighting_host() -> String {
    "127.0.0.1".into()
}
fn default_lighting_port() -> u16 {
    6742
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_repeat_guard_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hotkey: default_hotkey(),
            play_audio: true,
            muted_profile: default_muted_profile(),
            unmuted_profile: default_unmuted_profile(),
            start_muted: false,
            lighting_host: default_lighting_host(),
            lighting_port: default_lighting_port(),
            lighting_autoconnect: true,
            connect_timeout_ms: default_connect_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            hotkey_repeat_guard_ms: default_repeat_guard_ms(),
            mute_sound_path: String::new(),
            unmute_sound_path: String::new(),
            notifications_enabled: false,
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The `hotkey` field doesn't parse strictly (the app would fall back to the default).
    InvalidHotkey(String),
    /// A custom sound path is invalid (`field` is `"mute_sound_path"` or `"unmute_sound_path"`).
    InvalidSoundPath { field: &'static str, reason: String },
    /// `lighting_host` is empty.
    EmptyLightingHost,
    /// A timing field is zero where a positive value is required.
    ZeroDuration(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidHotkey(e) => write!(f, "Invalid hotkey: {e}"),
            ValidationError::InvalidSoundPath { field, reason } => {
                write!(f, "Invalid {field}: {reason}")
            }
            ValidationError::EmptyLightingHost => write!(f, "Lighting host cannot be empty"),
            ValidationError::ZeroDuration(field) => write!(f, "{field} must be greater than 0"),
        }
    }
}

impl Config {
    /// `<config dir>/Hushkey` on Windows, `<config dir>/hushkey` elsewhere.
    pub fn dir() -> Option<PathBuf> {
        let name = if cfg!(windows) { "Hushkey" } else { "hushkey" };
        dirs::config_dir().map(|base| base.join(name))
    }

    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Tray log file, next to the config.
    pub fn log_path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("hushkey.log"))
    }

    /// Write `path` atomically: serialize into a sibling temp file, then rename.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let body = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = [CONFIG_HEADER, &body].concat();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            // e.g. a target on another volume; write in place instead
            log::debug!("[config] rename into {} failed ({e}), writing directly", path.display());
            let written = std::fs::write(path, &contents);
            let _ = std::fs::remove_file(&tmp);
            return written;
        }
        Ok(())
    }

    /// Read `path`. A missing file is not an error; anything unreadable or
    /// malformed yields defaults plus one warning.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (Self::default(), vec![]),
            Err(e) => {
                let warning = format!("config read error ({}), using defaults: {e}", path.display());
                return (Self::default(), vec![warning]);
            }
        };
        match toml::from_str(&text) {
            Ok(config) => (config, vec![]),
            Err(e) => {
                let warning = format!("config parse error ({}), using defaults: {e}", path.display());
                (Self::default(), vec![warning])
            }
        }
    }

    /// The configured hotkey, falling back to the default on parse failure.
    pub fn hotkey_combination(&self) -> KeyCombination {
        hotkey::parse(&self.hotkey)
    }

    /// `host:port` of the lighting server.
    pub fn lighting_address(&self) -> String {
        format!("{}:{}", self.lighting_host, self.lighting_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn repeat_guard(&self) -> Duration {
        Duration::from_millis(self.hotkey_repeat_guard_ms)
    }

    /// A custom cue must be an existing `.wav` no larger than `max_size_bytes`.
    /// Empty means the built-in tone.
    pub fn validate_sound_path(path: &str, max_size_bytes: u64) -> crate::error::Result<()> {
        let path = path.trim();
        if path.is_empty() {
            return Ok(());
        }
        let fail = |msg: String| Err(crate::HushkeyError::Config(msg));

        let p = Path::new(path);
        let is_wav = p
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return fail(format!("Not a .wav file: {path}"));
        }
        let meta = match std::fs::metadata(p) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return fail(format!("File not found: {path}"));
            }
            Err(e) => return fail(format!("Cannot read {path}: {e}")),
        };
        if meta.len() > max_size_bytes {
            return fail(format!(
                "File too large: {} bytes (max {max_size_bytes})",
                meta.len()
            ));
        }
        Ok(())
    }

    /// Check every field and report all problems at once.
    pub fn validate(&self, max_sound_bytes: u64) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.hotkey.parse::<KeyCombination>() {
            errors.push(ValidationError::InvalidHotkey(e.to_string()));
        }
        for (field, value) in [
            ("mute_sound_path", &self.mute_sound_path),
            ("unmute_sound_path", &self.unmute_sound_path),
        ] {
            if let Err(e) = Self::validate_sound_path(value, max_sound_bytes) {
                errors.push(ValidationError::InvalidSoundPath {
                    field,
                    reason: e.to_string(),
                });
            }
        }
        if self.lighting_host.trim().is_empty() {
            errors.push(ValidationError::EmptyLightingHost);
        }
        for (field, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError::ZeroDuration(field));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// ── Settings store ──

/// Flat key/value settings surface used by the orchestrator and tray.
///
/// Setters only change the in-memory value; [`save`](SettingsStore::save)
/// persists all pending changes at once.
pub trait SettingsStore {
    fn hotkey_string(&self) -> &str;
    fn set_hotkey_string(&mut self, hotkey: &str);
    fn play_audio(&self) -> bool;
    fn set_play_audio(&mut self, enabled: bool);
    fn profile_for_state(&self, muted: bool) -> &str;
    fn set_profile_for_state(&mut self, muted: bool, profile: &str);
    fn save(&mut self) -> std::io::Result<()>;
}

/// [`SettingsStore`] backed by a [`Config`] and an optional file path.
///
/// Without a path (`in_memory`) `save` is a no-op, which is what tests and
/// the CLI's one-shot commands want.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: Config,
    path: Option<PathBuf>,
    dirty: bool,
}

impl ConfigStore {
    /// Load from an explicit path, returning parse warnings.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        let (config, warnings) = Config::load_from(path);
        (
            ConfigStore {
                config,
                path: Some(path.to_path_buf()),
                dirty: false,
            },
            warnings,
        )
    }

    pub fn in_memory(config: Config) -> Self {
        ConfigStore {
            config,
            path: None,
            dirty: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether there are changes not yet written by `save`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl SettingsStore for ConfigStore {
    fn hotkey_string(&self) -> &str {
        &self.config.hotkey
    }

    fn set_hotkey_string(&mut self, hotkey: &str) {
        if self.config.hotkey != hotkey {
            self.config.hotkey = hotkey.to_string();
            self.dirty = true;
        }
    }

    fn play_audio(&self) -> bool {
        self.config.play_audio
    }

    fn set_play_audio(&mut self, enabled: bool) {
        if self.config.play_audio != enabled {
            self.config.play_audio = enabled;
            self.dirty = true;
        }
    }

    fn profile_for_state(&self, muted: bool) -> &str {
        if muted {
            &self.config.muted_profile
        } else {
            &self.config.unmuted_profile
        }
    }

    fn set_profile_for_state(&mut self, muted: bool, profile: &str) {
        let slot = if muted {
            &mut self.config.muted_profile
        } else {
            &mut self.config.unmuted_profile
        };
        if slot != profile {
            *slot = profile.to_string();
            self.dirty = true;
        }
    }

    fn save(&mut self) -> std::io::Result<()> {
        if let Some(ref path) = self.path {
            self.config.save_to(path)?;
        }
        self.dirty = false;
        Ok(())
    }
}
