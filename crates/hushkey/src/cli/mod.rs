//! CLI subcommands: capture devices, mute control, hotkeys, lighting profiles.

mod capture;
mod config_cmd;
mod devices;
mod hotkey_cmd;
mod mute;
mod profiles;
mod status;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use hushkey_lib::audio::{self, MuteGateway};
pub(super) use hushkey_lib::config::Config;
pub(super) use hushkey_lib::error::Result;
pub(super) use hushkey_lib::lighting::{LightingClient, openrgb::OpenRgbConnector};

/// Minimum gap between a key and its value.
const GAP: usize = 2;
const INDENT: &str = "  ";

/// Value column shared by top-level and indented keys.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top = top.iter().map(|k| k.len() + GAP);
    let nested = indent.iter().map(|k| INDENT.len() + k.len() + GAP);
    top.chain(nested).max().unwrap_or(0)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<w$}{value}")
}

fn format_kv_indent(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    let inner = w.saturating_sub(INDENT.len());
    format!("{INDENT}{key:<inner$}{value}")
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv_indent(key, value, w));
}

/// Serialize to pretty JSON and print it.
pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let s = serde_json::to_string_pretty(value).map_err(|e| {
        hushkey_lib::HushkeyError::Config(format!("JSON serialization failed: {e}"))
    })?;
    println!("{s}");
    Ok(())
}

/// Load config from `--config` or the default path, logging parse warnings.
///
/// Returns the config, the path it came from, and the warnings.
pub(super) fn load_config(custom: Option<&Path>) -> (Config, Option<PathBuf>, Vec<String>) {
    let path = custom.map(Path::to_path_buf).or_else(Config::path);
    let (config, warnings) = match &path {
        Some(p) => Config::load_from(p),
        None => (Config::default(), vec![]),
    };
    for w in &warnings {
        log::warn!("[config] {w}");
    }
    (config, path, warnings)
}

/// Open the platform capture directory. COM is initialized first on Windows.
pub(super) fn open_gateway() -> Result<MuteGateway> {
    #[cfg(windows)]
    audio::com_init()?;
    Ok(MuteGateway::new(audio::platform_directory()?))
}

/// A lighting client for the configured server. Not yet connected.
pub(super) fn lighting_client(config: &Config) -> LightingClient {
    LightingClient::new(
        Box::new(OpenRgbConnector::new(config.lighting_address())),
        config.connect_timeout(),
        config.poll_interval(),
    )
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct StatusOutput {
    pub version: String,
    pub microphone: Option<MicrophoneStatusJson>,
    pub lighting: LightingStatusJson,
    pub config: ConfigSummaryJson,
}

#[derive(Serialize)]
pub(super) struct MicrophoneStatusJson {
    pub muted: bool,
    pub device_count: usize,
}

#[derive(Serialize)]
pub(super) struct LightingStatusJson {
    pub address: String,
    pub connected: bool,
    pub profile_count: Option<usize>,
}

#[derive(Serialize)]
pub(super) struct ConfigSummaryJson {
    pub hotkey: String,
    pub play_audio: bool,
    pub muted_profile: String,
    pub unmuted_profile: String,
    pub start_muted: bool,
}

impl ConfigSummaryJson {
    pub fn from_config(config: &Config) -> Self {
        ConfigSummaryJson {
            hotkey: config.hotkey_combination().to_string(),
            play_audio: config.play_audio,
            muted_profile: config.muted_profile.clone(),
            unmuted_profile: config.unmuted_profile.clone(),
            start_muted: config.start_muted,
        }
    }
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct DeviceJson {
    pub name: String,
    pub muted: bool,
}

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DeviceJson>,
}

#[derive(Serialize)]
pub(super) struct HotkeyOutput {
    pub input: String,
    pub canonical: String,
    pub valid: bool,
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub(super) struct ProfilesOutput {
    pub address: String,
    pub profiles: Vec<String>,
    pub muted_profile: String,
    pub unmuted_profile: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show microphone, lighting and config status
    Status,

    /// List active capture devices and their mute flags
    Devices,

    /// Mute every active capture device
    Mute,

    /// Unmute every active capture device
    Unmute,

    /// Toggle mute on every active capture device
    Toggle,

    /// Show current configuration and file paths
    Config,

    /// Parse a hotkey string and show its canonical form
    Hotkey {
        /// Combination such as "Ctrl+Alt+N"
        text: String,
        /// Save it as the configured hotkey (rejects invalid input)
        #[arg(long)]
        save: bool,
    },

    /// Press a key combination to capture it as a hotkey
    Capture {
        /// Save the captured combination as the configured hotkey
        #[arg(long)]
        save: bool,
    },

    /// List lighting profiles on the OpenRGB server
    Profiles,

    /// Load a lighting profile on the OpenRGB server
    Profile {
        /// Profile name as listed by `profiles`
        name: String,
    },
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, json: bool, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        Command::Status => status::cmd_status(json, config_path),
        Command::Devices => devices::cmd_devices(json),
        Command::Mute => mute::cmd_set_mute(mute::MuteAction::Mute, json),
        Command::Unmute => mute::cmd_set_mute(mute::MuteAction::Unmute, json),
        Command::Toggle => mute::cmd_set_mute(mute::MuteAction::Toggle, json),
        Command::Config => config_cmd::cmd_config(json, config_path),
        Command::Hotkey { text, save } => hotkey_cmd::cmd_hotkey(&text, save, json, config_path),
        Command::Capture { save } => {
            if json {
                warn_json_unsupported("capture");
            }
            capture::cmd_capture(save, config_path)
        }
        Command::Profiles => profiles::cmd_profiles(json, config_path),
        Command::Profile { name } => {
            if json {
                warn_json_unsupported("profile");
            }
            profiles::cmd_load_profile(&name, config_path)
        }
    }
}


#[cfg(test)]
mod json_output_tests {
    use super::*;

    #[test]
    fn status_output_without_microphone() {
        let output = StatusOutput {
            version: "0.1.0".into(),
            microphone: None,
            lighting: LightingStatusJson {
                address: "127.0.0.1:6742".into(),
                connected: false,
                profile_count: None,
            },
            config: ConfigSummaryJson::from_config(&Config::default()),
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["version"], "0.1.0");
        assert!(parsed["microphone"].is_null());
        assert_eq!(parsed["lighting"]["connected"], false);
        assert_eq!(parsed["config"]["hotkey"], "Ctrl+Alt+N");
        assert_eq!(parsed["config"]["muted_profile"], "Muted");
    }

    #[test]
    fn config_summary_uses_canonical_hotkey() {
        let config = Config {
            hotkey: "shift+ctrl+m".into(),
            ..Config::default()
        };
        assert_eq!(ConfigSummaryJson::from_config(&config).hotkey, "Ctrl+Shift+M");
    }

    #[test]
    fn config_output_complete() {
        let output = ConfigOutput {
            config_file: None,
            config_file_exists: false,
            settings: Config::default(),
            warnings: vec![],
            errors: vec!["Invalid hotkey: unknown key \"Banana\"".into()],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert!(parsed["config_file"].is_null());
        assert_eq!(parsed["settings"]["hotkey"], "Ctrl+Alt+N");
        assert_eq!(parsed["settings"]["lighting_port"], 6742);
        assert_eq!(parsed["errors"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn devices_output_with_devices() {
        let output = DevicesOutput {
            count: 2,
            devices: vec![
                DeviceJson {
                    name: "Headset".into(),
                    muted: true,
                },
                DeviceJson {
                    name: "Webcam".into(),
                    muted: false,
                },
            ],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["count"], 2);
        assert_eq!(parsed["devices"][0]["muted"], true);
        assert_eq!(parsed["devices"][1]["name"], "Webcam");
    }

    #[test]
    fn load_config_from_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "muted_profile = \"Red\"\n").unwrap();
        let (config, loaded_from, warnings) = load_config(Some(&path));
        assert_eq!(config.muted_profile, "Red");
        assert_eq!(loaded_from.as_deref(), Some(path.as_path()));
        assert!(warnings.is_empty());
    }
}
