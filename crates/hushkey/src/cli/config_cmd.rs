//! `config` subcommand: show current configuration and file paths.

use std::path::Path;

use hushkey_lib::config::MAX_SOUND_FILE_BYTES;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width};

fn sound_label(path: &str) -> String {
    if path.is_empty() {
        "(built-in)".to_string()
    } else {
        path.to_string()
    }
}

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let (config, config_path, warnings) = super::load_config(custom_path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let errors: Vec<String> = match config.validate(MAX_SOUND_FILE_BYTES) {
        Ok(()) => vec![],
        Err(errs) => errs.iter().map(ToString::to_string).collect(),
    };

    if json {
        return super::print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            warnings,
            errors,
        });
    }

    let w = kv_width(
        &["Config file:", "Log file:"],
        &[
            "hotkey:",
            "play_audio:",
            "muted_profile:",
            "unmuted_profile:",
            "start_muted:",
            "lighting_host:",
            "lighting_port:",
            "lighting_autoconnect:",
            "connect_timeout_ms:",
            "poll_interval_ms:",
            "hotkey_repeat_guard_ms:",
            "mute_sound_path:",
            "unmute_sound_path:",
            "notifications_enabled:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    match Config::log_path() {
        Some(p) => kv("Log file:", p.display(), w),
        None => kv("Log file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let canonical = config.hotkey_combination().to_string();
    if canonical == config.hotkey {
        kv_indent("hotkey:", &config.hotkey, w);
    } else {
        kv_indent("hotkey:", format_args!("{} -> {canonical}", config.hotkey), w);
    }
    kv_indent("play_audio:", config.play_audio, w);
    kv_indent("muted_profile:", &config.muted_profile, w);
    kv_indent("unmuted_profile:", &config.unmuted_profile, w);
    kv_indent("start_muted:", config.start_muted, w);
    kv_indent("lighting_host:", &config.lighting_host, w);
    kv_indent("lighting_port:", config.lighting_port, w);
    kv_indent("lighting_autoconnect:", config.lighting_autoconnect, w);
    kv_indent("connect_timeout_ms:", config.connect_timeout_ms, w);
    kv_indent("poll_interval_ms:", config.poll_interval_ms, w);
    kv_indent("hotkey_repeat_guard_ms:", config.hotkey_repeat_guard_ms, w);
    kv_indent("mute_sound_path:", sound_label(&config.mute_sound_path), w);
    kv_indent("unmute_sound_path:", sound_label(&config.unmute_sound_path), w);
    kv_indent("notifications_enabled:", config.notifications_enabled, w);

    if !warnings.is_empty() || !errors.is_empty() {
        println!();
        println!("Problems:");
        for w in warnings.iter().chain(&errors) {
            println!("  {w}");
        }
    }
    Ok(())
}
