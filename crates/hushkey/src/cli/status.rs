//! `status` subcommand: show microphone, lighting and config status.

use std::path::Path;

use super::{
    Config, ConfigSummaryJson, LightingStatusJson, MicrophoneStatusJson, Result, StatusOutput,
    audio, kv, kv_indent, kv_width,
};

/// Query aggregate microphone status. None when the audio system is unavailable.
fn get_mic_status() -> Option<MicrophoneStatusJson> {
    let gateway = match super::open_gateway() {
        Ok(g) => g,
        Err(e) => {
            log::debug!("[status] audio unavailable: {e}");
            return None;
        }
    };
    let states = gateway.read_mute().ok()?;
    Some(MicrophoneStatusJson {
        muted: audio::all_muted(&states),
        device_count: states.len(),
    })
}

/// Probe the lighting server once. A refused or timed-out connect is not an error.
fn get_lighting_status(config: &Config) -> LightingStatusJson {
    let mut client = super::lighting_client(config);
    let connected = client.connect().is_ok();
    let profile_count = if connected {
        client.list_profiles().ok().map(|p| p.len())
    } else {
        None
    };
    client.disconnect();
    LightingStatusJson {
        address: config.lighting_address(),
        connected,
        profile_count,
    }
}

fn print_status(
    mic_status: Option<MicrophoneStatusJson>,
    lighting: LightingStatusJson,
    config: &Config,
    json: bool,
) -> Result<()> {
    let summary = ConfigSummaryJson::from_config(config);

    if json {
        return super::print_json(&StatusOutput {
            version: env!("CARGO_PKG_VERSION").to_string(),
            microphone: mic_status,
            lighting,
            config: summary,
        });
    }

    let w = kv_width(
        &["Version:", "Microphone:", "Lighting:"],
        &[
            "Devices:",
            "Address:",
            "Profiles:",
            "Hotkey:",
            "Sound:",
            "Muted profile:",
            "Unmuted profile:",
            "Start muted:",
        ],
    );

    kv("Version:", env!("CARGO_PKG_VERSION"), w);
    println!();

    match &mic_status {
        Some(mic) if mic.device_count == 0 => kv("Microphone:", "no capture devices", w),
        Some(mic) => {
            kv("Microphone:", if mic.muted { "MUTED" } else { "LIVE" }, w);
            kv_indent("Devices:", mic.device_count, w);
        }
        None => kv("Microphone:", "not available", w),
    }
    println!();

    kv(
        "Lighting:",
        if lighting.connected {
            "CONNECTED"
        } else {
            "NOT CONNECTED"
        },
        w,
    );
    kv_indent("Address:", &lighting.address, w);
    if let Some(n) = lighting.profile_count {
        kv_indent("Profiles:", n, w);
    }
    println!();

    println!("Config:");
    kv_indent("Hotkey:", &summary.hotkey, w);
    kv_indent("Sound:", if summary.play_audio { "on" } else { "off" }, w);
    kv_indent("Muted profile:", &summary.muted_profile, w);
    kv_indent("Unmuted profile:", &summary.unmuted_profile, w);
    kv_indent("Start muted:", if summary.start_muted { "on" } else { "off" }, w);

    Ok(())
}

pub(super) fn cmd_status(json: bool, config_path: Option<&Path>) -> Result<()> {
    let (config, _, _) = super::load_config(config_path);
    let mic_status = get_mic_status();
    let lighting = get_lighting_status(&config);
    print_status(mic_status, lighting, &config, json)
}
