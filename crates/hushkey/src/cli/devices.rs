//! `devices` subcommand: list active capture devices.

use super::{DeviceJson, DevicesOutput, Result};

/// An unavailable audio system lists as no devices rather than failing.
pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let states = match super::open_gateway() {
        Ok(gateway) => gateway.read_mute()?,
        Err(e) => {
            log::warn!("[devices] audio unavailable: {e}");
            vec![]
        }
    };
    let devices: Vec<DeviceJson> = states
        .into_iter()
        .map(|s| DeviceJson {
            name: s.name,
            muted: s.muted,
        })
        .collect();

    if json {
        return super::print_json(&DevicesOutput {
            count: devices.len(),
            devices,
        });
    }

    if devices.is_empty() {
        println!("No active capture devices found.");
        return Ok(());
    }

    println!(
        "Found {} capture device{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        let flag = if dev.muted { "muted" } else { "live" };
        println!("  [{}] {} ({flag})", i + 1, dev.name);
    }

    Ok(())
}
