//! `mute` / `unmute` / `toggle` subcommands: set OS capture mute state.

use serde::Serialize;

use super::{MuteGateway, Result, audio};

pub(super) enum MuteAction {
    Mute,
    Unmute,
    Toggle,
}

#[derive(Serialize)]
struct MuteOutput {
    muted: bool,
    devices: usize,
}

/// Resolve the target state. Toggle unmutes only when every device is muted.
fn target_state(action: MuteAction, gateway: &MuteGateway) -> Result<bool> {
    Ok(match action {
        MuteAction::Mute => true,
        MuteAction::Unmute => false,
        MuteAction::Toggle => !audio::all_muted(&gateway.read_mute()?),
    })
}

/// Set OS mute state. Icon, cue and lighting feedback belong to the tray;
/// the CLI does not duplicate them.
pub(super) fn cmd_set_mute(action: MuteAction, json: bool) -> Result<()> {
    let gateway = super::open_gateway()?;
    let target = target_state(action, &gateway)?;
    let devices = gateway.set_mute(target)?;

    if json {
        return super::print_json(&MuteOutput {
            muted: target,
            devices,
        });
    }
    if devices == 0 {
        println!("No active capture devices.");
    }
    println!("Microphone: {}", if target { "MUTED" } else { "UNMUTED" });
    Ok(())
}
