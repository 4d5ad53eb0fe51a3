//! `profiles` / `profile` subcommands: OpenRGB profile listing and loading.

use std::path::Path;

use super::{ProfilesOutput, Result};

pub(super) fn cmd_profiles(json: bool, config_path: Option<&Path>) -> Result<()> {
    let (config, _, _) = super::load_config(config_path);
    let mut client = super::lighting_client(&config);
    client.connect()?;
    let profiles = client.list_profiles()?;
    client.disconnect();

    if json {
        return super::print_json(&ProfilesOutput {
            address: config.lighting_address(),
            profiles,
            muted_profile: config.muted_profile,
            unmuted_profile: config.unmuted_profile,
        });
    }

    if profiles.is_empty() {
        println!("No profiles saved on {}.", config.lighting_address());
        return Ok(());
    }

    println!("Profiles on {}:", config.lighting_address());
    println!();
    for name in &profiles {
        let mut roles = Vec::new();
        if *name == config.muted_profile {
            roles.push("muted");
        }
        if *name == config.unmuted_profile {
            roles.push("unmuted");
        }
        if roles.is_empty() {
            println!("  {name}");
        } else {
            println!("  {name} ({})", roles.join(", "));
        }
    }
    Ok(())
}

pub(super) fn cmd_load_profile(name: &str, config_path: Option<&Path>) -> Result<()> {
    let (config, _, _) = super::load_config(config_path);
    let mut client = super::lighting_client(&config);
    client.connect()?;
    client.select_profile(name)?;
    client.disconnect();
    println!("Loaded profile: {name}");
    Ok(())
}
