//! `hotkey` subcommand: parse a hotkey string, optionally save it.

use std::path::Path;

use hushkey_lib::HushkeyError;
use hushkey_lib::hotkey::{self, KeyCombination};

use super::{HotkeyOutput, Result, kv, kv_width};

/// Lenient parse for display; `valid` reflects the strict parse.
fn describe(text: &str) -> HotkeyOutput {
    let (combo, warning) = hotkey::parse_with_warning(text);
    HotkeyOutput {
        input: text.to_string(),
        canonical: combo.to_string(),
        valid: warning.is_none(),
        warning: warning.map(|w| w.to_string()),
    }
}

/// Persist `combo` as the configured hotkey.
pub(super) fn save_hotkey(combo: &KeyCombination, config_path: Option<&Path>) -> Result<()> {
    let (mut config, path, _) = super::load_config(config_path);
    let path =
        path.ok_or_else(|| HushkeyError::Config("could not determine config directory".into()))?;
    config.hotkey = combo.to_string();
    config.save_to(&path)?;
    log::info!("[config] hotkey saved to {}", path.display());
    Ok(())
}

pub(super) fn cmd_hotkey(
    text: &str,
    save: bool,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    if save {
        // Strict: never persist a fallback
        let combo: KeyCombination = text.parse()?;
        save_hotkey(&combo, config_path)?;
    }

    let output = describe(text);
    if json {
        return super::print_json(&output);
    }

    let w = kv_width(&["Input:", "Canonical:", "Status:"], &[]);
    kv("Input:", &output.input, w);
    kv("Canonical:", &output.canonical, w);
    match &output.warning {
        Some(warning) => kv("Status:", warning, w),
        None if save => kv("Status:", "valid (saved)", w),
        None => kv("Status:", "valid", w),
    }
    Ok(())
}
