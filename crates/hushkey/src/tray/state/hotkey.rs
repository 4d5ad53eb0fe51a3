//! Hotkey registration against the global hook.

use hushkey_lib::config::SettingsStore;
use hushkey_lib::hook::GlobalHook;
use hushkey_lib::hotkey::{self, KeyCombination};
use hushkey_lib::orchestrator::{FeedbackSink, MuteOrchestrator};

/// Register the configured hotkey. A malformed string falls back to the
/// default combination with a warning.
pub fn register_configured(hook: &mut GlobalHook, hotkey_str: &str) -> KeyCombination {
    let (combo, warning) = hotkey::parse_with_warning(hotkey_str);
    if let Some(w) = warning {
        log::warn!("[config] {w}");
    }
    hook.register(combo);
    combo
}

/// Persist a captured combination and make it the live hotkey.
///
/// Registration happens even if saving fails, so the new key works for
/// this session.
pub fn apply_captured<F: FeedbackSink, S: SettingsStore>(
    hook: &mut GlobalHook,
    orch: &mut MuteOrchestrator<F, S>,
    combo: KeyCombination,
) {
    if let Err(e) = orch.set_hotkey(&combo) {
        log::warn!("[config] could not save hotkey: {e}");
    }
    hook.register(combo);
}
