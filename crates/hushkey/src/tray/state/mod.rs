//! Tray-side state shared by the Windows and Linux event loops.
//!
//! Platform-specific event loops live in `windows.rs` / `linux.rs`.
//! This module provides:
//! - [`TrayFeedback`], the icon/cue/notification [`FeedbackSink`]
//! - Menu + tray icon construction (`build_tray_menu`, `build_tray_icon`)
//! - Hotkey registration helpers
//! - Menu event handling (`handle_menu_event`)

mod hotkey;
mod icon;
mod menu;

pub use hotkey::{apply_captured, register_configured};
pub(crate) use menu::show_startup_warnings;
pub use menu::{TrayMenu, build_tray_icon, build_tray_menu};

use hushkey_lib::config::{Config, ConfigStore};
use hushkey_lib::hook::GlobalHook;
use hushkey_lib::orchestrator::{FeedbackSink, MuteOrchestrator, SessionEvent};

use muda::{MenuEvent, MenuItem};
use tray_icon::TrayIcon;

use crate::sound::CuePlayer;

pub type Orchestrator = MuteOrchestrator<TrayFeedback, ConfigStore>;

// ── Messages from background threads ──

pub enum Msg {
    Session(SessionEvent),
}

// ── Feedback sink ──

pub(crate) fn status_text(muted: bool) -> &'static str {
    if muted { "Muted" } else { "Live" }
}

pub(crate) fn tooltip(muted: bool) -> &'static str {
    if muted {
        "Hushkey — Muted"
    } else {
        "Hushkey — Live"
    }
}

/// Icon, status line, cue and optional notification for each transition.
pub struct TrayFeedback {
    tray: TrayIcon,
    status_item: MenuItem,
    cues: CuePlayer,
    notifications: bool,
    /// Last state shown, so repeated applies of the same state don't notify.
    shown: Option<bool>,
}

impl TrayFeedback {
    pub fn new(tray: TrayIcon, status_item: MenuItem, config: &Config) -> Self {
        TrayFeedback {
            tray,
            status_item,
            cues: CuePlayer::new(&config.mute_sound_path, &config.unmute_sound_path),
            notifications: config.notifications_enabled,
            shown: None,
        }
    }
}

impl FeedbackSink for TrayFeedback {
    fn set_icon_state(&mut self, muted: bool) {
        let _ = self.tray.set_icon(icon::icon_for(muted));
        let _ = self.tray.set_tooltip(Some(tooltip(muted)));
        self.status_item.set_text(status_text(muted));

        let changed = self.shown.is_some_and(|prev| prev != muted);
        self.shown = Some(muted);
        if changed && self.notifications {
            menu::show_notification(if muted {
                "Microphone Muted"
            } else {
                "Microphone Live"
            });
        }
    }

    fn play_cue(&mut self, muted: bool) {
        self.cues.play(muted);
    }
}

// ── Menu events ──

/// Handle a menu event from the tray context menu.
///
/// Returns `true` if the event was a quit request.
pub fn handle_menu_event(
    event: &MenuEvent,
    menu: &mut TrayMenu,
    orch: &mut Orchestrator,
    hook: &mut GlobalHook,
) -> bool {
    let id = event.id();
    if id == menu.quit_item.id() {
        return true;
    } else if id == menu.toggle_item.id() {
        orch.toggle();
    } else if id == menu.hotkey_item.id() {
        let current = hook
            .registered()
            .unwrap_or_else(|| orch.settings().config().hotkey_combination());
        if let Some(combo) = crate::capture_dialog::show_capture(hook, current) {
            apply_captured(hook, orch, combo);
            menu.set_hotkey_label(&combo);
        }
    } else if id == menu.sound_item.id() {
        let enabled = !orch.settings().config().play_audio;
        if let Err(e) = orch.set_play_audio(enabled) {
            log::warn!("[config] could not save play_audio: {e}");
        }
        menu.sound_item.set_checked(enabled);
    } else if id == menu.connect_item.id() {
        if let Err(e) = orch.toggle_lighting_connection() {
            menu::show_notification(&format!("Lighting: {e}"));
        }
        menu.sync_lighting(orch);
    } else if let Some(name) = menu.unmuted_profiles.profile_for(id) {
        if let Err(e) = orch.set_profile_for_state(false, &name) {
            log::warn!("[config] could not save unmuted_profile: {e}");
        }
        menu.sync_lighting(orch);
    } else if let Some(name) = menu.muted_profiles.profile_for(id) {
        if let Err(e) = orch.set_profile_for_state(true, &name) {
            log::warn!("[config] could not save muted_profile: {e}");
        }
        menu.sync_lighting(orch);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_tooltip_follow_state() {
        assert_eq!(status_text(true), "Muted");
        assert_eq!(status_text(false), "Live");
        assert!(tooltip(true).ends_with("Muted"));
        assert!(tooltip(false).ends_with("Live"));
    }
}
