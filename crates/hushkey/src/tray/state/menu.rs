//! Tray menu construction, notifications, and lighting submenu sync.

use hushkey_lib::config::{Config, SettingsStore};
use hushkey_lib::hotkey::KeyCombination;
use hushkey_lib::lighting::ConnectionState;

use muda::{CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu};

use super::icon::icon_for;
use super::{Orchestrator, status_text, tooltip};

fn toggle_label(combo: &KeyCombination) -> String {
    format!("Toggle Mute\t{combo}")
}

fn placeholder_text(connected: bool) -> &'static str {
    if connected {
        "(no profiles)"
    } else {
        "(not connected)"
    }
}

// ── Profile check lists ──

/// A submenu listing server profiles with the selected one checked.
pub struct ProfileList {
    submenu: Submenu,
    placeholder: MenuItem,
    items: Vec<(String, CheckMenuItem)>,
}

impl ProfileList {
    fn new(title: &str) -> Self {
        let submenu = Submenu::new(title, true);
        let placeholder = MenuItem::new(placeholder_text(false), false, None);
        let _ = submenu.append(&placeholder);
        ProfileList {
            submenu,
            placeholder,
            items: Vec::new(),
        }
    }

    /// Replace the entries with `profiles`, checking `selected`.
    fn rebuild(&mut self, profiles: &[String], selected: &str, connected: bool) {
        for (_, item) in self.items.drain(..) {
            let _ = self.submenu.remove(&item);
        }
        let _ = self.submenu.remove(&self.placeholder);

        if profiles.is_empty() {
            self.placeholder.set_text(placeholder_text(connected));
            let _ = self.submenu.append(&self.placeholder);
            return;
        }
        for name in profiles {
            let item = CheckMenuItem::new(name, true, name == selected, None);
            let _ = self.submenu.append(&item);
            self.items.push((name.clone(), item));
        }
    }

    /// Profile name behind a menu id, if it belongs to this list.
    pub fn profile_for(&self, id: &MenuId) -> Option<String> {
        self.items
            .iter()
            .find(|(_, item)| item.id() == id)
            .map(|(name, _)| name.clone())
    }
}

// ── Shared menu construction ──

/// All menu items the tray uses, returned from `build_tray_menu`.
pub struct TrayMenu {
    pub status_item: MenuItem,
    pub toggle_item: MenuItem,
    pub hotkey_item: MenuItem,
    pub sound_item: CheckMenuItem,
    pub connect_item: CheckMenuItem,
    pub unmuted_profiles: ProfileList,
    pub muted_profiles: ProfileList,
    pub quit_item: MenuItem,
}

impl TrayMenu {
    pub fn set_hotkey_label(&self, combo: &KeyCombination) {
        self.toggle_item.set_text(toggle_label(combo));
    }

    /// Refresh the OpenRGB submenu from the current connection and settings.
    pub fn sync_lighting(&mut self, orch: &mut Orchestrator) {
        let connected = orch.lighting_state() == ConnectionState::Connected;
        let profiles = if connected {
            orch.lighting_profiles().unwrap_or_else(|e| {
                log::warn!("[lighting] could not list profiles: {e}");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        // Listing can drop the link
        let connected = orch.lighting_state() == ConnectionState::Connected;
        self.connect_item.set_checked(connected);

        let settings = orch.settings();
        self.unmuted_profiles
            .rebuild(&profiles, settings.profile_for_state(false), connected);
        self.muted_profiles
            .rebuild(&profiles, settings.profile_for_state(true), connected);
    }
}

/// Build the tray context menu with all standard items.
pub fn build_tray_menu(config: &Config, initial_muted: bool) -> (Menu, TrayMenu) {
    let menu = Menu::new();
    let status_item = MenuItem::new(status_text(initial_muted), false, None);
    let toggle_item = MenuItem::new(toggle_label(&config.hotkey_combination()), true, None);
    let hotkey_item = MenuItem::new("Set Hotkey...", true, None);
    let sound_item = CheckMenuItem::new("Play Sounds", true, config.play_audio, None);

    let lighting_menu = Submenu::new("OpenRGB", true);
    let connect_item = CheckMenuItem::new("Connect", true, false, None);
    let unmuted_profiles = ProfileList::new("Unmuted Profile");
    let muted_profiles = ProfileList::new("Muted Profile");
    let _ = lighting_menu.append(&connect_item);
    let _ = lighting_menu.append(&PredefinedMenuItem::separator());
    let _ = lighting_menu.append(&unmuted_profiles.submenu);
    let _ = lighting_menu.append(&muted_profiles.submenu);

    let quit_item = MenuItem::new("Quit", true, None);

    let _ = menu.append(&status_item);
    let _ = menu.append(&PredefinedMenuItem::separator());
    let _ = menu.append(&toggle_item);
    let _ = menu.append(&hotkey_item);
    let _ = menu.append(&sound_item);
    let _ = menu.append(&PredefinedMenuItem::separator());
    let _ = menu.append(&lighting_menu);
    let _ = menu.append(&PredefinedMenuItem::separator());
    let _ = menu.append(&quit_item);

    (
        menu,
        TrayMenu {
            status_item,
            toggle_item,
            hotkey_item,
            sound_item,
            connect_item,
            unmuted_profiles,
            muted_profiles,
            quit_item,
        },
    )
}

/// Build the tray icon with the correct initial state.
///
/// The context menu opens on right click only; left click toggles mute.
pub fn build_tray_icon(
    initial_muted: bool,
    menu: Menu,
) -> hushkey_lib::error::Result<tray_icon::TrayIcon> {
    let mut builder = tray_icon::TrayIconBuilder::new()
        .with_tooltip(tooltip(initial_muted))
        .with_menu(Box::new(menu))
        .with_menu_on_left_click(false);
    if let Some(icon) = icon_for(initial_muted) {
        builder = builder.with_icon(icon);
    }
    builder.build().map_err(|e| {
        hushkey_lib::HushkeyError::Config(format!("Failed to create tray icon: {e}"))
    })
}

/// Show startup warnings as a desktop notification.
///
/// Always shown regardless of `notifications_enabled`: if the config is broken,
/// that flag itself may be wrong.
pub(crate) fn show_startup_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    let body = warnings.join("\n");
    show_notification(&format!("Config warnings:\n{body}"));
}

/// Show a desktop notification with the given body text.
pub(super) fn show_notification(body: &str) {
    let mut n = notify_rust::Notification::new();
    #[cfg(windows)]
    n.app_id(crate::tray::AUMID);
    #[cfg(target_os = "linux")]
    n.summary("Hushkey");
    n.body(body);
    let _ = n.show();
}

#[cfg(test)]
mod tests {
    use super::*;
    use hushkey_lib::hotkey::{Key, Modifier};

    #[test]
    fn toggle_label_shows_accelerator() {
        let combo = KeyCombination::new(Modifier::Ctrl | Modifier::Alt, Key::letter('N').unwrap());
        assert_eq!(toggle_label(&combo), "Toggle Mute\tCtrl+Alt+N");
    }

    #[test]
    fn placeholder_reflects_connection() {
        assert_eq!(placeholder_text(false), "(not connected)");
        assert_eq!(placeholder_text(true), "(no profiles)");
    }
}
