//! System tray. `shared` owns the event loop; `windows`/`linux` plug in the
//! platform pump and session-lock watcher.

mod shared;
pub(crate) mod state;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(windows)]
mod windows;

use hushkey_lib::HushkeyError;
use single_instance::SingleInstance;

/// AppUserModelID used for toast notifications.
#[cfg(windows)]
pub(super) const AUMID: &str = "Hushkey.Hushkey";

/// Toasts only show a friendly name and icon once the AUMID is registered
/// under `HKCU\SOFTWARE\Classes\AppUserModelId`.
#[cfg(windows)]
fn register_aumid() -> std::io::Result<()> {
    use winreg::RegKey;
    use winreg::enums::HKEY_CURRENT_USER;

    let dir = hushkey_lib::config::Config::dir()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no config dir"))?;
    std::fs::create_dir_all(&dir)?;
    let icon_path = dir.join("icon.png");
    if !icon_path.exists() {
        crate::icon::render(false, 256)
            .save(&icon_path)
            .map_err(std::io::Error::other)?;
    }

    let (key, _) = RegKey::predef(HKEY_CURRENT_USER)
        .create_subkey(format!(r"SOFTWARE\Classes\AppUserModelId\{AUMID}"))?;
    key.set_value("DisplayName", &"Hushkey")?;
    key.set_value("IconUri", &icon_path.to_string_lossy().into_owned())?;
    Ok(())
}

fn notify_already_running() {
    let mut n = notify_rust::Notification::new();
    n.summary("Hushkey").body("Hushkey is already running in the tray.");
    #[cfg(windows)]
    n.app_id(AUMID);
    if let Err(e) = n.show() {
        log::debug!("[tray] notification failed: {e}");
    }
}

/// `None` when another tray already holds the lock.
fn acquire_instance() -> hushkey_lib::error::Result<Option<SingleInstance>> {
    let instance = SingleInstance::new("hushkey")
        .map_err(|e| HushkeyError::Config(format!("instance lock: {e}")))?;
    Ok(instance.is_single().then_some(instance))
}

pub fn run() -> hushkey_lib::error::Result<()> {
    #[cfg(windows)]
    if let Err(e) = register_aumid() {
        log::debug!("[tray] AUMID registration skipped: {e}");
    }

    let Some(_instance) = acquire_instance()? else {
        log::warn!("[tray] another instance is running, exiting");
        notify_already_running();
        return Ok(());
    };

    #[cfg(windows)]
    return windows::run();

    #[cfg(target_os = "linux")]
    return linux::run();
}
