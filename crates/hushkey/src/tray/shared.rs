//! Shared tray event loop. Platform-specific behavior is injected via the
//! [`PlatformAdapter`] trait.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

use hushkey_lib::audio::{self, MuteGateway};
use hushkey_lib::config::{Config, ConfigStore, MAX_SOUND_FILE_BYTES};
use hushkey_lib::hook::{self, GlobalHook, HookEvent};
use hushkey_lib::lighting::{LightingClient, openrgb::OpenRgbConnector};
use hushkey_lib::orchestrator::MuteOrchestrator;

use muda::MenuEvent;
use tray_icon::{MouseButton, MouseButtonState, TrayIconEvent};

use super::state::{self, Msg, Orchestrator, TrayFeedback};
use crate::RUNNING;

/// Platform-specific hooks that differ between Windows and Linux.
///
/// Each platform implements this trait once; `run_core` provides the
/// shared event loop, config load, hook install, menu build, etc.
pub trait PlatformAdapter {
    /// Owns the session watcher thread; dropping it stops the watcher.
    type SessionWatcher;

    /// One-time platform init (GTK, COM, etc.). Called before anything else.
    fn platform_init() -> hushkey_lib::error::Result<()>;

    /// Start delivering `Msg::Session` lock/unlock events over `tx`.
    /// Returns `None` if session notifications are unavailable.
    fn spawn_session_watcher(tx: mpsc::Sender<Msg>) -> Option<Self::SessionWatcher>;

    /// Pump platform-specific events (Win32 messages, GTK iterations).
    fn pump_events();

    /// Block until the next platform event or a reasonable timeout.
    fn wait_for_events();
}

/// Load settings, collecting parse warnings and validation errors.
fn load_settings() -> (ConfigStore, Vec<String>) {
    let (store, mut warnings) = match Config::path() {
        Some(path) => ConfigStore::load_from(&path),
        None => {
            log::warn!("[config] no config directory, settings will not persist");
            (ConfigStore::in_memory(Config::default()), vec![])
        }
    };
    if let Err(errors) = store.config().validate(MAX_SOUND_FILE_BYTES) {
        warnings.extend(errors.iter().map(ToString::to_string));
    }
    for w in &warnings {
        log::warn!("[config] {w}");
    }
    (store, warnings)
}

/// Startup state comes from settings alone; devices are then forced to it.
fn initial_muted(config: &Config) -> bool {
    config.start_muted
}

/// A failed install degrades to a detached hook plus a user-facing warning.
fn hook_or_detached(installed: hook::Result<GlobalHook>) -> (GlobalHook, Option<String>) {
    match installed {
        Ok(hook) => (hook, None),
        Err(e) => {
            log::error!("[hook] {e}; hotkey disabled, use the tray menu");
            (
                GlobalHook::detached(),
                Some(format!("Global hotkey unavailable: {e}")),
            )
        }
    }
}

/// Install the keyboard hook. Without it the tray still works from the menu.
fn install_hook() -> GlobalHook {
    let (hook, warning) = hook_or_detached(GlobalHook::install());
    if let Some(warning) = warning {
        state::show_startup_warnings(&[warning]);
    }
    hook
}

/// Shared tray event loop.
///
/// Handles config load, hook install, gateway open, menu/icon build,
/// session watcher spawn, and the main event loop. Platform-specific
/// bits are injected via `P: PlatformAdapter`.
pub fn run_core<P: PlatformAdapter>() -> hushkey_lib::error::Result<()> {
    P::platform_init()?;

    let (store, warnings) = load_settings();
    let config = store.config().clone();
    state::show_startup_warnings(&warnings);

    let mut hook = install_hook();
    state::register_configured(&mut hook, &config.hotkey);

    let gateway = MuteGateway::new(audio::platform_directory()?);
    let muted = initial_muted(&config);

    // Build tray menu and icon
    let (menu, mut tray_menu) = state::build_tray_menu(&config, muted);
    let tray = state::build_tray_icon(muted, menu)?;
    let feedback = TrayFeedback::new(tray, tray_menu.status_item.clone(), &config);

    let lighting = LightingClient::new(
        Box::new(OpenRgbConnector::new(config.lighting_address())),
        config.connect_timeout(),
        config.poll_interval(),
    );
    let mut orch: Orchestrator = MuteOrchestrator::new(muted, gateway, lighting, feedback, store)
        .with_repeat_guard(config.repeat_guard());

    if config.lighting_autoconnect
        && let Err(e) = orch.connect_lighting()
    {
        log::info!("[lighting] autoconnect skipped: {e}");
    }
    orch.apply_current();
    tray_menu.sync_lighting(&mut orch);

    // Channel for background → main thread communication
    let (tx, rx): (mpsc::Sender<Msg>, Receiver<Msg>) = mpsc::channel();
    let watcher = P::spawn_session_watcher(tx);
    if watcher.is_none() {
        log::warn!("[session] lock notifications unavailable");
    }

    let menu_rx = MenuEvent::receiver();
    let tray_rx = TrayIconEvent::receiver();
    let mut lighting_state = orch.lighting_state();

    loop {
        if !RUNNING.load(Ordering::SeqCst) {
            break;
        }

        // 1. Platform event pump
        P::pump_events();

        // 2. Hotkey triggers
        while let Some(HookEvent::Triggered(_)) = hook.try_next() {
            orch.on_hotkey(Instant::now());
        }

        // 3. Session lock/unlock; Win+L loses the Win key-up
        while let Ok(Msg::Session(event)) = rx.try_recv() {
            hook.reset_modifiers();
            orch.on_session_event(event);
        }

        // 4. Menu events
        while let Ok(event) = menu_rx.try_recv() {
            if state::handle_menu_event(&event, &mut tray_menu, &mut orch, &mut hook) {
                RUNNING.store(false, Ordering::SeqCst);
                break;
            }
        }

        // 5. Left click on the icon toggles
        while let Ok(event) = tray_rx.try_recv() {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                orch.toggle();
            }
        }

        // 6. Liveness poll; keep the OpenRGB submenu in step with the link
        orch.tick(Instant::now());
        if orch.lighting_state() != lighting_state {
            tray_menu.sync_lighting(&mut orch);
            lighting_state = orch.lighting_state();
        }

        // 7. Wait for events (platform-specific sleep/block)
        P::wait_for_events();
    }

    RUNNING.store(false, Ordering::SeqCst);
    drop(watcher);
    orch.disconnect_lighting();
    log::info!("[tray] exiting");
    Ok(())
}
