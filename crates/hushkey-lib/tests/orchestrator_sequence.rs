//! Integration tests: hook triggers driving the orchestrator end to end.
//!
//! These wire a detached hook, the stub capture directory, the stub lighting
//! server and a recording feedback sink together through the public API, the
//! same way the tray's event loop does.

use std::time::{Duration, Instant};

use hushkey_lib::audio::MuteGateway;
use hushkey_lib::audio::stub::StubDirectory;
use hushkey_lib::config::{Config, ConfigStore, SettingsStore};
use hushkey_lib::hook::{GlobalHook, HookEvent, InputKey, KeyEvent, Side};
use hushkey_lib::hotkey::{self, Key, KeyCombination, Modifier};
use hushkey_lib::lighting::stub::StubServer;
use hushkey_lib::lighting::{ConnectionState, LightingClient};
use hushkey_lib::orchestrator::stub::{Feedback, RecordingFeedback};
use hushkey_lib::orchestrator::{MuteOrchestrator, SessionEvent};

type Orchestrator = MuteOrchestrator<RecordingFeedback, ConfigStore>;

struct Rig {
    hook: GlobalHook,
    orch: Orchestrator,
    devices: StubDirectory,
    server: StubServer,
}

fn rig(config: Config) -> Rig {
    let devices = StubDirectory::with_devices(&["Headset", "Webcam"]);
    let server = StubServer::with_profiles(&["Default", "Muted"]);
    let mut hook = GlobalHook::detached();
    hook.register(config.hotkey_combination());
    let lighting = LightingClient::new(
        Box::new(server.connector()),
        config.connect_timeout(),
        config.poll_interval(),
    );
    let start_muted = config.start_muted;
    let guard = config.repeat_guard();
    let orch = MuteOrchestrator::new(
        start_muted,
        MuteGateway::new(Box::new(devices.clone())),
        lighting,
        RecordingFeedback::default(),
        ConfigStore::in_memory(config),
    )
    .with_repeat_guard(guard);
    Rig {
        hook,
        orch,
        devices,
        server,
    }
}

fn modifier(m: Modifier) -> InputKey {
    InputKey::Modifier(m, Side::Left)
}

fn press(hook: &GlobalHook, combo: &KeyCombination) {
    for m in combo.modifiers.iter() {
        hook.inject(KeyEvent::Down(modifier(m)));
    }
    hook.inject(KeyEvent::Down(InputKey::Key(combo.key)));
    hook.inject(KeyEvent::Up(InputKey::Key(combo.key)));
    for m in combo.modifiers.iter() {
        hook.inject(KeyEvent::Up(modifier(m)));
    }
}

/// Drain hook events into the orchestrator, as the tray loop does.
fn pump(rig: &mut Rig, now: Instant) -> usize {
    let mut toggles = 0;
    while let Some(HookEvent::Triggered(_)) = rig.hook.try_next() {
        if rig.orch.on_hotkey(now).is_some() {
            toggles += 1;
        }
    }
    toggles
}

/// Deliver a session event the way the tray loop does.
fn session(rig: &mut Rig, event: SessionEvent) {
    rig.hook.reset_modifiers();
    rig.orch.on_session_event(event);
}

#[test]
fn hotkey_press_toggles_devices_and_icon() {
    let mut r = rig(Config::default());
    press(&r.hook, &hotkey::DEFAULT_HOTKEY);
    assert_eq!(pump(&mut r, Instant::now()), 1);
    assert!(r.orch.is_muted());
    assert_eq!(r.devices.flags(), vec![true, true]);
    assert_eq!(
        r.orch.feedback().events,
        vec![Feedback::Icon(true), Feedback::Cue(true)]
    );
}

#[test]
fn wrong_modifiers_do_nothing() {
    let mut r = rig(Config::default());
    press(&r.hook, &KeyCombination::new(Modifier::Ctrl, Key::Letter('N')));
    press(
        &r.hook,
        &KeyCombination::new(
            Modifier::Ctrl | Modifier::Alt | Modifier::Shift,
            Key::Letter('N'),
        ),
    );
    assert_eq!(pump(&mut r, Instant::now()), 0);
    assert!(!r.orch.is_muted());
    assert!(r.orch.feedback().events.is_empty());
}

#[test]
fn malformed_configured_hotkey_falls_back_to_default() {
    let config = Config {
        hotkey: "Ctrl+Alt+Banana".into(),
        ..Config::default()
    };
    let mut r = rig(config);
    assert_eq!(r.hook.registered(), Some(hotkey::DEFAULT_HOTKEY));
    press(&r.hook, &hotkey::DEFAULT_HOTKEY);
    assert_eq!(pump(&mut r, Instant::now()), 1);
}

#[test]
fn captured_hotkey_replaces_old_one() {
    let mut r = rig(Config::default());

    let session = r.hook.begin_capture();
    let new_combo = KeyCombination::new(Modifier::Ctrl | Modifier::Shift, Key::Function(9));
    press(&r.hook, &new_combo);
    let captured = session.confirm().unwrap();
    drop(session);
    assert_eq!(captured, new_combo);
    // Capturing never toggles
    assert_eq!(pump(&mut r, Instant::now()), 0);

    r.orch.set_hotkey(&captured).unwrap();
    r.hook.register(captured);
    assert_eq!(r.orch.settings().hotkey_string(), "Ctrl+Shift+F9");

    press(&r.hook, &hotkey::DEFAULT_HOTKEY);
    assert_eq!(pump(&mut r, Instant::now()), 0);
    press(&r.hook, &new_combo);
    assert_eq!(pump(&mut r, Instant::now()), 1);
}

#[test]
fn held_hotkey_toggles_once_within_guard() {
    let mut r = rig(Config::default());
    for m in [Modifier::Ctrl, Modifier::Alt] {
        r.hook.inject(KeyEvent::Down(modifier(m)));
    }
    for _ in 0..5 {
        r.hook.inject(KeyEvent::Down(InputKey::Key(Key::Letter('N'))));
    }
    let t0 = Instant::now();
    assert_eq!(pump(&mut r, t0), 1);
    assert!(r.orch.is_muted());
}

#[test]
fn lock_then_unlock_with_lighting() {
    let mut r = rig(Config::default());
    r.orch.connect_lighting().unwrap();
    assert_eq!(r.server.loaded(), vec!["Default"]);

    r.orch.on_session_event(SessionEvent::Locked);
    assert!(r.orch.is_muted());
    assert_eq!(r.devices.flags(), vec![true, true]);
    assert_eq!(r.orch.feedback().cues(), 0);
    assert_eq!(r.server.loaded(), vec!["Default"]);

    r.orch.on_session_event(SessionEvent::Unlocked);
    assert!(r.orch.is_muted());
    assert_eq!(r.server.loaded(), vec!["Default", "Muted"]);
}

#[test]
fn poll_failure_then_explicit_reconnect() {
    let mut r = rig(Config::default());
    r.orch.connect_lighting().unwrap();

    r.server.set_alive(false);
    let due = r.orch.next_poll().unwrap();
    r.orch.tick(due);
    assert_eq!(r.orch.lighting_state(), ConnectionState::Disconnected);
    assert_eq!(r.orch.next_poll(), None);

    // Toggling while disconnected still works, without lighting
    r.orch.toggle();
    assert!(r.orch.is_muted());

    r.server.set_alive(true);
    r.orch.tick(due + Duration::from_secs(10));
    assert_eq!(r.server.connect_attempts(), 1);

    r.orch.connect_lighting().unwrap();
    assert_eq!(r.server.connect_attempts(), 2);
    assert_eq!(r.server.loaded().last().map(String::as_str), Some("Muted"));
}

#[test]
fn start_muted_applies_without_cue() {
    let config = Config {
        start_muted: true,
        ..Config::default()
    };
    let mut r = rig(config);
    let t = r.orch.apply_current();
    assert!(t.muted);
    assert_eq!(r.devices.flags(), vec![true, true]);
    assert_eq!(r.orch.feedback().events, vec![Feedback::Icon(true)]);
}

#[test]
fn muted_devices_at_startup_are_unmuted() {
    let mut r = rig(Config::default());
    MuteGateway::new(Box::new(r.devices.clone()))
        .set_mute(true)
        .unwrap();
    assert_eq!(r.devices.flags(), vec![true, true]);

    assert!(!r.orch.is_muted());
    let t = r.orch.apply_current();
    assert!(!t.muted);
    assert_eq!(r.devices.flags(), vec![false, false]);
    assert_eq!(r.orch.feedback().events, vec![Feedback::Icon(false)]);
}

#[test]
fn hotkey_works_after_win_l_lock_and_unlock() {
    let mut r = rig(Config::default());
    let win = modifier(Modifier::Win);
    r.hook.inject(KeyEvent::Down(win));
    r.hook.inject(KeyEvent::Down(InputKey::Key(Key::Letter('L'))));
    session(&mut r, SessionEvent::Locked);
    // Win key-up is swallowed by the lock screen.
    session(&mut r, SessionEvent::Unlocked);
    assert!(r.orch.is_muted());

    press(&r.hook, &hotkey::DEFAULT_HOTKEY);
    assert_eq!(pump(&mut r, Instant::now()), 1);
    assert!(!r.orch.is_muted());
}
