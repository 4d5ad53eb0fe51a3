//! Linux system tray: GTK event loop, logind lock polling.

use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use hushkey_lib::HushkeyError;
use hushkey_lib::orchestrator::SessionEvent;

use super::shared::{self, PlatformAdapter};
use super::state::Msg;
use crate::RUNNING;

const LOCK_POLL: Duration = Duration::from_secs(1);
const STOP_CHECK: Duration = Duration::from_millis(100);

/// Detect if running under Wayland (the keyboard hook may not see input).
fn is_wayland() -> bool {
    std::env::var("XDG_SESSION_TYPE")
        .map(|v| v.eq_ignore_ascii_case("wayland"))
        .unwrap_or(false)
}

/// `loginctl show-session ... -p LockedHint --value` output.
fn parse_locked_hint(output: &str) -> Option<bool> {
    match output.trim() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Turns sampled lock flags into edge events.
#[derive(Default)]
struct LockTracker {
    locked: Option<bool>,
}

impl LockTracker {
    /// The first sample only sets the baseline.
    fn update(&mut self, locked: bool) -> Option<SessionEvent> {
        let prev = self.locked.replace(locked);
        match (prev, locked) {
            (Some(false), true) => Some(SessionEvent::Locked),
            (Some(true), false) => Some(SessionEvent::Unlocked),
            _ => None,
        }
    }
}

fn query_locked(session: &str) -> Result<bool, String> {
    let out = Command::new("loginctl")
        .args(["show-session", session, "-p", "LockedHint", "--value"])
        .output()
        .map_err(|e| format!("loginctl: {e}"))?;
    if !out.status.success() {
        return Err(format!(
            "loginctl: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    parse_locked_hint(&String::from_utf8_lossy(&out.stdout))
        .ok_or_else(|| "unexpected LockedHint value".to_string())
}

/// Polls logind's LockedHint on a background thread.
pub struct SessionWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    fn start(tx: mpsc::Sender<Msg>) -> Result<Self, String> {
        let session = std::env::var("XDG_SESSION_ID").unwrap_or_else(|_| "self".into());
        // Fail early when logind can't answer for this session
        let initial = query_locked(&session)?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("hushkey-session".into())
            .spawn(move || {
                let mut tracker = LockTracker::default();
                tracker.update(initial);
                'poll: loop {
                    let mut waited = Duration::ZERO;
                    while waited < LOCK_POLL {
                        if stop_flag.load(Ordering::SeqCst) || !RUNNING.load(Ordering::SeqCst) {
                            break 'poll;
                        }
                        std::thread::sleep(STOP_CHECK);
                        waited += STOP_CHECK;
                    }
                    match query_locked(&session) {
                        Ok(locked) => {
                            if let Some(event) = tracker.update(locked) {
                                log::debug!("[session] {event:?}");
                                if tx.send(Msg::Session(event)).is_err() {
                                    break;
                                }
                            }
                        }
                        Err(e) => log::debug!("[session] {e}"),
                    }
                }
                log::debug!("[session] watcher exited");
            })
            .map_err(|e| format!("spawn session thread: {e}"))?;

        Ok(SessionWatcher {
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

pub struct LinuxAdapter;

impl PlatformAdapter for LinuxAdapter {
    type SessionWatcher = SessionWatcher;

    fn platform_init() -> hushkey_lib::error::Result<()> {
        gtk::init().map_err(|e| HushkeyError::Config(format!("Failed to initialize GTK: {e}")))?;
        // Periodic wakeup so `gtk::main_iteration_do(true)` returns at least
        // every 50ms, keeping the event loop responsive to non-GTK events
        // (hotkey triggers, session events, the lighting poll).
        gtk::glib::timeout_add_local(Duration::from_millis(50), || {
            gtk::glib::ControlFlow::Continue
        });
        if is_wayland() {
            log::warn!(
                "Global hotkey may not work on Wayland. \
                 Use the tray menu to toggle mute."
            );
        }
        Ok(())
    }

    fn spawn_session_watcher(tx: mpsc::Sender<Msg>) -> Option<SessionWatcher> {
        match SessionWatcher::start(tx) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("[session] {e}");
                None
            }
        }
    }

    fn pump_events() {
        while gtk::events_pending() {
            gtk::main_iteration_do(false);
        }
    }

    fn wait_for_events() {
        // The 50ms timer registered in platform_init() bounds this block.
        gtk::main_iteration_do(true);
    }
}

pub fn run() -> hushkey_lib::error::Result<()> {
    shared::run_core::<LinuxAdapter>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locked_hint_values() {
        assert_eq!(parse_locked_hint("yes\n"), Some(true));
        assert_eq!(parse_locked_hint("no"), Some(false));
        assert_eq!(parse_locked_hint(""), None);
    }

    #[test]
    fn tracker_reports_edges_only() {
        let mut t = LockTracker::default();
        assert_eq!(t.update(false), None);
        assert_eq!(t.update(false), None);
        assert_eq!(t.update(true), Some(SessionEvent::Locked));
        assert_eq!(t.update(true), None);
        assert_eq!(t.update(false), Some(SessionEvent::Unlocked));
    }

    #[test]
    fn first_sample_locked_is_baseline() {
        let mut t = LockTracker::default();
        assert_eq!(t.update(true), None);
        assert_eq!(t.update(false), Some(SessionEvent::Unlocked));
    }
}
