//! Windows system tray: Win32 message loop, WTS session notifications.

use std::cell::RefCell;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread::JoinHandle;

use hushkey_lib::audio;
use hushkey_lib::orchestrator::SessionEvent;

use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::RemoteDesktop::{
    NOTIFY_FOR_THIS_SESSION, WTSRegisterSessionNotification, WTSUnRegisterSessionNotification,
};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, HWND_MESSAGE,
    MSG, MsgWaitForMultipleObjects, PM_REMOVE, PeekMessageW, PostThreadMessageW, QS_ALLINPUT,
    RegisterClassW, TranslateMessage, WINDOW_EX_STYLE, WINDOW_STYLE, WM_QUIT,
    WM_WTSSESSION_CHANGE, WNDCLASSW, WTS_SESSION_LOCK, WTS_SESSION_UNLOCK,
};
use windows::core::w;

use super::shared::{self, PlatformAdapter};
use super::state::Msg;
use crate::RUNNING;

/// Pump all pending Win32 messages. Required for tray-icon to receive its
/// internal window messages on Windows.
fn pump_messages() {
    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            if msg.message == WM_QUIT {
                RUNNING.store(false, Ordering::SeqCst);
                return;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

// ── Session watcher ──

thread_local! {
    static SESSION_TX: RefCell<Option<mpsc::Sender<Msg>>> = const { RefCell::new(None) };
}

fn session_event(wparam: WPARAM) -> Option<SessionEvent> {
    match wparam.0 as u32 {
        WTS_SESSION_LOCK => Some(SessionEvent::Locked),
        WTS_SESSION_UNLOCK => Some(SessionEvent::Unlocked),
        _ => None,
    }
}

unsafe extern "system" fn session_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_WTSSESSION_CHANGE
        && let Some(event) = session_event(wparam)
    {
        log::debug!("[session] {event:?}");
        SESSION_TX.with(|tx| {
            if let Some(tx) = tx.borrow().as_ref() {
                let _ = tx.send(Msg::Session(event));
            }
        });
        return LRESULT(0);
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

/// Message-only window registered for WTS notifications on its own thread.
pub struct SessionWatcher {
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    fn start(tx: mpsc::Sender<Msg>) -> Result<Self, String> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let thread = std::thread::Builder::new()
            .name("hushkey-session".into())
            .spawn(move || {
                SESSION_TX.with(|slot| *slot.borrow_mut() = Some(tx));

                let hwnd = unsafe {
                    let module = match GetModuleHandleW(None) {
                        Ok(m) => m,
                        Err(e) => {
                            let _ = ready_tx.send(Err(format!("GetModuleHandleW: {e}")));
                            return;
                        }
                    };
                    let class = WNDCLASSW {
                        lpfnWndProc: Some(session_wndproc),
                        hInstance: HINSTANCE(module.0),
                        lpszClassName: w!("HushkeySessionWatcher"),
                        ..Default::default()
                    };
                    RegisterClassW(&class);
                    CreateWindowExW(
                        WINDOW_EX_STYLE(0),
                        w!("HushkeySessionWatcher"),
                        w!("Hushkey"),
                        WINDOW_STYLE(0),
                        0,
                        0,
                        0,
                        0,
                        Some(HWND_MESSAGE),
                        None,
                        Some(HINSTANCE(module.0)),
                        None,
                    )
                };
                let hwnd = match hwnd {
                    Ok(h) => h,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("CreateWindowExW: {e}")));
                        return;
                    }
                };
                if let Err(e) = unsafe { WTSRegisterSessionNotification(hwnd, NOTIFY_FOR_THIS_SESSION) } {
                    let _ = ready_tx.send(Err(format!("WTSRegisterSessionNotification: {e}")));
                    let _ = unsafe { DestroyWindow(hwnd) };
                    return;
                }
                let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));

                let mut msg = MSG::default();
                unsafe {
                    while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                    let _ = WTSUnRegisterSessionNotification(hwnd);
                    let _ = DestroyWindow(hwnd);
                }
                log::debug!("[session] watcher exited");
            })
            .map_err(|e| format!("spawn session thread: {e}"))?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| "session thread exited".to_string())??;
        Ok(SessionWatcher {
            thread_id,
            thread: Some(thread),
        })
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

pub struct WindowsAdapter;

impl PlatformAdapter for WindowsAdapter {
    type SessionWatcher = SessionWatcher;

    fn platform_init() -> hushkey_lib::error::Result<()> {
        audio::com_init()?;
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
        pump_messages();
    }

    fn wait_for_events() {
        unsafe {
            MsgWaitForMultipleObjects(None, false, 50, QS_ALLINPUT);
        }
    }
}

pub fn run() -> hushkey_lib::error::Result<()> {
    shared::run_core::<WindowsAdapter>()
}
