//! Global keyboard hook: exact-match hotkey triggers and interactive capture.
//!
//! A platform backend runs the OS filter on its own thread and hands every
//! key event, translated into a [`KeyEvent`], to a shared [`Dispatcher`].
//! The dispatcher tracks held modifiers, compares each key-down against the
//! single registered [`KeyCombination`], and sends a [`HookEvent`] over a
//! channel. It never blocks and never does I/O.
//!
//! | Backend | Mechanism |
//! |---------|-----------|
//! | Windows | `WH_KEYBOARD_LL` + message loop; always calls `CallNextHookEx` |
//! | other   | `rdev::listen` passive listener (installed once per process) |

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::hotkey::{Key, KeyCombination, Modifier, ModifierSet};

#[derive(Debug)]
pub enum HookError {
    /// The OS filter could not be installed.
    InstallFailed(String),
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::InstallFailed(e) => write!(f, "Keyboard hook install failed: {e}"),
        }
    }
}

impl std::error::Error for HookError {}

pub type Result<T> = std::result::Result<T, HookError>;

/// Why a captured combination can't become the new hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    /// No non-modifier key has been pressed yet.
    NoKey,
    /// The combination has no modifier held.
    NoModifier,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoKey => write!(f, "press a key combination first"),
            CaptureError::NoModifier => {
                write!(f, "hotkey must include at least one modifier (Ctrl, Alt, Shift, Win)")
            }
        }
    }
}

impl std::error::Error for CaptureError {}

// ── Typed key events ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// One physical key as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKey {
    Modifier(Modifier, Side),
    Key(Key),
    /// A key with no [`Key`] identity (media keys, IME keys, ...).
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down(InputKey),
    Up(InputKey),
}

/// Identifies one registration. A fresh handle is issued on every `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// The registered combination was pressed.
    Triggered(HotkeyHandle),
}

/// Live state of an interactive capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Only modifiers are held so far.
    Modifiers(ModifierSet),
    /// A key was pressed with the given modifiers.
    Combination(KeyCombination),
}

impl CaptureState {
    /// Text shown while capturing, e.g. `"Ctrl+Alt+…"` or `"Ctrl+Alt+M"`.
    pub fn label(&self) -> String {
        match self {
            CaptureState::Idle => String::new(),
            CaptureState::Modifiers(set) => format!("{set}+…"),
            CaptureState::Combination(c) => c.to_string(),
        }
    }
}

/// Left/right-aware set of held modifier keys.
#[derive(Debug, Clone, Copy, Default)]
struct HeldModifiers(u8);

impl HeldModifiers {
    fn bit(m: Modifier, side: Side) -> u8 {
        let idx = Modifier::ALL.iter().position(|x| *x == m).unwrap_or(0) as u8;
        1 << (idx * 2 + if side == Side::Right { 1 } else { 0 })
    }

    fn press(&mut self, m: Modifier, side: Side) {
        self.0 |= Self::bit(m, side);
    }

    fn release(&mut self, m: Modifier, side: Side) {
        self.0 &= !Self::bit(m, side);
    }

    fn set(self) -> ModifierSet {
        Modifier::ALL
            .into_iter()
            .filter(|m| self.0 & (Self::bit(*m, Side::Left) | Self::bit(*m, Side::Right)) != 0)
            .collect()
    }
}

// ── Dispatcher ──

/// Safe matching core shared between a backend thread and [`GlobalHook`].
pub struct Dispatcher {
    held: HeldModifiers,
    registration: Option<(HotkeyHandle, KeyCombination)>,
    capture: Option<CaptureState>,
    tx: Sender<HookEvent>,
}

impl Dispatcher {
    fn new(tx: Sender<HookEvent>) -> Self {
        Dispatcher {
            held: HeldModifiers::default(),
            registration: None,
            capture: None,
            tx,
        }
    }

    /// Replace the held set with a fresh reading of the physical keys.
    ///
    /// Backends that can poll key state call this before matching, so a
    /// key-up swallowed by the OS (Win+L on the lock screen) can't leave a
    /// modifier stuck.
    pub fn resync_modifiers(&mut self, held: impl IntoIterator<Item = (Modifier, Side)>) {
        let mut fresh = HeldModifiers::default();
        for (m, side) in held {
            fresh.press(m, side);
        }
        self.held = fresh;
    }

    fn clear_modifiers(&mut self) {
        self.held = HeldModifiers::default();
        if let Some(capture) = self.capture.as_mut()
            && matches!(capture, CaptureState::Modifiers(_))
        {
            *capture = CaptureState::Idle;
        }
    }

    /// Process one key event. Called from the backend thread.
    pub fn handle(&mut self, event: KeyEvent) {
        match event {
            KeyEvent::Down(InputKey::Modifier(m, side)) => {
                self.held.press(m, side);
                if let Some(capture) = self.capture.as_mut() {
                    *capture = CaptureState::Modifiers(self.held.set());
                }
            }
            KeyEvent::Up(InputKey::Modifier(m, side)) => {
                self.held.release(m, side);
                if let Some(capture) = self.capture.as_mut()
                    && matches!(capture, CaptureState::Modifiers(_))
                {
                    let held = self.held.set();
                    *capture = if held.is_empty() {
                        CaptureState::Idle
                    } else {
                        CaptureState::Modifiers(held)
                    };
                }
            }
            KeyEvent::Down(InputKey::Key(key)) => {
                let pressed = KeyCombination::new(self.held.set(), key);
                if let Some(capture) = self.capture.as_mut() {
                    *capture = CaptureState::Combination(pressed);
                    return;
                }
                if let Some((handle, registered)) = self.registration
                    && registered == pressed
                {
                    // Receiver gone means the app is shutting down.
                    let _ = self.tx.send(HookEvent::Triggered(handle));
                }
            }
            KeyEvent::Up(_) | KeyEvent::Down(InputKey::Unknown) => {}
        }
    }
}

// ── Public hook ──

/// Owner of the registered hotkey and the trigger stream.
pub struct GlobalHook {
    dispatcher: Arc<Mutex<Dispatcher>>,
    events: Receiver<HookEvent>,
    next_id: u64,
    current: Option<HotkeyHandle>,
    _backend: Option<backend::Backend>,
}

fn lock(dispatcher: &Mutex<Dispatcher>) -> MutexGuard<'_, Dispatcher> {
    dispatcher.lock().unwrap_or_else(|e| e.into_inner())
}

impl GlobalHook {
    /// Install the platform keyboard filter.
    ///
    /// Failure is non-fatal for callers: the app stays usable from the menu.
    pub fn install() -> Result<Self> {
        let mut hook = Self::detached();
        hook._backend = Some(backend::Backend::start(Arc::clone(&hook.dispatcher))?);
        log::info!("[hook] keyboard hook installed");
        Ok(hook)
    }

    /// A hook with no OS backend. Events are supplied with [`inject`](Self::inject).
    pub fn detached() -> Self {
        let (tx, events) = mpsc::channel();
        GlobalHook {
            dispatcher: Arc::new(Mutex::new(Dispatcher::new(tx))),
            events,
            next_id: 1,
            current: None,
            _backend: None,
        }
    }

    /// Feed one key event to the dispatcher, as a backend would.
    pub fn inject(&self, event: KeyEvent) {
        lock(&self.dispatcher).handle(event);
    }

    /// Make `combination` the only live hotkey, replacing any previous one.
    ///
    /// The swap happens under the dispatcher lock, so no key event can see
    /// both or neither. Triggers already queued for the old handle are
    /// discarded by [`try_next`](Self::try_next).
    pub fn register(&mut self, combination: KeyCombination) -> HotkeyHandle {
        let handle = HotkeyHandle(self.next_id);
        self.next_id += 1;
        let previous = lock(&self.dispatcher)
            .registration
            .replace((handle, combination));
        self.current = Some(handle);
        match previous {
            Some((_, old)) => log::info!("[hook] hotkey {old} replaced by {combination}"),
            None => log::info!("[hook] hotkey registered: {combination}"),
        }
        handle
    }

    /// Remove the registration if `handle` is current. Returns whether it was.
    pub fn unregister(&mut self, handle: HotkeyHandle) -> bool {
        if self.current != Some(handle) {
            return false;
        }
        lock(&self.dispatcher).registration = None;
        self.current = None;
        log::info!("[hook] hotkey unregistered");
        true
    }

    /// The currently registered combination.
    pub fn registered(&self) -> Option<KeyCombination> {
        lock(&self.dispatcher).registration.map(|(_, c)| c)
    }

    pub fn current_handle(&self) -> Option<HotkeyHandle> {
        self.current
    }

    /// Next pending event, skipping triggers for replaced registrations.
    pub fn try_next(&self) -> Option<HookEvent> {
        while let Ok(event) = self.events.try_recv() {
            match event {
                HookEvent::Triggered(h) if Some(h) != self.current => {
                    log::debug!("[hook] dropped stale trigger {h:?}");
                }
                other => return Some(other),
            }
        }
        None
    }

    /// Forget every held modifier. Called on session lock and unlock, where
    /// key-ups are routinely lost.
    pub fn reset_modifiers(&self) {
        lock(&self.dispatcher).clear_modifiers();
        log::debug!("[hook] held modifiers cleared");
    }

    /// Enter capture mode. Triggers are suppressed until the session drops.
    pub fn begin_capture(&self) -> CaptureSession {
        lock(&self.dispatcher).capture = Some(CaptureState::Idle);
        log::debug!("[hook] capture started");
        CaptureSession {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

/// An interactive capture in progress. Dropping it ends capture mode.
pub struct CaptureSession {
    dispatcher: Arc<Mutex<Dispatcher>>,
}

impl CaptureSession {
    pub fn state(&self) -> CaptureState {
        lock(&self.dispatcher).capture.unwrap_or_default()
    }

    /// Accept the captured combination. Combinations without a modifier are
    /// rejected here even though they would trigger if configured by hand.
    pub fn confirm(&self) -> std::result::Result<KeyCombination, CaptureError> {
        validate_capture(self.state())
    }

    /// Clear the captured combination and start over.
    pub fn reset(&self) {
        lock(&self.dispatcher).capture = Some(CaptureState::Idle);
    }

    /// Leave capture mode, returning the last captured state.
    pub fn end_capture(self) -> CaptureState {
        self.state()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        lock(&self.dispatcher).capture = None;
        log::debug!("[hook] capture ended");
    }
}

/// Capture acceptance rule: a key must be pressed with at least one modifier.
pub fn validate_capture(state: CaptureState) -> std::result::Result<KeyCombination, CaptureError> {
    match state {
        CaptureState::Combination(c) if c.modifiers.is_empty() => Err(CaptureError::NoModifier),
        CaptureState::Combination(c) => Ok(c),
        CaptureState::Idle | CaptureState::Modifiers(_) => Err(CaptureError::NoKey),
    }
}

// ── Windows virtual-key translation ──

/// Translate a Windows virtual-key code (as delivered to `WH_KEYBOARD_LL`).
pub fn from_virtual_key(vk: u32) -> InputKey {
    use InputKey::Modifier as M;
    let key = match vk {
        0xA0 | 0x10 => return M(Modifier::Shift, Side::Left),
        0xA1 => return M(Modifier::Shift, Side::Right),
        0xA2 | 0x11 => return M(Modifier::Ctrl, Side::Left),
        0xA3 => return M(Modifier::Ctrl, Side::Right),
        0xA4 | 0x12 => return M(Modifier::Alt, Side::Left),
        0xA5 => return M(Modifier::Alt, Side::Right),
        0x5B => return M(Modifier::Win, Side::Left),
        0x5C => return M(Modifier::Win, Side::Right),
        0x41..=0x5A => Key::letter(char::from(vk as u8)),
        0x30..=0x39 => Key::digit((vk - 0x30) as u8),
        0x60..=0x69 => Key::numpad((vk - 0x60) as u8),
        0x70..=0x87 => Key::function((vk - 0x6F) as u8),
        0x20 => Some(Key::Space),
        0x0D => Some(Key::Enter),
        0x09 => Some(Key::Tab),
        0x1B => Some(Key::Escape),
        0x08 => Some(Key::Backspace),
        0x2D => Some(Key::Insert),
        0x2E => Some(Key::Delete),
        0x24 => Some(Key::Home),
        0x23 => Some(Key::End),
        0x21 => Some(Key::PageUp),
        0x22 => Some(Key::PageDown),
        0x26 => Some(Key::Up),
        0x28 => Some(Key::Down),
        0x25 => Some(Key::Left),
        0x27 => Some(Key::Right),
        0x14 => Some(Key::CapsLock),
        0x90 => Some(Key::NumLock),
        0x91 => Some(Key::ScrollLock),
        0x2C => Some(Key::PrintScreen),
        0x13 => Some(Key::Pause),
        0xBD => Some(Key::Minus),
        0xBB => Some(Key::Equal),
        0xDB => Some(Key::BracketLeft),
        0xDD => Some(Key::BracketRight),
        0xDC => Some(Key::Backslash),
        0xBA => Some(Key::Semicolon),
        0xDE => Some(Key::Quote),
        0xBC => Some(Key::Comma),
        0xBE => Some(Key::Period),
        0xBF => Some(Key::Slash),
        0xC0 => Some(Key::Backquote),
        0x6B => Some(Key::NumpadAdd),
        0x6D => Some(Key::NumpadSubtract),
        0x6A => Some(Key::NumpadMultiply),
        0x6F => Some(Key::NumpadDivide),
        0x6E => Some(Key::NumpadDecimal),
        _ => None,
    };
    key.map(InputKey::Key).unwrap_or(InputKey::Unknown)
}

// ── Windows backend ──

#[cfg(windows)]
mod backend {
    use super::*;
    use std::cell::RefCell;
    use std::thread::JoinHandle;

    use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, HC_ACTION, KBDLLHOOKSTRUCT, MSG,
        PostThreadMessageW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx,
        WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
    };

    thread_local! {
        /// Dispatcher for the hook installed on this thread.
        static DISPATCH: RefCell<Option<Arc<Mutex<Dispatcher>>>> = const { RefCell::new(None) };
    }

    /// Sided modifier virtual keys.
    const MODIFIER_VKS: [(i32, Modifier, Side); 8] = [
        (0xA0, Modifier::Shift, Side::Left),
        (0xA1, Modifier::Shift, Side::Right),
        (0xA2, Modifier::Ctrl, Side::Left),
        (0xA3, Modifier::Ctrl, Side::Right),
        (0xA4, Modifier::Alt, Side::Left),
        (0xA5, Modifier::Alt, Side::Right),
        (0x5B, Modifier::Win, Side::Left),
        (0x5C, Modifier::Win, Side::Right),
    ];

    /// Modifiers physically down right now.
    fn physical_modifiers() -> Vec<(Modifier, Side)> {
        MODIFIER_VKS
            .into_iter()
            .filter(|(vk, _, _)| {
                // SAFETY: plain key-state query, no pointers involved.
                let state = unsafe { GetAsyncKeyState(*vk) };
                state as u16 & 0x8000 != 0
            })
            .map(|(_, m, side)| (m, side))
            .collect()
    }

    unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code == HC_ACTION as i32 && lparam.0 != 0 {
            // SAFETY: for HC_ACTION, lparam points to a KBDLLHOOKSTRUCT owned by the OS.
            let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
            let key = from_virtual_key(info.vkCode);
            let event = match wparam.0 as u32 {
                WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyEvent::Down(key)),
                WM_KEYUP | WM_SYSKEYUP => Some(KeyEvent::Up(key)),
                _ => None,
            };
            if let Some(event) = event {
                DISPATCH.with(|d| {
                    if let Some(dispatcher) = d.borrow().as_ref()
                        && let Ok(mut dispatcher) = dispatcher.lock()
                    {
                        if let KeyEvent::Down(InputKey::Key(_)) = event {
                            dispatcher.resync_modifiers(physical_modifiers());
                        }
                        dispatcher.handle(event);
                    }
                });
            }
        }
        // Every event is forwarded, matched or not.
        unsafe { CallNextHookEx(None, code, wparam, lparam) }
    }

    pub struct Backend {
        thread_id: u32,
        thread: Option<JoinHandle<()>>,
    }

    impl Backend {
        pub fn start(dispatcher: Arc<Mutex<Dispatcher>>) -> Result<Self> {
            let (ready_tx, ready_rx) = mpsc::channel::<Result<u32>>();

            let thread = std::thread::Builder::new()
                .name("hushkey-hook".into())
                .spawn(move || {
                    DISPATCH.with(|d| *d.borrow_mut() = Some(dispatcher));

                    let installed = unsafe {
                        GetModuleHandleW(None).and_then(|module| {
                            SetWindowsHookExW(
                                WH_KEYBOARD_LL,
                                Some(keyboard_proc),
                                Some(HINSTANCE(module.0)),
                                0,
                            )
                        })
                    };
                    let hook = match installed {
                        Ok(h) => h,
                        Err(e) => {
                            let _ = ready_tx
                                .send(Err(HookError::InstallFailed(format!("SetWindowsHookExW: {e}"))));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));

                    let mut msg = MSG::default();
                    unsafe {
                        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                            let _ = TranslateMessage(&msg);
                            DispatchMessageW(&msg);
                        }
                        let _ = UnhookWindowsHookEx(hook);
                    }
                    log::debug!("[hook] message loop exited");
                })
                .map_err(|e| HookError::InstallFailed(format!("spawn hook thread: {e}")))?;

            let thread_id = ready_rx
                .recv()
                .map_err(|_| HookError::InstallFailed("hook thread exited".into()))??;

            Ok(Backend {
                thread_id,
                thread: Some(thread),
            })
        }
    }

    impl Drop for Backend {
        fn drop(&mut self) {
            unsafe {
                let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
            if let Some(t) = self.thread.take() {
                let _ = t.join();
            }
        }
    }
}

// ── rdev backend (Linux/macOS) ──

#[cfg(not(windows))]
mod backend {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use rdev::{EventType, Key as RKey};

    /// `rdev::listen` can't be stopped, so one listener serves the whole
    /// process and routes to whichever dispatcher is current.
    static ROUTE: Mutex<Option<Arc<Mutex<Dispatcher>>>> = Mutex::new(None);
    static LISTENING: AtomicBool = AtomicBool::new(false);

    /// How long to wait for `rdev::listen` to fail before assuming it runs.
    const STARTUP_GRACE: Duration = Duration::from_millis(200);

    pub struct Backend;

    impl Backend {
        pub fn start(dispatcher: Arc<Mutex<Dispatcher>>) -> Result<Self> {
            *ROUTE.lock().unwrap_or_else(|e| e.into_inner()) = Some(dispatcher);

            if LISTENING.swap(true, Ordering::SeqCst) {
                return Ok(Backend);
            }

            let (err_tx, err_rx) = mpsc::channel::<String>();
            std::thread::Builder::new()
                .name("hushkey-hook".into())
                .spawn(move || {
                    let result = rdev::listen(|event| {
                        let translated = match event.event_type {
                            EventType::KeyPress(k) => KeyEvent::Down(from_rdev(k)),
                            EventType::KeyRelease(k) => KeyEvent::Up(from_rdev(k)),
                            _ => return,
                        };
                        if let Ok(route) = ROUTE.lock()
                            && let Some(dispatcher) = route.as_ref()
                            && let Ok(mut dispatcher) = dispatcher.lock()
                        {
                            dispatcher.handle(translated);
                        }
                    });
                    if let Err(e) = result {
                        let _ = err_tx.send(format!("{e:?}"));
                    }
                })
                .map_err(|e| HookError::InstallFailed(format!("spawn hook thread: {e}")))?;

            match err_rx.recv_timeout(STARTUP_GRACE) {
                Ok(e) => {
                    LISTENING.store(false, Ordering::SeqCst);
                    Err(HookError::InstallFailed(format!("rdev::listen: {e}")))
                }
                Err(_) => Ok(Backend),
            }
        }
    }

    impl Drop for Backend {
        fn drop(&mut self) {
            *ROUTE.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }
    }

    pub(super) fn from_rdev(key: RKey) -> InputKey {
        use InputKey::Modifier as M;
        let key = match key {
            RKey::ControlLeft => return M(Modifier::Ctrl, Side::Left),
            RKey::ControlRight => return M(Modifier::Ctrl, Side::Right),
            RKey::Alt => return M(Modifier::Alt, Side::Left),
            RKey::AltGr => return M(Modifier::Alt, Side::Right),
            RKey::ShiftLeft => return M(Modifier::Shift, Side::Left),
            RKey::ShiftRight => return M(Modifier::Shift, Side::Right),
            RKey::MetaLeft => return M(Modifier::Win, Side::Left),
            RKey::MetaRight => return M(Modifier::Win, Side::Right),
            RKey::KeyA => Key::letter('A'),
            RKey::KeyB => Key::letter('B'),
            RKey::KeyC => Key::letter('C'),
            RKey::KeyD => Key::letter('D'),
            RKey::KeyE => Key::letter('E'),
            RKey::KeyF => Key::letter('F'),
            RKey::KeyG => Key::letter('G'),
            RKey::KeyH => Key::letter('H'),
            RKey::KeyI => Key::letter('I'),
            RKey::KeyJ => Key::letter('J'),
            RKey::KeyK => Key::letter('K'),
            RKey::KeyL => Key::letter('L'),
            RKey::KeyM => Key::letter('M'),
            RKey::KeyN => Key::letter('N'),
            RKey::KeyO => Key::letter('O'),
            RKey::KeyP => Key::letter('P'),
            RKey::KeyQ => Key::letter('Q'),
            RKey::KeyR => Key::letter('R'),
            RKey::KeyS => Key::letter('S'),
            RKey::KeyT => Key::letter('T'),
            RKey::KeyU => Key::letter('U'),
            RKey::KeyV => Key::letter('V'),
            RKey::KeyW => Key::letter('W'),
            RKey::KeyX => Key::letter('X'),
            RKey::KeyY => Key::letter('Y'),
            RKey::KeyZ => Key::letter('Z'),
            RKey::Num0 => Key::digit(0),
            RKey::Num1 => Key::digit(1),
            RKey::Num2 => Key::digit(2),
            RKey::Num3 => Key::digit(3),
            RKey::Num4 => Key::digit(4),
            RKey::Num5 => Key::digit(5),
            RKey::Num6 => Key::digit(6),
            RKey::Num7 => Key::digit(7),
            RKey::Num8 => Key::digit(8),
            RKey::Num9 => Key::digit(9),
            RKey::Kp0 => Key::numpad(0),
            RKey::Kp1 => Key::numpad(1),
            RKey::Kp2 => Key::numpad(2),
            RKey::Kp3 => Key::numpad(3),
            RKey::Kp4 => Key::numpad(4),
            RKey::Kp5 => Key::numpad(5),
            RKey::Kp6 => Key::numpad(6),
            RKey::Kp7 => Key::numpad(7),
            RKey::Kp8 => Key::numpad(8),
            RKey::Kp9 => Key::numpad(9),
            RKey::F1 => Key::function(1),
            RKey::F2 => Key::function(2),
            RKey::F3 => Key::function(3),
            RKey::F4 => Key::function(4),
            RKey::F5 => Key::function(5),
            RKey::F6 => Key::function(6),
            RKey::F7 => Key::function(7),
            RKey::F8 => Key::function(8),
            RKey::F9 => Key::function(9),
            RKey::F10 => Key::function(10),
            RKey::F11 => Key::function(11),
            RKey::F12 => Key::function(12),
            RKey::Space => Some(Key::Space),
            RKey::Return | RKey::KpReturn => Some(Key::Enter),
            RKey::Tab => Some(Key::Tab),
            RKey::Escape => Some(Key::Escape),
            RKey::Backspace => Some(Key::Backspace),
            RKey::Insert => Some(Key::Insert),
            RKey::Delete => Some(Key::Delete),
            RKey::Home => Some(Key::Home),
            RKey::End => Some(Key::End),
            RKey::PageUp => Some(Key::PageUp),
            RKey::PageDown => Some(Key::PageDown),
            RKey::UpArrow => Some(Key::Up),
            RKey::DownArrow => Some(Key::Down),
            RKey::LeftArrow => Some(Key::Left),
            RKey::RightArrow => Some(Key::Right),
            RKey::CapsLock => Some(Key::CapsLock),
            RKey::NumLock => Some(Key::NumLock),
            RKey::ScrollLock => Some(Key::ScrollLock),
            RKey::PrintScreen => Some(Key::PrintScreen),
            RKey::Pause => Some(Key::Pause),
            RKey::Minus => Some(Key::Minus),
            RKey::Equal => Some(Key::Equal),
            RKey::LeftBracket => Some(Key::BracketLeft),
            RKey::RightBracket => Some(Key::BracketRight),
            RKey::BackSlash | RKey::IntlBackslash => Some(Key::Backslash),
            RKey::SemiColon => Some(Key::Semicolon),
            RKey::Quote => Some(Key::Quote),
            RKey::Comma => Some(Key::Comma),
            RKey::Dot => Some(Key::Period),
            RKey::Slash => Some(Key::Slash),
            RKey::BackQuote => Some(Key::Backquote),
            RKey::KpPlus => Some(Key::NumpadAdd),
            RKey::KpMinus => Some(Key::NumpadSubtract),
            RKey::KpMultiply => Some(Key::NumpadMultiply),
            RKey::KpDivide => Some(Key::NumpadDivide),
            RKey::KpDelete => Some(Key::NumpadDecimal),
            _ => None,
        };
        key.map(InputKey::Key).unwrap_or(InputKey::Unknown)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rdev_modifiers_are_sided() {
            assert_eq!(from_rdev(RKey::AltGr), InputKey::Modifier(Modifier::Alt, Side::Right));
            assert_eq!(from_rdev(RKey::MetaLeft), InputKey::Modifier(Modifier::Win, Side::Left));
        }

        #[test]
        fn rdev_keys_translate() {
            assert_eq!(from_rdev(RKey::KeyN), InputKey::Key(Key::Letter('N')));
            assert_eq!(from_rdev(RKey::Num7), InputKey::Key(Key::Digit(7)));
            assert_eq!(from_rdev(RKey::F12), InputKey::Key(Key::Function(12)));
            assert_eq!(from_rdev(RKey::Unknown(999)), InputKey::Unknown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::DEFAULT_HOTKEY;

    const CTRL: InputKey = InputKey::Modifier(Modifier::Ctrl, Side::Left);
    const RCTRL: InputKey = InputKey::Modifier(Modifier::Ctrl, Side::Right);
    const ALT: InputKey = InputKey::Modifier(Modifier::Alt, Side::Left);
    const SHIFT: InputKey = InputKey::Modifier(Modifier::Shift, Side::Left);

    fn key(c: char) -> InputKey {
        InputKey::Key(Key::Letter(c))
    }

    /// Press the modifiers, tap the key, release the modifiers.
    fn chord(hook: &GlobalHook, modifiers: &[InputKey], k: InputKey) {
        for m in modifiers {
            hook.inject(KeyEvent::Down(*m));
        }
        hook.inject(KeyEvent::Down(k));
        hook.inject(KeyEvent::Up(k));
        for m in modifiers.iter().rev() {
            hook.inject(KeyEvent::Up(*m));
        }
    }

    fn drain(hook: &GlobalHook) -> Vec<HookEvent> {
        std::iter::from_fn(|| hook.try_next()).collect()
    }

    #[test]
    fn exact_modifier_set_triggers() {
        let mut hook = GlobalHook::detached();
        let handle = hook.register(DEFAULT_HOTKEY);
        chord(&hook, &[CTRL, ALT], key('N'));
        assert_eq!(drain(&hook), vec![HookEvent::Triggered(handle)]);
    }

    #[test]
    fn subset_or_superset_never_triggers() {
        let mut hook = GlobalHook::detached();
        hook.register(DEFAULT_HOTKEY);
        chord(&hook, &[CTRL], key('N'));
        chord(&hook, &[CTRL, ALT, SHIFT], key('N'));
        chord(&hook, &[], key('N'));
        chord(&hook, &[CTRL, ALT], key('M'));
        assert!(drain(&hook).is_empty());
    }

    #[test]
    fn key_repeat_triggers_each_time() {
        let mut hook = GlobalHook::detached();
        hook.register(DEFAULT_HOTKEY);
        hook.inject(KeyEvent::Down(CTRL));
        hook.inject(KeyEvent::Down(ALT));
        for _ in 0..3 {
            hook.inject(KeyEvent::Down(key('N')));
        }
        assert_eq!(drain(&hook).len(), 3);
    }

    #[test]
    fn modifier_keys_alone_never_trigger() {
        let mut hook = GlobalHook::detached();
        hook.register(DEFAULT_HOTKEY);
        hook.inject(KeyEvent::Down(CTRL));
        hook.inject(KeyEvent::Down(ALT));
        hook.inject(KeyEvent::Down(InputKey::Unknown));
        assert!(drain(&hook).is_empty());
    }

    #[test]
    fn left_and_right_modifiers_tracked_separately() {
        let mut hook = GlobalHook::detached();
        hook.register(DEFAULT_HOTKEY);
        hook.inject(KeyEvent::Down(CTRL));
        hook.inject(KeyEvent::Down(RCTRL));
        hook.inject(KeyEvent::Up(CTRL));
        // Right Ctrl still held
        chord(&hook, &[ALT], key('N'));
        assert_eq!(drain(&hook).len(), 1);
    }

    #[test]
    fn zero_modifier_registration_fires_on_bare_key() {
        let mut hook = GlobalHook::detached();
        hook.register(KeyCombination::new(ModifierSet::EMPTY, Key::Function(9)));
        chord(&hook, &[], InputKey::Key(Key::Function(9)));
        assert_eq!(drain(&hook).len(), 1);
    }

    #[test]
    fn re_registration_only_new_combination_fires() {
        let mut hook = GlobalHook::detached();
        let old = hook.register(DEFAULT_HOTKEY);
        let new_combo = KeyCombination::new(Modifier::Ctrl | Modifier::Shift, Key::Letter('M'));
        let new = hook.register(new_combo);
        assert_ne!(old, new);
        assert_eq!(hook.registered(), Some(new_combo));

        chord(&hook, &[CTRL, ALT], key('N'));
        chord(&hook, &[CTRL, SHIFT], key('M'));
        assert_eq!(drain(&hook), vec![HookEvent::Triggered(new)]);
    }

    #[test]
    fn queued_trigger_for_old_handle_is_discarded() {
        let mut hook = GlobalHook::detached();
        hook.register(DEFAULT_HOTKEY);
        chord(&hook, &[CTRL, ALT], key('N'));
        // Not drained before the swap
        hook.register(KeyCombination::new(Modifier::Win, Key::Letter('M')));
        assert!(drain(&hook).is_empty());
    }

    #[test]
    fn unregister_stops_triggers() {
        let mut hook = GlobalHook::detached();
        let handle = hook.register(DEFAULT_HOTKEY);
        assert!(hook.unregister(handle));
        assert!(!hook.unregister(handle));
        chord(&hook, &[CTRL, ALT], key('N'));
        assert!(drain(&hook).is_empty());
        assert_eq!(hook.registered(), None);
    }

    #[test]
    fn unregister_stale_handle_is_ignored() {
        let mut hook = GlobalHook::detached();
        let old = hook.register(DEFAULT_HOTKEY);
        hook.register(KeyCombination::new(Modifier::Alt, Key::Letter('Q')));
        assert!(!hook.unregister(old));
        assert!(hook.registered().is_some());
    }

    // ── Capture ──

    #[test]
    fn capture_tracks_live_combination() {
        let hook = GlobalHook::detached();
        let session = hook.begin_capture();
        assert_eq!(session.state(), CaptureState::Idle);

        hook.inject(KeyEvent::Down(CTRL));
        hook.inject(KeyEvent::Down(SHIFT));
        assert_eq!(
            session.state(),
            CaptureState::Modifiers(Modifier::Ctrl | Modifier::Shift)
        );
        assert_eq!(session.state().label(), "Ctrl+Shift+…");

        hook.inject(KeyEvent::Down(key('K')));
        hook.inject(KeyEvent::Up(key('K')));
        hook.inject(KeyEvent::Up(SHIFT));
        hook.inject(KeyEvent::Up(CTRL));
        let expected = KeyCombination::new(Modifier::Ctrl | Modifier::Shift, Key::Letter('K'));
        assert_eq!(session.state(), CaptureState::Combination(expected));
        assert_eq!(session.confirm(), Ok(expected));
    }

    #[test]
    fn capture_rejects_combination_without_modifier() {
        let hook = GlobalHook::detached();
        let session = hook.begin_capture();
        assert_eq!(session.confirm(), Err(CaptureError::NoKey));
        chord(&hook, &[], key('A'));
        assert_eq!(session.confirm(), Err(CaptureError::NoModifier));
        session.reset();
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn capture_modifier_release_returns_to_idle() {
        let hook = GlobalHook::detached();
        let session = hook.begin_capture();
        hook.inject(KeyEvent::Down(ALT));
        hook.inject(KeyEvent::Up(ALT));
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn triggers_suppressed_while_capturing() {
        let mut hook = GlobalHook::detached();
        hook.register(DEFAULT_HOTKEY);
        let session = hook.begin_capture();
        chord(&hook, &[CTRL, ALT], key('N'));
        assert!(drain(&hook).is_empty());
        assert_eq!(
            session.end_capture(),
            CaptureState::Combination(DEFAULT_HOTKEY)
        );
        chord(&hook, &[CTRL, ALT], key('N'));
        assert_eq!(drain(&hook).len(), 1);
    }

    #[test]
    fn reset_clears_modifier_with_lost_key_up() {
        let mut hook = GlobalHook::detached();
        let handle = hook.register(DEFAULT_HOTKEY);
        let win = InputKey::Modifier(Modifier::Win, Side::Left);
        // Win+L locks the session; the Win key-up never arrives.
        hook.inject(KeyEvent::Down(win));
        hook.inject(KeyEvent::Down(key('L')));
        hook.inject(KeyEvent::Up(key('L')));

        chord(&hook, &[CTRL, ALT], key('N'));
        assert!(drain(&hook).is_empty());

        hook.reset_modifiers();
        chord(&hook, &[CTRL, ALT], key('N'));
        assert_eq!(drain(&hook), vec![HookEvent::Triggered(handle)]);
    }

    #[test]
    fn resync_replaces_stale_held_set() {
        let mut hook = GlobalHook::detached();
        hook.register(DEFAULT_HOTKEY);
        hook.inject(KeyEvent::Down(InputKey::Modifier(Modifier::Win, Side::Left)));
        hook.inject(KeyEvent::Down(SHIFT));

        lock(&hook.dispatcher).resync_modifiers([
            (Modifier::Ctrl, Side::Left),
            (Modifier::Alt, Side::Right),
        ]);
        hook.inject(KeyEvent::Down(key('N')));
        assert_eq!(drain(&hook).len(), 1);

        lock(&hook.dispatcher).resync_modifiers([]);
        hook.inject(KeyEvent::Down(key('N')));
        assert!(drain(&hook).is_empty());
    }

    #[test]
    fn reset_returns_modifier_capture_to_idle() {
        let hook = GlobalHook::detached();
        let session = hook.begin_capture();
        hook.inject(KeyEvent::Down(CTRL));
        assert!(matches!(session.state(), CaptureState::Modifiers(_)));
        hook.reset_modifiers();
        assert_eq!(session.state(), CaptureState::Idle);
    }

    // ── Virtual keys ──

    #[test]
    fn virtual_key_translation() {
        assert_eq!(from_virtual_key(0x4E), InputKey::Key(Key::Letter('N')));
        assert_eq!(from_virtual_key(0x35), InputKey::Key(Key::Digit(5)));
        assert_eq!(from_virtual_key(0x70), InputKey::Key(Key::Function(1)));
        assert_eq!(from_virtual_key(0x87), InputKey::Key(Key::Function(24)));
        assert_eq!(from_virtual_key(0x63), InputKey::Key(Key::Numpad(3)));
        assert_eq!(from_virtual_key(0xA3), RCTRL);
        assert_eq!(
            from_virtual_key(0x5C),
            InputKey::Modifier(Modifier::Win, Side::Right)
        );
        assert_eq!(from_virtual_key(0xFF), InputKey::Unknown);
    }
}
