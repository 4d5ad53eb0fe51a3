//! Hushkey tray binary.
//!
//! Built for the GUI subsystem on Windows. Launched from a terminal with
//! arguments, it points the user at `hushkey-cli` instead of starting a tray.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(any(windows, target_os = "linux"))]
mod capture_dialog;
#[cfg(any(windows, target_os = "linux"))]
mod icon;
#[cfg(any(windows, target_os = "linux"))]
mod sound;
#[cfg(any(windows, target_os = "linux"))]
mod tray;

use std::path::Path;

#[cfg(any(windows, target_os = "linux"))]
use std::sync::atomic::AtomicBool;

/// Cleared by the tray's Quit item or a WM_QUIT.
#[cfg(any(windows, target_os = "linux"))]
pub static RUNNING: AtomicBool = AtomicBool::new(true);

/// Keep one previous log next to the current one.
fn rotate_log(path: &Path) {
    if path.exists() {
        let _ = std::fs::rename(path, path.with_extension("log.old"));
    }
}

/// Log to `<config dir>/hushkey.log` (stderr when that can't be opened).
fn init_tray_logger() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_target(false);

    let log_path = hushkey_lib::config::Config::log_path();
    let file = log_path.as_deref().and_then(|path| {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        rotate_log(path);
        std::fs::File::create(path).ok()
    });
    if let Some(file) = file {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();

    log::info!(
        "[tray] hushkey {} starting (log: {})",
        env!("CARGO_PKG_VERSION"),
        log_path.map_or_else(|| "stderr".into(), |p| p.display().to_string())
    );
}

/// True when started from cmd/PowerShell with arguments; the hint has been
/// printed to that console.
#[cfg(windows)]
fn redirected_to_cli() -> bool {
    use windows::Win32::System::Console::{ATTACH_PARENT_PROCESS, AttachConsole, FreeConsole};

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return false;
    }
    // Attaching only succeeds with a parent console
    if unsafe { AttachConsole(ATTACH_PARENT_PROCESS) }.is_err() {
        return false;
    }
    eprintln!("Hint: hushkey.exe is the tray app. Use hushkey-cli.exe on the command line:");
    eprintln!("  hushkey-cli.exe {}", args.join(" "));
    unsafe {
        let _ = FreeConsole();
    }
    true
}

#[cfg(not(any(windows, target_os = "linux")))]
fn main() {
    init_tray_logger();
    eprintln!("The tray app is only available on Windows and Linux.");
    eprintln!("Use hushkey-cli for command-line usage.");
    std::process::exit(1);
}

#[cfg(any(windows, target_os = "linux"))]
fn main() {
    #[cfg(windows)]
    if redirected_to_cli() {
        return;
    }

    init_tray_logger();

    if let Err(e) = tray::run() {
        let msg = format!("Error: {e}");
        log::error!("[tray] {e}");
        eprintln!("{msg}");
        report_fatal(&msg);
        std::process::exit(1);
    }
}

/// The release tray has no console, so fatal startup errors get a dialog.
#[cfg(windows)]
fn report_fatal(msg: &str) {
    use windows::Win32::UI::WindowsAndMessaging::{MB_ICONERROR, MB_OK, MessageBoxW};
    use windows::core::{HSTRING, PCWSTR};

    let text = HSTRING::from(msg);
    let caption = HSTRING::from("Hushkey");
    unsafe {
        let _ = MessageBoxW(
            None,
            PCWSTR(text.as_ptr()),
            PCWSTR(caption.as_ptr()),
            MB_ICONERROR | MB_OK,
        );
    }
}

#[cfg(target_os = "linux")]
fn report_fatal(msg: &str) {
    let _ = notify_rust::Notification::new()
        .summary("Hushkey could not start")
        .body(msg)
        .show();
}
