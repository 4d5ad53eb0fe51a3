//! `hushkey-cli`: device mute, hotkey and lighting commands for terminals
//! and scripts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;

/// Cleared on Ctrl+C; long-running commands (`capture`) poll it.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "hushkey-cli",
    version,
    about = "System-wide microphone mute control with lighting feedback"
)]
struct Args {
    /// Output as JSON (for status, config, devices, hotkey, profiles)
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use a config file other than the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: cli::Command,
}

fn init_logger(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

#[cfg(windows)]
fn install_interrupt_handler() {
    use windows::Win32::System::Console::SetConsoleCtrlHandler;
    use windows::core::BOOL;

    unsafe extern "system" fn on_ctrl(_ctrl_type: u32) -> BOOL {
        RUNNING.store(false, Ordering::SeqCst);
        BOOL(1)
    }

    if let Err(e) = unsafe { SetConsoleCtrlHandler(Some(on_ctrl), true) } {
        log::debug!("[cli] SetConsoleCtrlHandler: {e}");
    }
}

#[cfg(not(windows))]
fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(|| RUNNING.store(false, Ordering::SeqCst)) {
        log::debug!("[cli] ctrlc handler: {e}");
    }
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    install_interrupt_handler();

    if let Err(e) = cli::run(args.command, args.json, args.config.as_deref()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
