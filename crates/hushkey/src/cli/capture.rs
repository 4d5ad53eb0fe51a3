//! `capture` subcommand: press a combination to record it as the hotkey.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

use hushkey_lib::HushkeyError;
use hushkey_lib::hook::{CaptureError, CaptureState, GlobalHook};

use super::{RUNNING, Result};

const POLL: Duration = Duration::from_millis(30);

pub(super) fn cmd_capture(save: bool, config_path: Option<&Path>) -> Result<()> {
    let hook = GlobalHook::install()?;
    let session = hook.begin_capture();

    println!("Press a key combination with at least one modifier (Ctrl+C to cancel).");
    let mut shown = String::new();
    let combo = loop {
        if !RUNNING.load(Ordering::SeqCst) {
            println!();
            return Err(HushkeyError::Config("capture cancelled".into()));
        }

        let state = session.state();
        let label = state.label();
        if label != shown {
            // Pad over a longer previous label
            print!("\r  {label:<width$}", width = shown.len().max(label.len()));
            let _ = std::io::stdout().flush();
            shown = label;
        }

        if let CaptureState::Combination(_) = state {
            match session.confirm() {
                Ok(c) => break c,
                Err(CaptureError::NoModifier) => {
                    println!();
                    println!("  {}, try again.", CaptureError::NoModifier);
                    session.reset();
                    shown.clear();
                }
                Err(CaptureError::NoKey) => {}
            }
        }
        std::thread::sleep(POLL);
    };
    session.end_capture();
    println!();

    if save {
        super::hotkey_cmd::save_hotkey(&combo, config_path)?;
        println!("Hotkey saved: {combo}");
    } else {
        println!("Captured: {combo}");
    }
    Ok(())
}
