//! Hotkey capture dialog: shows the live combination while the user presses
//! keys, and returns it on Save.
//!
//! The keys are read by the global hook in capture mode, so the dialog works
//! the same whichever window has focus. Returns `None` on Cancel/close.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::egui;
use hushkey_lib::hook::{CaptureError, CaptureSession, CaptureState, GlobalHook, validate_capture};
use hushkey_lib::hotkey::KeyCombination;

const REPAINT: Duration = Duration::from_millis(30);

/// Text for the live combination and an optional hint line.
fn describe(state: CaptureState) -> (String, Option<String>) {
    let label = match state {
        CaptureState::Idle => "Press a key combination…".to_string(),
        other => other.label(),
    };
    let hint = match validate_capture(state) {
        Err(CaptureError::NoModifier) => Some(format!("{}.", CaptureError::NoModifier)),
        _ => None,
    };
    (label, hint)
}

struct CaptureApp {
    session: CaptureSession,
    current: KeyCombination,
    result: Arc<Mutex<Option<KeyCombination>>>,
}

impl eframe::App for CaptureApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = self.session.state();
        let (label, hint) = describe(state);
        let confirmed = self.session.confirm().ok();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(8.0);
                ui.label(format!("Current hotkey: {}", self.current));
                ui.add_space(12.0);
                ui.heading(label);
                ui.add_space(4.0);
                match hint {
                    Some(h) => ui.colored_label(ui.visuals().error_fg_color, h),
                    None => ui.label(""),
                };
                ui.add_space(12.0);
            });

            ui.horizontal(|ui| {
                let save = ui.add_enabled(confirmed.is_some(), egui::Button::new("Save"));
                if save.clicked()
                    && let Some(combo) = confirmed
                {
                    if let Ok(mut r) = self.result.lock() {
                        *r = Some(combo);
                    }
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                if ui.button("Clear").clicked() {
                    self.session.reset();
                }
                if ui.button("Cancel").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });

        ctx.request_repaint_after(REPAINT);
    }
}

/// Show the capture dialog. Modal: blocks until the window closes.
///
/// Must be called from the main thread (eframe/winit requirement).
pub fn show_capture(hook: &GlobalHook, current: KeyCombination) -> Option<KeyCombination> {
    let result: Arc<Mutex<Option<KeyCombination>>> = Arc::new(Mutex::new(None));
    let result_for_app = Arc::clone(&result);
    let session = hook.begin_capture();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([320.0, 170.0])
            .with_resizable(false)
            .with_always_on_top()
            .with_title("Hushkey — Set Hotkey")
            .with_icon(crate::icon::app_icon()),
        ..Default::default()
    };
    if let Err(e) = eframe::run_native(
        "Hushkey Set Hotkey",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(CaptureApp {
                session,
                current,
                result: result_for_app,
            }))
        }),
    ) {
        log::error!("[tray] capture dialog failed: {e}");
    }

    result.lock().ok().and_then(|mut guard| guard.take())
}
